//! Translated payloads: what a phrase resolves to.

use serde::{Deserialize, Serialize};

/// Marker appended to provisional values while a lookup is pending.
pub const IN_PROGRESS_MARKER: &str = "[Translation in progress]";

/// The resolved value of a phrase in one language.
///
/// Most phrases only carry `translation`. Questions answered with yes/no
/// additionally carry the language's words for those answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatedPayload {
    #[serde(alias = "primaryText")]
    pub translation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no: Option<String>,
}

impl TranslatedPayload {
    /// Payload carrying only the primary text.
    pub fn text(translation: impl Into<String>) -> Self {
        Self {
            translation: translation.into(),
            yes: None,
            no: None,
        }
    }

    /// Identity fallback: the phrase stands for itself.
    pub fn identity(phrase: &str) -> Self {
        Self::text(phrase)
    }

    /// Provisional value shown while the phrase is being fetched.
    pub fn in_progress(phrase: &str) -> Self {
        Self {
            translation: format!("{} {}", phrase, IN_PROGRESS_MARKER),
            yes: Some(format!("Yes {}", IN_PROGRESS_MARKER)),
            no: Some(format!("No {}", IN_PROGRESS_MARKER)),
        }
    }

    /// Tagged placeholder used instead of the identity fallback in diagnostic mode.
    pub fn diagnostic(phrase: &str) -> Self {
        Self::text(format!("[Test translation for {}]", phrase))
    }

    pub fn is_in_progress(&self) -> bool {
        self.translation.contains(IN_PROGRESS_MARKER)
    }
}

/// A translation as returned by the lookup service: either a bare string or
/// a structured record.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireTranslation {
    Plain(String),
    Structured(TranslatedPayload),
}

impl From<WireTranslation> for TranslatedPayload {
    fn from(wire: WireTranslation) -> Self {
        match wire {
            WireTranslation::Plain(text) => TranslatedPayload::text(text),
            WireTranslation::Structured(payload) => payload,
        }
    }
}
