//! Language tag: validated identifier of a display language.
//!
//! Tags follow the common BCP 47 shape (`en`, `cy`, `pt-BR`). Only the
//! structure is validated; whether the translation backend actually serves
//! a language is for the backend to decide.

use anyhow::{bail, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// A validated language tag.
///
/// The primary subtag is normalized to lower case so that `EN` and `en`
/// address the same cache records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LanguageTag(Cow<'static, str>);

impl LanguageTag {
    /// English, the default source language of phrases.
    pub const ENGLISH: LanguageTag = LanguageTag(Cow::Borrowed("en"));

    /// Welsh.
    pub const WELSH: LanguageTag = LanguageTag(Cow::Borrowed("cy"));

    /// Parse and normalize a language tag.
    ///
    /// # Returns
    /// * `Ok(LanguageTag)` for tags like `fr`, `CY`, `pt-BR`
    /// * `Err` for empty input, a primary subtag that is not 2-8 letters, or
    ///   empty/non-alphanumeric subtags
    pub fn parse(code: &str) -> Result<LanguageTag> {
        let code = code.trim();
        if code.is_empty() {
            bail!("Language tag is empty");
        }

        let mut parts = code.split('-');
        let primary = parts.next().unwrap_or_default();
        if !(2..=8).contains(&primary.len()) || !primary.chars().all(|c| c.is_ascii_alphabetic()) {
            bail!("Invalid primary language subtag in '{}'", code);
        }

        let mut normalized = primary.to_ascii_lowercase();
        for subtag in parts {
            if subtag.is_empty()
                || subtag.len() > 8
                || !subtag.chars().all(|c| c.is_ascii_alphanumeric())
            {
                bail!("Invalid language subtag '{}' in '{}'", subtag, code);
            }
            normalized.push('-');
            normalized.push_str(subtag);
        }

        Ok(LanguageTag(Cow::Owned(normalized)))
    }

    /// The tag as a string slice (e.g. "en", "pt-BR").
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LanguageTag {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        LanguageTag::parse(s)
    }
}

impl Serialize for LanguageTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LanguageTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        LanguageTag::parse(&raw).map_err(serde::de::Error::custom)
    }
}
