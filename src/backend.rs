use crate::config::Config;
use crate::error::LookupError;
use crate::i18n::{LanguageTag, TranslatedPayload, WireTranslation};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Batched lookup request body
#[derive(Debug, Serialize)]
struct LookupRequest<'a> {
    phrases: &'a [String],
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    translations: HashMap<String, WireTranslation>,
}

/// Source of translations for a batch of phrases in one language.
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    async fn fetch(
        &self,
        language: &LanguageTag,
        phrases: &[String],
    ) -> Result<HashMap<String, TranslatedPayload>, LookupError>;
}

/// Lookup service reached over HTTP.
///
/// Sends `POST {base_url}/{language}` with `{"phrases": [...]}` and expects
/// `{"translations": {"<phrase>": "<text>" | {"translation": ..., "yes": ..., "no": ...}}}`.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client for translation lookups")?;

        Ok(Self::with_client(client, &config.base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url_for(&self, language: &LanguageTag) -> String {
        format!("{}/{}", self.base_url, language)
    }
}

#[async_trait]
impl TranslationBackend for HttpBackend {
    async fn fetch(
        &self,
        language: &LanguageTag,
        phrases: &[String],
    ) -> Result<HashMap<String, TranslatedPayload>, LookupError> {
        let url = self.url_for(language);
        debug!("Requesting {} phrases from {}", phrases.len(), url);

        let response = self
            .client
            .post(&url)
            .json(&LookupRequest { phrases })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(LookupError::Status { status, body });
        }

        let body = response.text().await?;
        let parsed: LookupResponse = serde_json::from_str(&body)?;

        Ok(parsed
            .translations
            .into_iter()
            .map(|(phrase, wire)| (phrase, wire.into()))
            .collect())
    }
}
