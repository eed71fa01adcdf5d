//! Test doubles shared by the unit tests.

use crate::backend::TranslationBackend;
use crate::error::{LookupError, StoreError};
use crate::i18n::{LanguageTag, TranslatedPayload};
use crate::store::{CachedTranslation, MemoryRecordStore, RecordStore};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub fn french() -> LanguageTag {
    LanguageTag::parse("fr").unwrap()
}

/// A lookup call seen by [`RecordingBackend`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub language: LanguageTag,
    pub phrases: Vec<String>,
    pub at: Instant,
}

/// Backend that records every call and answers `"{lang}:{phrase}"` unless
/// told otherwise.
#[derive(Default)]
pub struct RecordingBackend {
    calls: Mutex<Vec<RecordedCall>>,
    answers: Mutex<HashMap<String, TranslatedPayload>>,
    omitted: Mutex<HashSet<String>>,
    failing: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl RecordingBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn answer(&self, phrase: &str, payload: TranslatedPayload) {
        self.answers.lock().insert(phrase.to_string(), payload);
    }

    pub fn omit(&self, phrase: &str) {
        self.omitted.lock().insert(phrase.to_string());
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl TranslationBackend for RecordingBackend {
    async fn fetch(
        &self,
        language: &LanguageTag,
        phrases: &[String],
    ) -> Result<HashMap<String, TranslatedPayload>, LookupError> {
        self.calls.lock().push(RecordedCall {
            language: language.clone(),
            phrases: phrases.to_vec(),
            at: Instant::now(),
        });

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(LookupError::Status {
                status: 503,
                body: "Service Unavailable".to_string(),
            });
        }

        let answers = self.answers.lock();
        let omitted = self.omitted.lock();
        Ok(phrases
            .iter()
            .filter(|phrase| !omitted.contains(*phrase))
            .map(|phrase| {
                let payload = answers
                    .get(phrase)
                    .cloned()
                    .unwrap_or_else(|| TranslatedPayload::text(format!("{}:{}", language, phrase)));
                (phrase.clone(), payload)
            })
            .collect())
    }
}

/// Store whose every operation fails.
#[derive(Default)]
pub struct UnavailableStore;

#[async_trait]
impl RecordStore for UnavailableStore {
    async fn lookup(
        &self,
        _phrase: &str,
        _language: &LanguageTag,
    ) -> Result<Option<CachedTranslation>, StoreError> {
        Err(StoreError::Sqlx(sqlx::Error::PoolClosed))
    }

    async fn delete(&self, _phrase: &str, _language: &LanguageTag) -> Result<(), StoreError> {
        Err(StoreError::Sqlx(sqlx::Error::PoolClosed))
    }

    async fn bulk_insert(&self, _records: &[CachedTranslation]) -> Result<(), StoreError> {
        Err(StoreError::Sqlx(sqlx::Error::PoolClosed))
    }

    async fn list_language(
        &self,
        _language: &LanguageTag,
    ) -> Result<Vec<CachedTranslation>, StoreError> {
        Err(StoreError::Sqlx(sqlx::Error::PoolClosed))
    }
}

/// Memory store whose reads return a snapshot taken `delay` before they
/// complete.
pub struct SlowStore {
    inner: MemoryRecordStore,
    delay: Duration,
}

impl SlowStore {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryRecordStore::new(),
            delay,
        })
    }
}

#[async_trait]
impl RecordStore for SlowStore {
    async fn lookup(
        &self,
        phrase: &str,
        language: &LanguageTag,
    ) -> Result<Option<CachedTranslation>, StoreError> {
        let snapshot = self.inner.lookup(phrase, language).await;
        tokio::time::sleep(self.delay).await;
        snapshot
    }

    async fn delete(&self, phrase: &str, language: &LanguageTag) -> Result<(), StoreError> {
        self.inner.delete(phrase, language).await
    }

    async fn bulk_insert(&self, records: &[CachedTranslation]) -> Result<(), StoreError> {
        self.inner.bulk_insert(records).await
    }

    async fn list_language(
        &self,
        language: &LanguageTag,
    ) -> Result<Vec<CachedTranslation>, StoreError> {
        self.inner.list_language(language).await
    }
}
