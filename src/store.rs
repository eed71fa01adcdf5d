//! Expiring translation cache.
//!
//! Records are keyed by `(phrase, language)` and carry the instant they
//! expire. Nothing sweeps expired records in the background: readers check
//! `expires_at` and delete what they find stale.

use crate::error::StoreError;
use crate::i18n::{LanguageTag, TranslatedPayload};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::BTreeMap;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedTranslation {
    pub phrase: String,
    pub language: LanguageTag,
    pub payload: TranslatedPayload,
    pub expires_at: DateTime<Utc>,
}

impl CachedTranslation {
    pub fn new(
        phrase: impl Into<String>,
        language: LanguageTag,
        payload: TranslatedPayload,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            phrase: phrase.into(),
            language,
            payload,
            expires_at,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Keyed store of cached translations.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the record for a key, expired or not.
    async fn lookup(
        &self,
        phrase: &str,
        language: &LanguageTag,
    ) -> Result<Option<CachedTranslation>, StoreError>;

    /// Delete the record for a key. Deleting a missing key is not an error.
    async fn delete(&self, phrase: &str, language: &LanguageTag) -> Result<(), StoreError>;

    /// Insert records, replacing any existing record with the same key.
    async fn bulk_insert(&self, records: &[CachedTranslation]) -> Result<(), StoreError>;

    /// All records of one language, ordered by phrase.
    async fn list_language(
        &self,
        language: &LanguageTag,
    ) -> Result<Vec<CachedTranslation>, StoreError>;

    /// Fetch the record for a key only if it is still valid at `now`.
    async fn lookup_unexpired(
        &self,
        phrase: &str,
        language: &LanguageTag,
        now: DateTime<Utc>,
    ) -> Result<Option<CachedTranslation>, StoreError> {
        Ok(self
            .lookup(phrase, language)
            .await?
            .filter(|record| !record.is_expired(now)))
    }
}

// ==================== SQLite ====================

type TranslationRow = (String, String, String);

/// Translation cache backed by an embedded SQLite database.
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Open (creating if needed) the cache database at `database_path`.
    pub async fn open(database_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .context(format!("Failed to open translation cache at {}", database_path))?;

        Self::with_pool(pool).await
    }

    /// Open a private in-memory cache that lives as long as the store.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .context("Invalid in-memory SQLite options")?;

        // A single connection that never expires keeps the in-memory database alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to open in-memory translation cache")?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS translations (
                phrase TEXT NOT NULL,
                lang TEXT NOT NULL,
                translation TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                PRIMARY KEY (phrase, lang)
            )",
        )
        .execute(&pool)
        .await
        .context("Failed to create translations table")?;

        Ok(Self { pool })
    }

    fn from_row(row: TranslationRow, language: &LanguageTag) -> Result<CachedTranslation, StoreError> {
        let (phrase, translation, expires_at) = row;

        Ok(CachedTranslation {
            phrase,
            language: language.clone(),
            payload: serde_json::from_str(&translation)?,
            expires_at: DateTime::parse_from_rfc3339(&expires_at)?.with_timezone(&Utc),
        })
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn lookup(
        &self,
        phrase: &str,
        language: &LanguageTag,
    ) -> Result<Option<CachedTranslation>, StoreError> {
        let row: Option<TranslationRow> = sqlx::query_as(
            "SELECT phrase, translation, expires_at FROM translations
             WHERE phrase = ?1 AND lang = ?2",
        )
        .bind(phrase)
        .bind(language.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| Self::from_row(row, language)).transpose()
    }

    async fn delete(&self, phrase: &str, language: &LanguageTag) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM translations WHERE phrase = ?1 AND lang = ?2")
            .bind(phrase)
            .bind(language.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn bulk_insert(&self, records: &[CachedTranslation]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for record in records {
            sqlx::query(
                "INSERT INTO translations (phrase, lang, translation, expires_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (phrase, lang) DO UPDATE SET
                    translation = excluded.translation,
                    expires_at = excluded.expires_at",
            )
            .bind(&record.phrase)
            .bind(record.language.as_str())
            .bind(serde_json::to_string(&record.payload)?)
            .bind(record.expires_at.to_rfc3339_opts(SecondsFormat::Millis, true))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn list_language(
        &self,
        language: &LanguageTag,
    ) -> Result<Vec<CachedTranslation>, StoreError> {
        let rows: Vec<TranslationRow> = sqlx::query_as(
            "SELECT phrase, translation, expires_at FROM translations
             WHERE lang = ?1
             ORDER BY phrase",
        )
        .bind(language.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| Self::from_row(row, language))
            .collect()
    }
}

// ==================== In-memory ====================

/// Translation cache kept in process memory, ordered by language then phrase.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<BTreeMap<(LanguageTag, String), CachedTranslation>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held, expired ones included.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether no record is held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn lookup(
        &self,
        phrase: &str,
        language: &LanguageTag,
    ) -> Result<Option<CachedTranslation>, StoreError> {
        let key = (language.clone(), phrase.to_string());
        Ok(self.records.lock().get(&key).cloned())
    }

    async fn delete(&self, phrase: &str, language: &LanguageTag) -> Result<(), StoreError> {
        let key = (language.clone(), phrase.to_string());
        self.records.lock().remove(&key);
        Ok(())
    }

    async fn bulk_insert(&self, records: &[CachedTranslation]) -> Result<(), StoreError> {
        let mut map = self.records.lock();
        for record in records {
            map.insert(
                (record.language.clone(), record.phrase.clone()),
                record.clone(),
            );
        }
        Ok(())
    }

    async fn list_language(
        &self,
        language: &LanguageTag,
    ) -> Result<Vec<CachedTranslation>, StoreError> {
        let map = self.records.lock();
        Ok(map
            .range((language.clone(), String::new())..)
            .take_while(|((lang, _), _)| lang == language)
            .map(|(_, record)| record.clone())
            .collect())
    }
}
