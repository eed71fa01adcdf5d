use crate::i18n::LanguageTag;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Months, Utc};
use std::str::FromStr;

/// How long a fetched translation stays valid in the cache.
///
/// Calendar units (years, quarters, months) are applied first, then the
/// fixed-length units, so "months=1" from Jan 31 lands on the last day of
/// February rather than a fixed 30 days later.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidityWindow {
    pub years: u32,
    pub quarters: u32,
    pub months: u32,
    pub weeks: u32,
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
    pub milliseconds: u32,
}

impl ValidityWindow {
    pub fn days(days: u32) -> Self {
        Self {
            days,
            ..Self::default()
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    /// The instant a record written at `now` expires.
    pub fn expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let months = self
            .years
            .saturating_mul(12)
            .saturating_add(self.quarters.saturating_mul(3))
            .saturating_add(self.months);

        let fixed = Duration::weeks(i64::from(self.weeks))
            + Duration::days(i64::from(self.days))
            + Duration::hours(i64::from(self.hours))
            + Duration::minutes(i64::from(self.minutes))
            + Duration::seconds(i64::from(self.seconds))
            + Duration::milliseconds(i64::from(self.milliseconds));

        now.checked_add_months(Months::new(months))
            .and_then(|t| t.checked_add_signed(fixed))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl FromStr for ValidityWindow {
    type Err = anyhow::Error;

    /// Parse a comma separated list of `unit=amount` pairs, e.g. `days=7,hours=12`.
    fn from_str(s: &str) -> Result<Self> {
        let mut window = ValidityWindow::default();

        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (unit, amount) = part
                .split_once('=')
                .with_context(|| format!("Invalid validity entry '{}'. Expected unit=amount", part))?;
            let amount: u32 = amount
                .trim()
                .parse()
                .with_context(|| format!("Invalid validity amount in '{}'", part))?;

            let slot = match unit.trim() {
                "years" => &mut window.years,
                "quarters" => &mut window.quarters,
                "months" => &mut window.months,
                "weeks" => &mut window.weeks,
                "days" => &mut window.days,
                "hours" => &mut window.hours,
                "minutes" => &mut window.minutes,
                "seconds" => &mut window.seconds,
                "milliseconds" => &mut window.milliseconds,
                other => bail!("Unknown validity unit: '{}'", other),
            };
            *slot = amount;
        }

        Ok(window)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Lookup service
    pub base_url: String,
    pub request_timeout_secs: u64,

    // Batching
    pub debounce_time_ms: u64,

    // Cache
    pub validity: ValidityWindow,
    pub database_path: String,

    // Languages
    pub base_language: LanguageTag,
    pub language_file: String,

    // Diagnostics
    pub diagnostic_mode: bool,
}

impl Config {
    /// Configuration with defaults for everything except the lookup service URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout_secs: 10,
            debounce_time_ms: 300,
            validity: ValidityWindow::days(1),
            database_path: "translations.db".to_string(),
            base_language: LanguageTag::ENGLISH,
            language_file: ".preferred-language".to_string(),
            diagnostic_mode: false,
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self {
            // Lookup service
            base_url: std::env::var("TRANSLATION_BASE_URL")
                .context("TRANSLATION_BASE_URL not set")?,
            request_timeout_secs: std::env::var("TRANSLATION_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),

            // Batching
            debounce_time_ms: std::env::var("TRANSLATION_DEBOUNCE_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),

            // Cache
            validity: match std::env::var("TRANSLATION_VALIDITY") {
                Ok(v) => v.parse().context("Invalid TRANSLATION_VALIDITY")?,
                Err(_) => ValidityWindow::days(1),
            },
            database_path: std::env::var("TRANSLATION_DB_PATH")
                .unwrap_or_else(|_| "translations.db".to_string()),

            // Languages
            base_language: match std::env::var("BASE_LANGUAGE") {
                Ok(v) => LanguageTag::parse(&v).context("Invalid BASE_LANGUAGE")?,
                Err(_) => LanguageTag::ENGLISH,
            },
            language_file: std::env::var("LANGUAGE_PREFERENCE_FILE")
                .unwrap_or_else(|_| ".preferred-language".to_string()),

            // Diagnostics
            diagnostic_mode: std::env::var("TRANSLATION_DIAGNOSTIC_MODE")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        })
    }

    pub fn debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.debounce_time_ms)
    }
}
