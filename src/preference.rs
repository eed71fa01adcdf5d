//! Persistence of the user's chosen language.

use crate::i18n::LanguageTag;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::path::PathBuf;
use tracing::warn;

/// Where the active language survives between sessions.
pub trait LanguagePreference: Send + Sync {
    /// The stored language, if any. Unreadable or invalid values count as absent.
    fn get(&self) -> Option<LanguageTag>;

    fn set(&self, language: &LanguageTag) -> Result<()>;
}

pub const PREFERENCE_KEY: &str = "preferred-language";

/// Preference kept as a `key=value` line in a small text file.
///
/// Other lines in the file are left untouched on write.
#[derive(Debug, Clone)]
pub struct FilePreference {
    path: PathBuf,
}

impl FilePreference {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_lines(&self) -> Result<Vec<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(content.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e).with_context(|| {
                format!("Failed to read language preference: {}", self.path.display())
            }),
        }
    }
}

fn value_of(line: &str) -> Option<&str> {
    let (key, value) = line.split_once('=')?;
    (key.trim() == PREFERENCE_KEY).then(|| value.trim())
}

impl LanguagePreference for FilePreference {
    fn get(&self) -> Option<LanguageTag> {
        let lines = match self.read_lines() {
            Ok(lines) => lines,
            Err(e) => {
                warn!("{:#}", e);
                return None;
            }
        };

        let value = lines.iter().find_map(|line| value_of(line))?;
        match LanguageTag::parse(value) {
            Ok(language) => Some(language),
            Err(e) => {
                warn!("Ignoring stored language '{}': {}", value, e);
                None
            }
        }
    }

    fn set(&self, language: &LanguageTag) -> Result<()> {
        let entry = format!("{}={}", PREFERENCE_KEY, language);
        let mut lines = self.read_lines()?;

        match lines.iter_mut().find(|line| value_of(line).is_some()) {
            Some(line) => *line = entry,
            None => lines.push(entry),
        }

        let mut content = lines.join("\n");
        content.push('\n');
        std::fs::write(&self.path, content).with_context(|| {
            format!("Failed to write language preference: {}", self.path.display())
        })
    }
}

/// Preference held in memory; counts writes.
#[derive(Debug, Default)]
pub struct MemoryPreference {
    language: Mutex<Option<LanguageTag>>,
    writes: Mutex<usize>,
}

impl MemoryPreference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_language(language: LanguageTag) -> Self {
        Self {
            language: Mutex::new(Some(language)),
            writes: Mutex::new(0),
        }
    }

    /// Number of successful `set` calls.
    pub fn writes(&self) -> usize {
        *self.writes.lock()
    }
}

impl LanguagePreference for MemoryPreference {
    fn get(&self) -> Option<LanguageTag> {
        self.language.lock().clone()
    }

    fn set(&self, language: &LanguageTag) -> Result<()> {
        *self.language.lock() = Some(language.clone());
        *self.writes.lock() += 1;
        Ok(())
    }
}
