//! Debounced, per-language batching of translation lookups.
//!
//! Phrases that miss the cache are queued per language. Each enqueue restarts
//! that language's debounce timer; when the timer elapses the queued phrases
//! go out as a single lookup. At most one lookup per language is in flight at
//! a time, and a phrase that is queued or in flight is not queued again.

use crate::backend::TranslationBackend;
use crate::channel::PhraseRegistry;
use crate::config::{Config, ValidityWindow};
use crate::i18n::{LanguageTag, ResolutionMetrics, TranslatedPayload};
use crate::store::{CachedTranslation, RecordStore};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Tunables for the batch coordinator.
#[derive(Debug, Clone, Copy)]
pub struct BatchSettings {
    pub debounce: Duration,
    pub validity: ValidityWindow,
    pub diagnostic_mode: bool,
}

impl BatchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            debounce: config.debounce(),
            validity: config.validity,
            diagnostic_mode: config.diagnostic_mode,
        }
    }
}

struct DebounceTimer {
    generation: u64,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct LanguageQueue {
    pending: Vec<String>,
    in_flight: HashSet<String>,
    timer: Option<DebounceTimer>,
    generation: u64,
    flight: Arc<tokio::sync::Mutex<()>>,
}

struct CoordinatorInner {
    settings: BatchSettings,
    backend: Arc<dyn TranslationBackend>,
    store: Arc<dyn RecordStore>,
    registry: Arc<PhraseRegistry>,
    metrics: Arc<ResolutionMetrics>,
    active_language: watch::Receiver<LanguageTag>,
    queues: Mutex<HashMap<LanguageTag, LanguageQueue>>,
}

#[derive(Clone)]
pub struct BatchCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl BatchCoordinator {
    pub fn new(
        settings: BatchSettings,
        backend: Arc<dyn TranslationBackend>,
        store: Arc<dyn RecordStore>,
        registry: Arc<PhraseRegistry>,
        metrics: Arc<ResolutionMetrics>,
        active_language: watch::Receiver<LanguageTag>,
    ) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                settings,
                backend,
                store,
                registry,
                metrics,
                active_language,
                queues: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Queue a phrase for the next lookup in `language`.
    ///
    /// Returns `false` when nothing was queued: the phrase is empty, already
    /// waiting for the timer, or part of a lookup that has not completed.
    /// Must be called from within a tokio runtime.
    pub fn enqueue(&self, phrase: &str, language: &LanguageTag) -> bool {
        if phrase.is_empty() {
            return false;
        }

        let mut queues = self.inner.queues.lock();
        let queue = queues.entry(language.clone()).or_default();

        if queue.in_flight.contains(phrase) || queue.pending.iter().any(|p| p == phrase) {
            debug!("'{}' already queued for {}", phrase, language);
            return false;
        }

        queue.pending.push(phrase.to_string());

        if let Some(timer) = queue.timer.take() {
            timer.task.abort();
        }
        queue.generation += 1;
        let generation = queue.generation;

        let inner = Arc::clone(&self.inner);
        let target = language.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(inner.settings.debounce).await;
            inner.fire(target, generation).await;
        });
        queue.timer = Some(DebounceTimer { generation, task });

        debug!(
            "Queued '{}' for {} ({} pending)",
            phrase,
            language,
            queue.pending.len()
        );
        true
    }

    /// Phrases waiting for the debounce timer in `language`, in arrival order.
    #[cfg(test)]
    pub fn pending(&self, language: &LanguageTag) -> Vec<String> {
        self.inner
            .queues
            .lock()
            .get(language)
            .map(|queue| queue.pending.clone())
            .unwrap_or_default()
    }

    /// Whether a debounce timer is armed for `language`.
    #[cfg(test)]
    pub fn is_scheduled(&self, language: &LanguageTag) -> bool {
        self.inner
            .queues
            .lock()
            .get(language)
            .and_then(|queue| queue.timer.as_ref())
            .is_some()
    }

    /// Whether `phrase` is part of a lookup for `language` that has not completed.
    #[cfg(test)]
    pub fn is_in_flight(&self, phrase: &str, language: &LanguageTag) -> bool {
        self.inner
            .queues
            .lock()
            .get(language)
            .is_some_and(|queue| queue.in_flight.contains(phrase))
    }
}

impl CoordinatorInner {
    async fn fire(self: Arc<Self>, language: LanguageTag, generation: u64) {
        let (phrases, flight) = {
            let mut queues = self.queues.lock();
            let Some(queue) = queues.get_mut(&language) else {
                return;
            };
            let current = queue.timer.as_ref().map(|timer| timer.generation);
            if current != Some(generation) {
                // Superseded by a later enqueue.
                return;
            }
            queue.timer = None;

            let phrases = std::mem::take(&mut queue.pending);
            queue.in_flight.extend(phrases.iter().cloned());
            (phrases, Arc::clone(&queue.flight))
        };

        if phrases.is_empty() {
            return;
        }

        let _flight = flight.lock().await;
        let outcomes = self.send_batch(&language, &phrases).await;

        // Cleared before publishing so a phrase re-resolved after seeing its
        // result can be queued again.
        {
            let mut queues = self.queues.lock();
            if let Some(queue) = queues.get_mut(&language) {
                for phrase in &phrases {
                    queue.in_flight.remove(phrase);
                }
            }
        }

        for (phrase, payload) in outcomes {
            self.publish(&language, &phrase, payload);
        }
    }

    /// Fetch and cache one batch, returning the value to publish for every
    /// phrase in request order.
    async fn send_batch(
        &self,
        language: &LanguageTag,
        phrases: &[String],
    ) -> Vec<(String, TranslatedPayload)> {
        info!(
            "Sending lookup for {} phrases in {}",
            phrases.len(),
            language
        );
        self.metrics.record_batch(phrases.len());

        match self.backend.fetch(language, phrases).await {
            Ok(mut translations) => {
                let expires_at = self.settings.validity.expires_at(Utc::now());
                let records: Vec<CachedTranslation> = translations
                    .iter()
                    .map(|(phrase, payload)| {
                        CachedTranslation::new(phrase, language.clone(), payload.clone(), expires_at)
                    })
                    .collect();

                if let Err(e) = self.store.bulk_insert(&records).await {
                    warn!(
                        "Failed to cache {} translations for {}: {}",
                        records.len(),
                        language,
                        e
                    );
                }

                phrases
                    .iter()
                    .map(|phrase| {
                        let payload = match translations.remove(phrase) {
                            Some(payload) => payload,
                            None => {
                                warn!("Lookup for {} returned nothing for '{}'", language, phrase);
                                self.fallback(phrase)
                            }
                        };
                        (phrase.clone(), payload)
                    })
                    .collect()
            }
            Err(e) => {
                self.metrics.record_batch_failure();
                warn!(
                    "Lookup for {} phrases in {} failed, showing originals: {}",
                    phrases.len(),
                    language,
                    e
                );
                phrases
                    .iter()
                    .map(|phrase| (phrase.clone(), self.fallback(phrase)))
                    .collect()
            }
        }
    }

    fn fallback(&self, phrase: &str) -> TranslatedPayload {
        if self.settings.diagnostic_mode {
            TranslatedPayload::diagnostic(phrase)
        } else {
            TranslatedPayload::identity(phrase)
        }
    }

    fn publish(&self, language: &LanguageTag, phrase: &str, payload: TranslatedPayload) {
        // Held across the publish so a language switch cannot slip in between.
        let active = self.active_language.borrow();
        if *active != *language {
            debug!(
                "Dropping result for '{}': {} is no longer the active language",
                phrase, language
            );
            return;
        }
        self.registry.publish(phrase, payload);
    }
}
