//! Phrase resolution engine.
//!
//! The engine hands out one `watch` channel per phrase and keeps it filled
//! with the best value available for the active language:
//!
//! 1. Base language: the phrase itself, published synchronously.
//! 2. Phrases without linguistic content: the phrase itself, no lookup.
//! 3. Unexpired cache record: the stored payload.
//! 4. Otherwise: an in-progress value, then whatever the batched lookup
//!    yields (translation, or the phrase itself on failure).
//!
//! Changing the language re-runs this for every phrase seen so far.
//!
//! All `resolve*` and `set_language` calls spawn tasks and must run inside a
//! tokio runtime.

use crate::backend::TranslationBackend;
use crate::channel::PhraseRegistry;
use crate::config::Config;
use crate::coordinator::{BatchCoordinator, BatchSettings};
use crate::i18n::{
    match_case, needs_translation, split_segments, substitute, LanguageTag, MetricsReport,
    Replacements, ResolutionMetrics, TranslatedPayload,
};
use crate::preference::LanguagePreference;
use crate::store::RecordStore;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

struct EngineInner {
    base_language: LanguageTag,
    registry: Arc<PhraseRegistry>,
    coordinator: BatchCoordinator,
    store: Arc<dyn RecordStore>,
    preference: Arc<dyn LanguagePreference>,
    language: watch::Sender<LanguageTag>,
    metrics: Arc<ResolutionMetrics>,
}

#[derive(Clone)]
pub struct ResolutionEngine {
    inner: Arc<EngineInner>,
}

impl ResolutionEngine {
    /// Build an engine, restoring the active language from `preference`.
    ///
    /// When nothing is stored the base language becomes active and is
    /// written back.
    pub fn new(
        config: &Config,
        store: Arc<dyn RecordStore>,
        backend: Arc<dyn TranslationBackend>,
        preference: Arc<dyn LanguagePreference>,
    ) -> Self {
        let initial = match preference.get() {
            Some(language) => language,
            None => {
                let base = config.base_language.clone();
                if let Err(e) = preference.set(&base) {
                    warn!("Failed to persist base language {}: {:#}", base, e);
                }
                base
            }
        };
        info!("Active language: {}", initial);

        let (language, active) = watch::channel(initial);
        let registry = Arc::new(PhraseRegistry::new());
        let metrics = Arc::new(ResolutionMetrics::new());
        let coordinator = BatchCoordinator::new(
            BatchSettings::from_config(config),
            backend,
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::clone(&metrics),
            active,
        );

        Self {
            inner: Arc::new(EngineInner {
                base_language: config.base_language.clone(),
                registry,
                coordinator,
                store,
                preference,
                language,
                metrics,
            }),
        }
    }

    /// The channel for `phrase`, created and resolved on first request.
    pub fn resolve(&self, phrase: &str) -> watch::Receiver<TranslatedPayload> {
        let (receiver, created) = self.inner.registry.channel_for(phrase);
        if created {
            self.translate(phrase);
        }
        receiver
    }

    /// The primary text of `phrase`.
    pub fn resolve_text(&self, phrase: &str) -> watch::Receiver<String> {
        derive(vec![self.resolve(phrase)], |payloads| {
            payloads[0].translation.clone()
        })
    }

    /// The primary text of `phrase` with every `%KEY%` replaced.
    pub fn resolve_with_replacements(
        &self,
        phrase: &str,
        replacements: &Replacements,
    ) -> watch::Receiver<String> {
        let replacements = replacements.clone();
        derive(vec![self.resolve(phrase)], move |payloads| {
            substitute(&payloads[0].translation, &replacements)
        })
    }

    /// Translate the text around placeholders and the substituted values
    /// separately, then join them in their original order.
    pub fn resolve_segments(
        &self,
        phrase: &str,
        replacements: &Replacements,
    ) -> watch::Receiver<String> {
        let sources = split_segments(phrase, replacements)
            .iter()
            .map(|segment| self.resolve(segment.as_str()))
            .collect();

        derive(sources, |payloads| {
            payloads
                .iter()
                .map(|payload| payload.translation.as_str())
                .collect()
        })
    }

    /// The "yes" or "no" variant of `phrase`, cased like `value`.
    ///
    /// `value` selects the variant ("yes" in any case picks yes, anything
    /// else picks no) and is itself the fallback when the variant is missing.
    /// Lower-case input gives lower-case output ("yes" gives "oui"), while
    /// capitalized input capitalizes the variant ("Yes" gives "Oui").
    pub fn resolve_yes_no(&self, phrase: &str, value: &str) -> watch::Receiver<String> {
        let value = value.to_string();
        derive(vec![self.resolve(phrase)], move |payloads| {
            let payload = &payloads[0];
            let variant = if value.eq_ignore_ascii_case("yes") {
                payload.yes.as_deref()
            } else {
                payload.no.as_deref()
            };
            match_case(&value, variant.unwrap_or(&value))
        })
    }

    /// Switch the active language and re-resolve every known phrase.
    ///
    /// Returns `false` and does nothing when `language` is already active.
    pub fn set_language(&self, language: LanguageTag) -> bool {
        let changed = self.inner.language.send_if_modified(|current| {
            if *current == language {
                false
            } else {
                *current = language.clone();
                true
            }
        });
        if !changed {
            debug!("Language already {}", language);
            return false;
        }

        if let Err(e) = self.inner.preference.set(&language) {
            warn!("Failed to persist language {}: {:#}", language, e);
        }

        let phrases = self.inner.registry.known_phrases();
        info!(
            "Active language set to {}, re-resolving {} phrases",
            language,
            phrases.len()
        );
        for phrase in &phrases {
            self.translate(phrase);
        }
        true
    }

    /// Get the active language.
    pub fn language(&self) -> LanguageTag {
        self.inner.language.borrow().clone()
    }

    /// Follow the active language.
    pub fn language_stream(&self) -> watch::Receiver<LanguageTag> {
        self.inner.language.subscribe()
    }

    /// Get the language phrases are written in.
    pub fn base_language(&self) -> &LanguageTag {
        &self.inner.base_language
    }

    /// Get a snapshot of the resolution counters.
    pub fn metrics(&self) -> MetricsReport {
        self.inner.metrics.report()
    }

    fn translate(&self, phrase: &str) {
        let inner = &self.inner;
        let language = inner.language.borrow().clone();

        if language == inner.base_language {
            inner.registry.publish(phrase, TranslatedPayload::identity(phrase));
            return;
        }

        if !needs_translation(phrase) {
            debug!("'{}' has nothing to translate", phrase);
            inner.metrics.record_identity();
            inner.registry.publish(phrase, TranslatedPayload::identity(phrase));
            return;
        }

        // Marks the current value as seen, so the lookup can tell whether
        // anything newer landed while it was reading the cache.
        let Some(since) = inner.registry.subscribe(phrase) else {
            return;
        };

        let inner = Arc::clone(inner);
        let phrase = phrase.to_string();
        tokio::spawn(async move {
            inner.lookup(phrase, language, since).await;
        });
    }
}

impl EngineInner {
    /// Publish `payload` unless `language` is no longer active or the channel
    /// changed after `since` last saw it.
    ///
    /// The language guard is held across the publish so a switch cannot land
    /// between the check and the send.
    fn publish_fresh(
        &self,
        phrase: &str,
        language: &LanguageTag,
        payload: TranslatedPayload,
        since: &watch::Receiver<TranslatedPayload>,
    ) -> bool {
        let active = self.language.borrow();
        if *active != *language {
            debug!(
                "Skipping '{}': {} is no longer the active language",
                phrase, language
            );
            return false;
        }
        if !self.registry.publish_unless_changed(phrase, payload, since) {
            debug!("Skipping '{}' in {}: a newer value landed", phrase, language);
            return false;
        }
        true
    }

    async fn lookup(
        &self,
        phrase: String,
        language: LanguageTag,
        since: watch::Receiver<TranslatedPayload>,
    ) {
        match self.store.lookup(&phrase, &language).await {
            Ok(Some(record)) if !record.is_expired(Utc::now()) => {
                debug!("Cache hit for '{}' in {}", phrase, language);
                self.metrics.record_cache_hit();
                self.publish_fresh(&phrase, &language, record.payload, &since);
                return;
            }
            Ok(Some(_)) => {
                debug!("Cached '{}' in {} has expired", phrase, language);
                if let Err(e) = self.store.delete(&phrase, &language).await {
                    warn!(
                        "Failed to delete expired '{}' in {}: {}",
                        phrase, language, e
                    );
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Cache lookup for '{}' in {} failed: {}", phrase, language, e);
            }
        }

        self.metrics.record_cache_miss();
        let in_progress = TranslatedPayload::in_progress(&phrase);
        if self.publish_fresh(&phrase, &language, in_progress, &since) {
            self.coordinator.enqueue(&phrase, &language);
        }
    }
}

/// Combine the latest values of `sources` into a derived channel.
///
/// The derived channel is recomputed whenever any source changes and stops
/// following its sources once every derived receiver is dropped.
fn derive<F>(mut sources: Vec<watch::Receiver<TranslatedPayload>>, combine: F) -> watch::Receiver<String>
where
    F: Fn(&[TranslatedPayload]) -> String + Send + 'static,
{
    fn snapshot(sources: &mut [watch::Receiver<TranslatedPayload>]) -> Vec<TranslatedPayload> {
        sources
            .iter_mut()
            .map(|source| source.borrow_and_update().clone())
            .collect()
    }

    let (tx, rx) = watch::channel(combine(&snapshot(&mut sources)));
    if sources.is_empty() {
        return rx;
    }

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                (changed, _, _) = futures::future::select_all(
                    sources.iter_mut().map(|source| Box::pin(source.changed())),
                ) => {
                    if changed.is_err() {
                        break;
                    }
                }
            }

            let next = combine(&snapshot(&mut sources));
            tx.send_if_modified(|current| {
                if *current == next {
                    false
                } else {
                    *current = next;
                    true
                }
            });
        }
    });

    rx
}
