//! Per-phrase value channels.
//!
//! Every phrase gets exactly one `watch` channel for the lifetime of the
//! registry. A channel always holds a displayable value: it starts as the
//! phrase itself and is overwritten as better values arrive. Subscribers
//! joining late see the latest value immediately.

use crate::i18n::TranslatedPayload;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::watch;

#[derive(Debug, Default)]
pub struct PhraseRegistry {
    channels: Mutex<HashMap<String, watch::Sender<TranslatedPayload>>>,
}

impl PhraseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a phrase, creating its channel on first access.
    ///
    /// Returns the receiver and whether the channel was created by this call.
    pub fn channel_for(&self, phrase: &str) -> (watch::Receiver<TranslatedPayload>, bool) {
        let mut channels = self.channels.lock();
        if let Some(sender) = channels.get(phrase) {
            return (sender.subscribe(), false);
        }

        let (sender, receiver) = watch::channel(TranslatedPayload::identity(phrase));
        channels.insert(phrase.to_string(), sender);
        (receiver, true)
    }

    /// Replace the value of a phrase's channel and notify its subscribers.
    ///
    /// Returns `false` if the phrase has no channel.
    pub fn publish(&self, phrase: &str, payload: TranslatedPayload) -> bool {
        let channels = self.channels.lock();
        match channels.get(phrase) {
            Some(sender) => {
                sender.send_replace(payload);
                true
            }
            None => false,
        }
    }

    /// Replace the value of a phrase's channel only if nothing was published
    /// to it since `since` last saw it.
    ///
    /// Returns `false` if the phrase has no channel or a newer value landed.
    pub fn publish_unless_changed(
        &self,
        phrase: &str,
        payload: TranslatedPayload,
        since: &watch::Receiver<TranslatedPayload>,
    ) -> bool {
        let channels = self.channels.lock();
        let Some(sender) = channels.get(phrase) else {
            return false;
        };
        if since.has_changed().unwrap_or(true) {
            return false;
        }
        sender.send_replace(payload);
        true
    }

    /// A receiver for an existing phrase that has seen its current value.
    pub fn subscribe(&self, phrase: &str) -> Option<watch::Receiver<TranslatedPayload>> {
        self.channels.lock().get(phrase).map(|sender| sender.subscribe())
    }

    /// The value a phrase's channel currently holds.
    pub fn current(&self, phrase: &str) -> Option<TranslatedPayload> {
        self.channels
            .lock()
            .get(phrase)
            .map(|sender| sender.borrow().clone())
    }

    #[cfg(test)]
    pub fn contains(&self, phrase: &str) -> bool {
        self.channels.lock().contains_key(phrase)
    }

    /// Every phrase that has a channel.
    pub fn known_phrases(&self) -> BTreeSet<String> {
        self.channels.lock().keys().cloned().collect()
    }

    /// Number of phrases with a channel.
    pub fn len(&self) -> usize {
        self.channels.lock().len()
    }

    /// Whether no phrase has a channel yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
