//! Resolve UI phrases into the active language.
//!
//! Phrases are served from an expiring cache when possible and otherwise
//! fetched from a lookup service in debounced, per-language batches. Every
//! phrase is exposed as a `watch` channel that always holds something
//! displayable.

pub mod backend;
pub mod channel;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod i18n;
pub mod preference;
pub mod store;

#[cfg(test)]
mod testing;

pub use engine::ResolutionEngine;
