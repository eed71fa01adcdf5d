//! Language-facing building blocks shared by the resolution pipeline.
//!
//! # Architecture
//!
//! - `language`: validated language tags
//! - `payload`: the value a phrase resolves to, and its wire form
//! - `text`: pure placeholder, case-matching and classification helpers
//! - `metrics`: cache and lookup counters

mod language;
mod metrics;
mod payload;
mod text;

pub use language::LanguageTag;
pub use metrics::{MetricsReport, ResolutionMetrics};
pub use payload::{TranslatedPayload, WireTranslation, IN_PROGRESS_MARKER};
pub use text::{match_case, needs_translation, split_segments, substitute, Replacements, Segment};
