//! Pure text helpers applied around resolution.
//!
//! Placeholders in phrases use the `%KEY%` form. None of these functions
//! touch the network or the cache.

use crate::i18n::payload::IN_PROGRESS_MARKER;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Placeholder values keyed by placeholder name (without the `%` delimiters).
pub type Replacements = BTreeMap<String, String>;

/// One piece of a phrase split around its placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal phrase text between placeholders
    Text(String),
    /// The value substituted for a placeholder
    Value(String),
}

impl Segment {
    pub fn as_str(&self) -> &str {
        match self {
            Segment::Text(s) | Segment::Value(s) => s,
        }
    }
}

static PLACEHOLDER_ONLY_REGEX: OnceLock<Regex> = OnceLock::new();

/// Replace every `%KEY%` in `text` with its value.
pub fn substitute(text: &str, replacements: &Replacements) -> String {
    replacements
        .iter()
        .filter(|(key, _)| !key.is_empty())
        .fold(text.to_string(), |acc, (key, value)| {
            acc.replace(&format!("%{}%", key), value)
        })
}

/// Re-case `target` to follow the capitalization of `reference`.
///
/// If `reference` starts with an upper-case character (or one without case),
/// the first character of `target` is upper-cased and the rest kept as is.
/// Otherwise `target` is lower-cased entirely. Empty inputs return `target`.
pub fn match_case(reference: &str, target: &str) -> String {
    let Some(first) = reference.chars().next() else {
        return target.to_string();
    };
    if target.is_empty() {
        return String::new();
    }

    let starts_upper = first.to_uppercase().eq(std::iter::once(first));
    if starts_upper {
        let mut chars = target.chars();
        match chars.next() {
            Some(head) => head.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    } else {
        target.to_lowercase()
    }
}

/// Split `text` into literal segments and placeholder values, in order.
///
/// Placeholders whose key is not in `replacements` stay part of the
/// surrounding literal text. Empty literal pieces are dropped.
pub fn split_segments(text: &str, replacements: &Replacements) -> Vec<Segment> {
    let tokens: Vec<(String, &String)> = replacements
        .iter()
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (format!("%{}%", key), value))
        .collect();

    let mut segments = Vec::new();
    let mut rest = text;

    loop {
        let next = tokens
            .iter()
            .filter_map(|(token, value)| rest.find(token.as_str()).map(|at| (at, token.len(), *value)))
            .min_by_key(|(at, len, _)| (*at, std::cmp::Reverse(*len)));

        match next {
            Some((at, len, value)) => {
                if at > 0 {
                    segments.push(Segment::Text(rest[..at].to_string()));
                }
                segments.push(Segment::Value(value.clone()));
                rest = &rest[at + len..];
            }
            None => {
                if !rest.is_empty() {
                    segments.push(Segment::Text(rest.to_string()));
                }
                return segments;
            }
        }
    }
}

/// Decide whether a phrase carries linguistic content worth a lookup.
///
/// Returns `false` for text without any letter (numbers, symbols, blanks),
/// for provisional values that already carry the in-progress marker, and for
/// a lone `${name}` template placeholder.
pub fn needs_translation(phrase: &str) -> bool {
    let trimmed = phrase.trim();

    if trimmed.contains(IN_PROGRESS_MARKER) {
        return false;
    }

    let placeholder_only = PLACEHOLDER_ONLY_REGEX
        .get_or_init(|| Regex::new(r"^\$\{[^}]+\}$").expect("placeholder regex is valid"));
    if placeholder_only.is_match(trimmed) {
        return false;
    }

    trimmed.chars().any(char::is_alphabetic)
}
