//! Fault-tolerant extraction of structured records from model output.
//!
//! Generative models wrap JSON in prose, truncate it, or corrupt one
//! element of an otherwise valid list. [`extract_records`] salvages every
//! record that decodes and drops the ones that don't, one at a time.
//!
//! # Algorithm
//!
//! 1. Fast path: take the first `[ { ... } ]` block matched by a regex and
//!    decode it as a whole list. On success, done.
//! 2. Streaming scan: from the first `[`, walk the text tracking brace
//!    depth (`{` +1, `}` -1, never below 0). Each time depth returns to 0
//!    on a `}`, decode the span since the matching `{` as one record;
//!    keep it on success, drop it on failure, and keep scanning.
//!
//! Text without any `[` yields no records, same as an empty array.
//!
//! Braces inside JSON strings are counted like any other brace. A string
//! holding an unbalanced `{` merges neighbouring records into one span,
//! which then fails to decode and is dropped.

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

fn array_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\[\s*\{.*?\}\s*\]").expect("valid array regex"))
}

/// Extract every decodable `T` from `raw`.
pub fn extract_records<T: DeserializeOwned>(raw: &str) -> Vec<T> {
    if let Some(records) = decode_first_array(raw) {
        return records;
    }
    stream_records(raw)
}

/// [`extract_records`] into untyped JSON values.
pub fn extract_values(raw: &str) -> Vec<Value> {
    extract_records(raw)
}

/// Decode the first regex-matched `[ {..} ]` block as a whole list.
fn decode_first_array<T: DeserializeOwned>(raw: &str) -> Option<Vec<T>> {
    let found = array_re().find(raw)?;
    serde_json::from_str(found.as_str()).ok()
}

/// Brace-balanced scan from the first `[`, decoding each top-level object
/// independently.
pub fn stream_records<T: DeserializeOwned>(raw: &str) -> Vec<T> {
    let Some(start) = raw.find('[') else {
        return Vec::new();
    };

    let mut records = Vec::new();
    let mut depth: usize = 0;
    let mut span_start: Option<usize> = None;
    let mut dropped = 0usize;

    for (offset, ch) in raw[start..].char_indices() {
        let pos = start + offset;
        match ch {
            '{' => {
                if depth == 0 {
                    span_start = Some(pos);
                }
                depth += 1;
            }
            '}' => {
                if depth == 0 {
                    continue;
                }
                depth -= 1;
                if depth == 0 {
                    if let Some(begin) = span_start.take() {
                        let span = &raw[begin..=pos];
                        match serde_json::from_str::<T>(span) {
                            Ok(record) => records.push(record),
                            Err(e) => {
                                dropped += 1;
                                tracing::warn!(error = %e, "dropping malformed record");
                                tracing::debug!(span, "malformed record text");
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    if dropped > 0 || depth > 0 {
        tracing::info!(
            kept = records.len(),
            dropped,
            unterminated = depth > 0,
            "salvaged records from model output"
        );
    }
    records
}

/// Decode a single JSON object spanning the first `{` to the last `}`.
///
/// Used for envelope-shaped responses such as `{ "files": [...] }`.
pub fn extract_object<T: DeserializeOwned>(raw: &str) -> Option<T> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&raw[start..=end]).ok()
}
