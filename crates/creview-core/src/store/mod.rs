//! Guideline storage abstraction.
//!
//! The [`GuidelineStore`] trait owns guideline records. The review
//! pipeline only reads a snapshot through
//! [`load_all`](GuidelineStore::load_all); the editing operations back the
//! guideline API and CLI.
//!
//! Implementations must be `Send + Sync` so one store can be shared by
//! request handlers.

pub mod memory;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::GuidelineRecord;

/// Guideline fields supplied by an editor. The id is assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuidelineDraft {
    pub rule: String,
    pub severity: String,
    #[serde(default)]
    pub category: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl GuidelineDraft {
    /// Build a full record with `id`.
    pub fn into_record(self, id: String) -> GuidelineRecord {
        GuidelineRecord {
            id,
            rule: self.rule,
            severity: self.severity,
            category: self.category,
            description: self.description,
            example: self.example,
            suggestion: self.suggestion,
        }
    }

    /// Rule and description are what gets embedded; both must be present.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.rule.trim().is_empty() {
            return Err("rule must not be empty".to_string());
        }
        if self.description.trim().is_empty() {
            return Err("description must not be empty".to_string());
        }
        Ok(())
    }
}

/// Next free id of the form `G001`, `G002`, ...
///
/// Starts from `len + 1` and skips ids already taken, so deleting a
/// record never causes a new one to reuse a live id.
pub fn next_guideline_id(existing: &[GuidelineRecord]) -> String {
    let mut n = existing.len() + 1;
    loop {
        let candidate = format!("G{n:03}");
        if !existing.iter().any(|g| g.id == candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Storage backend for guideline records.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`load_all`](GuidelineStore::load_all) | Snapshot of every record, in store order |
/// | [`get`](GuidelineStore::get) | One record by id |
/// | [`add`](GuidelineStore::add) | Append a record with a fresh id |
/// | [`update`](GuidelineStore::update) | Replace a record's fields, keeping its id |
/// | [`delete`](GuidelineStore::delete) | Remove a record |
pub trait GuidelineStore: Send + Sync {
    fn load_all(&self) -> Result<Vec<GuidelineRecord>>;

    fn get(&self, id: &str) -> Result<Option<GuidelineRecord>> {
        Ok(self.load_all()?.into_iter().find(|g| g.id == id))
    }

    fn add(&self, draft: GuidelineDraft) -> Result<GuidelineRecord>;

    /// Returns `None` when no record has `id`.
    fn update(&self, id: &str, draft: GuidelineDraft) -> Result<Option<GuidelineRecord>>;

    /// Returns `false` when no record has `id`.
    fn delete(&self, id: &str) -> Result<bool>;
}
