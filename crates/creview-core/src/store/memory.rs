//! In-memory [`GuidelineStore`] for tests and embedding callers.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`. Nothing is
//! persisted.

use std::sync::RwLock;

use crate::error::{Result, ReviewError};
use crate::models::GuidelineRecord;

use super::{next_guideline_id, GuidelineDraft, GuidelineStore};

#[derive(Default)]
pub struct InMemoryGuidelineStore {
    records: RwLock<Vec<GuidelineRecord>>,
}

impl InMemoryGuidelineStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<GuidelineRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }
}

fn poisoned() -> ReviewError {
    ReviewError::store("guideline store lock poisoned")
}

impl GuidelineStore for InMemoryGuidelineStore {
    fn load_all(&self) -> Result<Vec<GuidelineRecord>> {
        Ok(self.records.read().map_err(|_| poisoned())?.clone())
    }

    fn add(&self, draft: GuidelineDraft) -> Result<GuidelineRecord> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        let record = draft.into_record(next_guideline_id(&records));
        records.push(record.clone());
        Ok(record)
    }

    fn update(&self, id: &str, draft: GuidelineDraft) -> Result<Option<GuidelineRecord>> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        let Some(slot) = records.iter_mut().find(|g| g.id == id) else {
            return Ok(None);
        };
        *slot = draft.into_record(id.to_string());
        Ok(Some(slot.clone()))
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        let before = records.len();
        records.retain(|g| g.id != id);
        Ok(records.len() != before)
    }
}
