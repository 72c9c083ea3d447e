//! JSON-file guideline store and agent subset loading.
//!
//! [`JsonGuidelineStore`] keeps every guideline in one pretty-printed JSON
//! array. Edits are read-modify-write under a process-local lock and land
//! via a temp file and rename, so a reader never sees a half-written file.
//!
//! [`load_subset_dir`] loads the per-agent guideline files (`g*.json`) used
//! by the multi-agent review.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use walkdir::WalkDir;

use creview_core::models::GuidelineRecord;
use creview_core::store::{next_guideline_id, GuidelineDraft, GuidelineStore};
use creview_core::{Result, ReviewError};

/// Guidelines persisted as a JSON array in a single file.
pub struct JsonGuidelineStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonGuidelineStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file. A missing file is an error unless `allow_missing`,
    /// in which case it reads as an empty list (first `add` creates it).
    fn read(&self, allow_missing: bool) -> Result<Vec<GuidelineRecord>> {
        if !self.path.exists() {
            if allow_missing {
                return Ok(Vec::new());
            }
            return Err(ReviewError::store(format!(
                "guidelines file not found: {}",
                self.path.display()
            )));
        }
        read_guideline_file(&self.path)
    }

    fn save(&self, records: &[GuidelineRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(records)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        tracing::info!(
            count = records.len(),
            path = %self.path.display(),
            "saved guidelines"
        );
        Ok(())
    }

    /// Run `edit` on the current records under the write lock, saving when
    /// it reports a change.
    fn modify<T>(
        &self,
        edit: impl FnOnce(&mut Vec<GuidelineRecord>) -> (T, bool),
    ) -> Result<T> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| ReviewError::store("guideline store lock poisoned"))?;
        let mut records = self.read(true)?;
        let (out, changed) = edit(&mut records);
        if changed {
            self.save(&records)?;
        }
        Ok(out)
    }
}

fn read_guideline_file(path: &Path) -> Result<Vec<GuidelineRecord>> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| {
        ReviewError::store(format!(
            "invalid JSON format in guidelines file {}: {}",
            path.display(),
            e
        ))
    })
}

impl GuidelineStore for JsonGuidelineStore {
    fn load_all(&self) -> Result<Vec<GuidelineRecord>> {
        let records = self.read(false)?;
        tracing::info!(
            count = records.len(),
            path = %self.path.display(),
            "loaded guidelines"
        );
        Ok(records)
    }

    fn add(&self, draft: GuidelineDraft) -> Result<GuidelineRecord> {
        let record = self.modify(|records| {
            let record = draft.into_record(next_guideline_id(records));
            records.push(record.clone());
            (record, true)
        })?;
        tracing::info!(id = %record.id, rule = %record.rule, "added guideline");
        Ok(record)
    }

    fn update(&self, id: &str, draft: GuidelineDraft) -> Result<Option<GuidelineRecord>> {
        let updated = self.modify(|records| match records.iter_mut().find(|g| g.id == id) {
            Some(slot) => {
                *slot = draft.into_record(id.to_string());
                (Some(slot.clone()), true)
            }
            None => (None, false),
        })?;
        if updated.is_some() {
            tracing::info!(id, "updated guideline");
        }
        Ok(updated)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let removed = self.modify(|records| {
            let before = records.len();
            records.retain(|g| g.id != id);
            let removed = records.len() != before;
            (removed, removed)
        })?;
        if removed {
            tracing::warn!(id, "deleted guideline");
        }
        Ok(removed)
    }
}

/// One agent's slice of the guidelines, loaded from a single file.
#[derive(Debug, Clone, Serialize)]
pub struct GuidelineSubset {
    /// File name the subset came from (e.g. `g1.json`).
    pub name: String,
    pub guidelines: Vec<GuidelineRecord>,
}

fn subset_globset() -> Result<GlobSet> {
    let glob = Glob::new("g*.json").map_err(|e| ReviewError::store(e.to_string()))?;
    GlobSetBuilder::new()
        .add(glob)
        .build()
        .map_err(|e| ReviewError::store(e.to_string()))
}

/// Load every `g*.json` directly inside `dir`, sorted by file name.
///
/// Each file becomes one [`GuidelineSubset`]. Finding no subset file is an
/// input error, as is any file that is not a guideline array.
pub fn load_subset_dir(dir: &Path) -> Result<Vec<GuidelineSubset>> {
    if !dir.is_dir() {
        return Err(ReviewError::store(format!(
            "guideline subset directory not found: {}",
            dir.display()
        )));
    }

    let matcher = subset_globset()?;
    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| ReviewError::store(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if matcher.is_match(entry.file_name()) {
            paths.push(entry.into_path());
        }
    }

    if paths.is_empty() {
        return Err(ReviewError::store(format!(
            "no guideline subset files (g*.json) found in {}",
            dir.display()
        )));
    }

    // Sort for deterministic agent order
    paths.sort();

    let mut subsets = Vec::with_capacity(paths.len());
    for path in paths {
        let guidelines = read_guideline_file(&path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        tracing::debug!(subset = %name, guidelines = guidelines.len(), "loaded guideline subset");
        subsets.push(GuidelineSubset { name, guidelines });
    }

    tracing::info!(subsets = subsets.len(), dir = %dir.display(), "loaded guideline subsets");
    Ok(subsets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn draft(rule: &str) -> GuidelineDraft {
        GuidelineDraft {
            rule: rule.to_string(),
            severity: "high".to_string(),
            category: "macros".to_string(),
            description: format!("{} description", rule),
            example: Some("#define X(a) a##b".to_string()),
            suggestion: None,
        }
    }

    #[test]
    fn missing_file_fails_load_but_add_creates_it() {
        let tmp = TempDir::new().unwrap();
        let store = JsonGuidelineStore::new(tmp.path().join("nested/guidelines.json"));

        assert!(matches!(store.load_all(), Err(ReviewError::GuidelineStore(_))));

        let added = store.add(draft("No token pasting")).unwrap();
        assert_eq!(added.id, "G001");
        assert_eq!(store.load_all().unwrap(), vec![added]);
    }

    #[test]
    fn edits_persist_across_instances() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("guidelines.json");
        let store = JsonGuidelineStore::new(&path);
        store.add(draft("one")).unwrap();
        store.add(draft("two")).unwrap();
        store.update("G002", draft("two, revised")).unwrap().unwrap();
        assert!(store.delete("G001").unwrap());

        let reopened = JsonGuidelineStore::new(&path);
        let all = reopened.load_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "G002");
        assert_eq!(all[0].rule, "two, revised");
        assert_eq!(reopened.get("G002").unwrap().unwrap().rule, "two, revised");

        // Saved as a pretty-printed array.
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("[\n"));
    }

    #[test]
    fn update_and_delete_unknown_ids() {
        let tmp = TempDir::new().unwrap();
        let store = JsonGuidelineStore::new(tmp.path().join("g.json"));
        store.add(draft("one")).unwrap();
        assert!(store.update("G404", draft("x")).unwrap().is_none());
        assert!(!store.delete("G404").unwrap());
    }

    #[test]
    fn invalid_json_is_a_store_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("guidelines.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = JsonGuidelineStore::new(&path).load_all().unwrap_err();
        assert!(err.to_string().contains("invalid JSON"));
    }

    #[test]
    fn subset_dir_loads_sorted_g_files_only() {
        let tmp = TempDir::new().unwrap();
        let g = |id: &str| {
            format!(
                r#"[{{"id":"{id}","rule":"r","severity":"low","description":"d","suggestion":"s"}}]"#
            )
        };
        std::fs::write(tmp.path().join("g2.json"), g("G002")).unwrap();
        std::fs::write(tmp.path().join("g1.json"), g("G001")).unwrap();
        std::fs::write(tmp.path().join("other.json"), g("X")).unwrap();
        std::fs::write(tmp.path().join("g3.txt"), g("Y")).unwrap();

        let subsets = load_subset_dir(tmp.path()).unwrap();
        let names: Vec<&str> = subsets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["g1.json", "g2.json"]);
        assert_eq!(subsets[0].guidelines[0].category, "");
        assert_eq!(subsets[0].guidelines[0].suggestion.as_deref(), Some("s"));
    }

    #[test]
    fn subset_dir_without_matches_is_an_error() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("rules.json"), "[]").unwrap();
        assert!(load_subset_dir(tmp.path()).is_err());
        assert!(load_subset_dir(&tmp.path().join("missing")).is_err());
    }
}
