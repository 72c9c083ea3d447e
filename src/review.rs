//! Review orchestration.
//!
//! Two pipelines share the same building blocks:
//!
//! - **Retrieval review** ([`Reviewer`]): chunk → match guidelines →
//!   review prompt + reference-trace prompt → extract → [`ReviewResult`].
//! - **Agent review** ([`review_source_with_agents`]): chunk → one task per
//!   guideline subset ([`run_agents`]) → merge → [`dedup_remarks`].
//!
//! This is the only layer that turns a failed model call into "zero
//! findings". A failing agent is logged and contributes nothing; it never
//! cancels its siblings or the run. Chunks are reviewed one after another,
//! so in-flight model calls are bounded by the number of agents.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use creview_core::chunk::chunk_source;
use creview_core::extract::{extract_object, extract_records};
use creview_core::index::Matcher;
use creview_core::llm::ModelCaller;
use creview_core::models::{
    FileReference, MatchResult, RemarkRecord, Report, ReviewResult, SourceUnit,
};
use creview_core::{prompt, Result, ReviewError};
use serde::Deserialize;

use crate::config::Config;
use crate::guidelines::GuidelineSubset;
use crate::source::read_source;

/// Per-run model settings.
#[derive(Debug, Clone)]
pub struct ReviewSettings {
    pub model: String,
    pub max_tokens: u32,
    pub window_lines: usize,
}

impl ReviewSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.llm.model.clone(),
            max_tokens: config.llm.max_tokens,
            window_lines: config.chunking.window_lines,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        if let Some(model) = model {
            self.model = model;
        }
        self
    }
}

/// Drop later remarks whose `(line, rule_id)` was already seen.
///
/// The first record for a key wins regardless of its other fields.
pub fn dedup_remarks(remarks: Vec<RemarkRecord>) -> Vec<RemarkRecord> {
    let mut seen: HashSet<(u32, String)> = HashSet::with_capacity(remarks.len());
    let before = remarks.len();
    let kept: Vec<RemarkRecord> = remarks
        .into_iter()
        .filter(|r| seen.insert((r.line, r.rule_id.clone())))
        .collect();
    if kept.len() != before {
        tracing::debug!(dropped = before - kept.len(), "removed duplicate remarks");
    }
    kept
}

/// Review `unit` with one concurrent agent per guideline subset.
///
/// Every agent runs in its own tokio task. Results are merged in subset
/// order once all tasks finish, then deduplicated.
pub async fn run_agents(
    unit: &SourceUnit,
    subsets: &[GuidelineSubset],
    caller: Arc<dyn ModelCaller>,
    settings: &ReviewSettings,
) -> Vec<RemarkRecord> {
    let mut handles = Vec::with_capacity(subsets.len());
    for subset in subsets {
        let agent_prompt = prompt::agent_prompt(unit, &subset.guidelines);
        let caller = Arc::clone(&caller);
        let model = settings.model.clone();
        let max_tokens = settings.max_tokens;
        let name = subset.name.clone();
        let handle = tokio::spawn(async move {
            run_agent(&name, caller.as_ref(), &agent_prompt, &model, max_tokens).await
        });
        handles.push((subset.name.clone(), handle));
    }

    tracing::info!(
        chunk = unit.index,
        agents = handles.len(),
        "dispatched review agents"
    );

    let mut merged = Vec::new();
    for (name, handle) in handles {
        match handle.await {
            Ok(records) => merged.extend(records),
            Err(e) => tracing::error!(agent = %name, error = %e, "agent task aborted"),
        }
    }

    dedup_remarks(merged)
}

async fn run_agent(
    name: &str,
    caller: &dyn ModelCaller,
    agent_prompt: &str,
    model: &str,
    max_tokens: u32,
) -> Vec<RemarkRecord> {
    let raw = match caller.call(agent_prompt, model, max_tokens).await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::error!(agent = name, error = %e, "agent model call failed");
            return Vec::new();
        }
    };

    let records: Vec<RemarkRecord> = extract_records(&raw);
    if records.is_empty() && !is_empty_list(&raw) {
        tracing::warn!(agent = name, chars = raw.len(), "agent returned no usable records");
    } else {
        tracing::info!(agent = name, remarks = records.len(), "agent finished");
    }
    records
}

/// True when the output says "no findings" (`[]`, possibly fenced).
fn is_empty_list(raw: &str) -> bool {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    compact.contains("[]")
}

/// Envelope returned by the reference-trace prompt.
#[derive(Deserialize)]
struct TraceEnvelope {
    files: Vec<FileReference>,
}

/// File references from a trace response.
///
/// Decodes the `{ "files": [...] }` envelope; when that fails, salvages
/// the individual file records.
pub fn parse_trace(raw: &str) -> Vec<FileReference> {
    match extract_object::<TraceEnvelope>(raw) {
        Some(envelope) => envelope.files,
        None => extract_records(raw),
    }
}

/// Retrieval review of one chunk against its matched guidelines.
///
/// The review and reference-trace prompts are sent concurrently. Either
/// call failing only empties its own list.
pub async fn review_chunk(
    unit: &SourceUnit,
    matches: &[MatchResult],
    caller: &dyn ModelCaller,
    settings: &ReviewSettings,
) -> ReviewResult {
    let review_prompt = prompt::review_prompt(&unit.text, matches);
    let trace_prompt = prompt::reference_trace_prompt(&unit.text);

    tracing::info!(
        chunk = unit.index,
        start_line = unit.start_line,
        guidelines = matches.len(),
        "reviewing chunk"
    );

    let (review, trace) = tokio::join!(
        caller.call(&review_prompt, &settings.model, settings.max_tokens),
        caller.call(&trace_prompt, &settings.model, settings.max_tokens),
    );

    let remarks = match review {
        Ok(raw) => dedup_remarks(extract_records(&raw)),
        Err(e) => {
            tracing::error!(chunk = unit.index, error = %e, "review call failed");
            Vec::new()
        }
    };
    let related_files = match trace {
        Ok(raw) => parse_trace(&raw),
        Err(e) => {
            tracing::error!(chunk = unit.index, error = %e, "reference trace call failed");
            Vec::new()
        }
    };

    tracing::info!(
        chunk = unit.index,
        remarks = remarks.len(),
        related_files = related_files.len(),
        "chunk reviewed"
    );

    ReviewResult {
        remarks,
        related_files,
        ..ReviewResult::empty(unit)
    }
}

fn chunk_or_bail(label: &str, source: &str, window_lines: usize) -> Result<Vec<SourceUnit>> {
    let units = chunk_source(source, window_lines);
    if units.is_empty() {
        return Err(ReviewError::NothingToReview(label.to_string()));
    }
    tracing::info!(file = label, chunks = units.len(), "chunked source");
    Ok(units)
}

/// Retrieval-augmented reviewer.
///
/// Holds the guideline matcher and model caller for a run. Both are
/// injected; nothing is looked up globally.
pub struct Reviewer {
    matcher: Matcher,
    caller: Arc<dyn ModelCaller>,
    settings: ReviewSettings,
}

impl Reviewer {
    pub fn new(matcher: Matcher, caller: Arc<dyn ModelCaller>, settings: ReviewSettings) -> Self {
        Self {
            matcher,
            caller,
            settings,
        }
    }

    pub fn settings(&self) -> &ReviewSettings {
        &self.settings
    }

    /// Review a `.c`/`.h` file on disk.
    pub async fn review_file(&self, path: &Path) -> Result<Report> {
        let source = read_source(path)?;
        self.review_source(&path.display().to_string(), &source).await
    }

    /// Review source text. `label` names the file in the report.
    ///
    /// Embedding failures abort the run; model failures only empty the
    /// affected chunk's lists.
    pub async fn review_source(&self, label: &str, source: &str) -> Result<Report> {
        let units = chunk_or_bail(label, source, self.settings.window_lines)?;

        let mut results = Vec::with_capacity(units.len());
        for unit in &units {
            let matches = self.matcher.match_chunk(&unit.text).await?;
            results.push(review_chunk(unit, &matches, self.caller.as_ref(), &self.settings).await);
        }

        let report = Report::new(label, &self.settings.model, results);
        tracing::info!(
            file = label,
            remarks = report.summary.total_remarks,
            "review complete"
        );
        Ok(report)
    }
}

/// Agent review of a `.c`/`.h` file on disk.
pub async fn review_file_with_agents(
    path: &Path,
    subsets: &[GuidelineSubset],
    caller: Arc<dyn ModelCaller>,
    settings: &ReviewSettings,
) -> Result<Report> {
    let source = read_source(path)?;
    review_source_with_agents(&path.display().to_string(), &source, subsets, caller, settings).await
}

/// Agent review of source text: every chunk goes through [`run_agents`].
pub async fn review_source_with_agents(
    label: &str,
    source: &str,
    subsets: &[GuidelineSubset],
    caller: Arc<dyn ModelCaller>,
    settings: &ReviewSettings,
) -> Result<Report> {
    let units = chunk_or_bail(label, source, settings.window_lines)?;

    let mut results = Vec::with_capacity(units.len());
    for unit in &units {
        let remarks = run_agents(unit, subsets, Arc::clone(&caller), settings).await;
        results.push(ReviewResult {
            remarks,
            ..ReviewResult::empty(unit)
        });
    }

    let report = Report::new(label, &settings.model, results);
    tracing::info!(
        file = label,
        agents = subsets.len(),
        remarks = report.summary.total_remarks,
        "agent review complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remark(line: u32, rule: &str, fix: &str) -> RemarkRecord {
        RemarkRecord {
            line,
            rule_id: rule.to_string(),
            description: "d".to_string(),
            severity: "high".to_string(),
            explanation: String::new(),
            suggested_fix: fix.to_string(),
        }
    }

    #[test]
    fn dedup_keeps_first_seen() {
        let out = dedup_remarks(vec![
            remark(5, "G002", "first"),
            remark(5, "G003", "other rule"),
            remark(5, "G002", "second"),
            remark(6, "G002", "other line"),
        ]);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].suggested_fix, "first");
        assert_eq!(out[2].line, 6);
    }

    #[test]
    fn parse_trace_envelope() {
        let raw = r#"Here you go:
{"name": "Potentially Impactful files", "files": [{"fileName": "uart.h", "explanation": "included at line 1"}]}"#;
        let files = parse_trace(raw);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_name, "uart.h");
    }

    #[test]
    fn parse_trace_bare_array() {
        let files = parse_trace(r#"[{"fileName": "gpio.h", "explanation": "include"}]"#);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_name, "gpio.h");
    }

    #[test]
    fn parse_trace_salvages_records() {
        // Second record lacks fileName, so the envelope fails as a whole.
        let raw = r#"{"files": [{"fileName": "a.h", "explanation": "x"}, {"explanation": "y"}]}"#;
        let files = parse_trace(raw);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_name, "a.h");
    }

    #[test]
    fn empty_list_detection() {
        assert!(is_empty_list("```json\n[ ]\n```"));
        assert!(!is_empty_list("I could not review this code."));
        assert!(!is_empty_list(""));
    }

    #[test]
    fn settings_model_override() {
        let settings = ReviewSettings::from_config(&Config::minimal());
        assert_eq!(settings.window_lines, 200);
        let overridden = settings.with_model(Some("llama3".to_string()));
        assert_eq!(overridden.model, "llama3");
    }
}
