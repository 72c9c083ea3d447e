//! Core data models that flow through the review pipeline.
//!
//! A source file becomes [`SourceUnit`]s, each unit is matched against
//! [`GuidelineRecord`]s producing [`MatchResult`]s, and model output is
//! decoded into [`RemarkRecord`]s and [`FileReference`]s that are grouped
//! per unit into a [`ReviewResult`].

use serde::{Deserialize, Deserializer, Serialize};

/// How a [`SourceUnit`] was carved out of its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitOrigin {
    /// A function definition found by the structural parse.
    Parsed,
    /// A fixed-size line window.
    Fallback,
}

impl UnitOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            UnitOrigin::Parsed => "parsed",
            UnitOrigin::Fallback => "fallback",
        }
    }
}

/// A contiguous span of comment-stripped source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceUnit {
    /// Position of this unit within its file, starting at 0.
    pub index: usize,
    pub text: String,
    pub origin: UnitOrigin,
    /// 1-based line in the comment-stripped text (best effort).
    pub start_line: usize,
}

impl SourceUnit {
    /// Number of lines in the unit.
    pub fn line_count(&self) -> usize {
        self.text.lines().count()
    }
}

/// A coding guideline entry as persisted in the guideline store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuidelineRecord {
    pub id: String,
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

/// A guideline paired with its similarity to a query chunk.
///
/// Serialized as the guideline's own fields plus `match_score`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    #[serde(flatten)]
    pub guideline: GuidelineRecord,
    #[serde(rename = "match_score")]
    pub score: f32,
}

/// One finding reported by the model.
///
/// Accepts both vocabularies the review prompts ask for
/// (`lineNumber`/`ruleViolated`/... and `line`/`guideline_id`/...).
/// `line`, `rule_id`, and `description` are required; a record without
/// them does not decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemarkRecord {
    #[serde(rename = "lineNumber", alias = "line", deserialize_with = "line_number")]
    pub line: u32,
    #[serde(rename = "ruleViolated", alias = "guideline_id")]
    pub rule_id: String,
    #[serde(alias = "issue")]
    pub description: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(rename = "suggestedFix", alias = "suggestion", default)]
    pub suggested_fix: String,
}

/// Models write line numbers both as `12` and `"12"`.
fn line_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Line {
        Number(u32),
        Text(String),
    }

    match Line::deserialize(deserializer)? {
        Line::Number(n) => Ok(n),
        Line::Text(text) => text.trim().parse().map_err(|_| {
            serde::de::Error::custom(format!("invalid line number: {:?}", text))
        }),
    }
}

impl RemarkRecord {
    /// Deduplication key: (line, violated rule id).
    pub fn key(&self) -> (u32, &str) {
        (self.line, self.rule_id.as_str())
    }
}

/// A file the model believes the chunk depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReference {
    #[serde(rename = "fileName")]
    pub file_name: String,
    #[serde(default)]
    pub explanation: String,
}

/// Review output for one [`SourceUnit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewResult {
    pub chunk_index: usize,
    pub start_line: usize,
    pub origin: UnitOrigin,
    pub remarks: Vec<RemarkRecord>,
    pub related_files: Vec<FileReference>,
}

impl ReviewResult {
    pub fn empty(unit: &SourceUnit) -> Self {
        Self {
            chunk_index: unit.index,
            start_line: unit.start_line,
            origin: unit.origin,
            remarks: Vec::new(),
            related_files: Vec::new(),
        }
    }
}

/// Totals across a whole report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub chunks_reviewed: usize,
    pub total_remarks: usize,
    pub referenced_files: usize,
}

/// The final review of one source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub file: String,
    pub model: String,
    pub results: Vec<ReviewResult>,
    pub summary: ReportSummary,
}

impl Report {
    /// Build a report and compute its summary from `results`.
    pub fn new(file: impl Into<String>, model: impl Into<String>, results: Vec<ReviewResult>) -> Self {
        let summary = ReportSummary {
            chunks_reviewed: results.len(),
            total_remarks: results.iter().map(|r| r.remarks.len()).sum(),
            referenced_files: results.iter().map(|r| r.related_files.len()).sum(),
        };
        Self {
            file: file.into(),
            model: model.into(),
            results,
            summary,
        }
    }
}
