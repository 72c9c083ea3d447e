//! Report sinks: pretty JSON and a plain HTML table.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use html_escape::encode_text;

use creview_core::models::Report;

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }
    Ok(())
}

/// Write `report` as pretty-printed JSON, creating parent directories.
pub fn write_json(report: &Report, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;
    tracing::info!(path = %path.display(), "wrote JSON report");
    Ok(())
}

/// Write `report` as a standalone HTML page with one table row per remark.
pub fn write_html(report: &Report, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    std::fs::write(path, render_html(report))
        .with_context(|| format!("Failed to write report: {}", path.display()))?;
    tracing::info!(path = %path.display(), "wrote HTML report");
    Ok(())
}

pub fn render_html(report: &Report) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n<title>Code Review: {file}</title>\n</head>\n<body>\n\
<h1>Code Review Summary</h1>\n\
<p>File: <code>{file}</code> &middot; Model: {model} &middot; Generated {generated}</p>\n\
<p>{chunks} chunks reviewed, {remarks} remarks, {refs} referenced files</p>\n",
        file = encode_text(&report.file),
        model = encode_text(&report.model),
        generated = Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
        chunks = report.summary.chunks_reviewed,
        remarks = report.summary.total_remarks,
        refs = report.summary.referenced_files,
    );

    html.push_str(
        "<table border=\"1\">\n<tr><th>Chunk</th><th>Line</th><th>Rule</th><th>Severity</th>\
<th>Description</th><th>Explanation</th><th>Suggested fix</th></tr>\n",
    );
    for result in &report.results {
        for remark in &result.remarks {
            let _ = writeln!(
                html,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                result.chunk_index,
                remark.line,
                encode_text(&remark.rule_id),
                encode_text(&remark.severity),
                encode_text(&remark.description),
                encode_text(&remark.explanation),
                encode_text(&remark.suggested_fix),
            );
        }
    }
    html.push_str("</table>\n");

    let files: Vec<_> = report
        .results
        .iter()
        .flat_map(|r| r.related_files.iter())
        .collect();
    if !files.is_empty() {
        html.push_str("<h2>Related files</h2>\n<table border=\"1\">\n<tr><th>File</th><th>Explanation</th></tr>\n");
        for f in files {
            let _ = writeln!(
                html,
                "<tr><td>{}</td><td>{}</td></tr>",
                encode_text(&f.file_name),
                encode_text(&f.explanation)
            );
        }
        html.push_str("</table>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use creview_core::models::{RemarkRecord, ReviewResult, SourceUnit, UnitOrigin};
    use tempfile::TempDir;

    fn sample_report() -> Report {
        let unit = SourceUnit {
            index: 0,
            text: "int x;".into(),
            origin: UnitOrigin::Parsed,
            start_line: 1,
        };
        let mut result = ReviewResult::empty(&unit);
        result.remarks.push(RemarkRecord {
            line: 3,
            rule_id: "G001".into(),
            description: "Use of <script> & friends".into(),
            severity: "high".into(),
            explanation: String::new(),
            suggested_fix: "don't".into(),
        });
        Report::new("src/main.c", "llama3", vec![result])
    }

    #[test]
    fn html_escapes_model_text() {
        let html = render_html(&sample_report());
        assert!(html.contains("Use of &lt;script&gt; &amp; friends"));
        assert!(html.contains("<td>don't</td>"));
        assert!(!html.contains("<script>"));
        assert!(!html.contains("Related files"));
    }

    #[test]
    fn json_report_creates_parent_dirs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out/nested/report.json");
        let report = sample_report();
        write_json(&report, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["summary"]["total_remarks"], 1);
        assert_eq!(value["results"][0]["remarks"][0]["ruleViolated"], "G001");
    }

    #[test]
    fn empty_report_is_still_valid() {
        let report = Report::new("empty.c", "m", Vec::new());
        let html = render_html(&report);
        assert!(html.contains("0 chunks reviewed"));
        let v = serde_json::to_value(&report).unwrap();
        assert!(v["results"].as_array().unwrap().is_empty());
    }
}
