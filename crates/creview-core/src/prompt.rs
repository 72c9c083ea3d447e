//! Prompt builders for the review, reference-trace, and agent calls.
//!
//! Wording is fixed. Each builder only arranges the guidelines and the
//! code into a stable layout and appends the expected output shape.

use crate::models::{GuidelineRecord, MatchResult, SourceUnit};

const REVIEW_INSTRUCTION: &str = "Analyze the provided C code chunk below in the context of the \
listed guidelines. Flag any violations or issues. For each violation, include the line number, \
the matched guideline ID, and a brief suggestion. If no violations are found, return an empty \
list in the 'remarks' field. Response must strictly follow the JSON format shown.";

const REVIEW_OUTPUT_FORMAT: &str = r#"{
  "remarks": [
    {
      "line": 12,
      "guideline_id": "G001",
      "issue": "Usage of ## operator detected",
      "suggestion": "Avoid using token-pasting macros for better readability."
    }
  ]
}"#;

const TRACE_OUTPUT_FORMAT: &str = r#"{
  "name": "Potentially Impactful files to be reviewed later",
  "files": [
    {
      "fileName": "source/utils/print.h",
      "explanation": "Header file included in lineNumber 33"
    }
  ]
}"#;

const AGENT_INSTRUCTION: &str = r#"### Task for AI Agent:
You are a code reviewer specialized in embedded C development.

Review the above code **strictly** against the listed coding guidelines.

For any violation, return a JSON list with the following format:
[
  {
    "lineNumber": 12,
    "ruleViolated": "G001",
    "description": "Avoid usage of ## operator",
    "severity": "high",
    "explanation": "Usage of '##' token pasting found.",
    "suggestedFix": "Avoid macro token pasting. Consider better macro design."
  }
]

If the code is clean and no violations exist, return an **empty list: []**.
"#;

fn fenced_c(code: &str) -> String {
    format!("```c\n{}\n```", code.trim())
}

/// Prompt for the retrieval-augmented review of one chunk.
pub fn review_prompt(code: &str, matches: &[MatchResult]) -> String {
    let mut out = String::from("Relevant Guidelines:\n");
    for m in matches {
        let g = &m.guideline;
        out.push_str(&format!(
            "- {} [{} | {}]: {}\n  {}\n",
            g.id, g.severity, g.category, g.rule, g.description
        ));
    }

    out.push_str("\nCode to Review:\n");
    out.push_str(&fenced_c(code));
    out.push_str("\n\nReview Instruction:\n");
    out.push_str(REVIEW_INSTRUCTION);
    out.push_str("\n\nOutput Format:\n");
    out.push_str(REVIEW_OUTPUT_FORMAT);
    out.push('\n');

    tracing::debug!(
        guidelines = matches.len(),
        code_chars = code.len(),
        "built review prompt"
    );
    out
}

/// Prompt asking which other files the chunk refers to.
pub fn reference_trace_prompt(code: &str) -> String {
    format!(
        "Analyze the following C code and identify any potentially referred file paths \
(e.g., via #include statements, or function calls declared in another module).\n\
For each such reference, provide:\n\
- fileName (relative or guessed path like \"source/xyz.h\" or \"driver/uart.c\")\n\
- explanation: what was detected and the line number of occurrence.\n\n\
If nothing found, return an empty list for \"files\".\n\n\
Return strictly in the following JSON format:\n\n\
{TRACE_OUTPUT_FORMAT}\n\n\
Code to analyze:\n{}",
        fenced_c(code)
    )
}

/// Prompt for one agent reviewing `unit` against one guideline subset.
///
/// Code lines are numbered from the unit's start line so reported line
/// numbers point into the stripped file.
pub fn agent_prompt(unit: &SourceUnit, guidelines: &[GuidelineRecord]) -> String {
    let mut rules = String::from("### Coding Guidelines (Subset):\n");
    for g in guidelines {
        rules.push_str(&format!(
            "- ({}) {} [Severity: {}]\n  Description: {}\n  Suggestion: {}\n",
            g.id,
            g.rule,
            g.severity,
            g.description,
            g.suggestion.as_deref().unwrap_or("N/A")
        ));
    }

    let mut code = String::from("### Embedded C Code:\n");
    for (offset, line) in unit.text.lines().enumerate() {
        code.push_str(&format!("{:>3}: {}\n", unit.start_line + offset, line));
    }

    format!("{rules}\n\n{code}\n\n{AGENT_INSTRUCTION}")
}
