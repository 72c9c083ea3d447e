//! End-to-end review pipeline tests with a scripted model caller.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use creview::guidelines::GuidelineSubset;
use creview::review::{review_file_with_agents, run_agents, ReviewSettings, Reviewer};
use creview_core::embedding::{EmbeddingProvider, HashProvider};
use creview_core::index::Matcher;
use creview_core::llm::ModelCaller;
use creview_core::models::{GuidelineRecord, SourceUnit, UnitOrigin};
use creview_core::{Result, ReviewError};

/// Answers each prompt with the first rule whose needle it contains.
struct ScriptedCaller {
    rules: Vec<(&'static str, Reply)>,
    prompts: Mutex<Vec<String>>,
}

#[derive(Clone)]
enum Reply {
    Text(&'static str),
    Fail,
    Panic,
}

impl ScriptedCaller {
    fn new(rules: Vec<(&'static str, Reply)>) -> Arc<Self> {
        Arc::new(Self {
            rules,
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelCaller for ScriptedCaller {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn call(&self, prompt: &str, _model: &str, _max_tokens: u32) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let reply = self
            .rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle))
            .map(|(_, reply)| reply.clone())
            .unwrap_or(Reply::Text("[]"));
        match reply {
            Reply::Text(text) => Ok(text.to_string()),
            Reply::Fail => Err(ReviewError::model_call("connection refused")),
            Reply::Panic => panic!("agent blew up"),
        }
    }
}

fn guideline(id: &str, rule: &str, description: &str) -> GuidelineRecord {
    GuidelineRecord {
        id: id.to_string(),
        rule: rule.to_string(),
        severity: "high".to_string(),
        category: "general".to_string(),
        description: description.to_string(),
        example: None,
        suggestion: None,
    }
}

fn guidelines() -> Vec<GuidelineRecord> {
    vec![
        guideline("G001", "Avoid goto", "goto statements make control flow hard to follow"),
        guideline("G002", "Check malloc results", "always check malloc for NULL before use"),
        guideline(
            "G007",
            "Avoid unsafe macros",
            "UNSAFE_MACRO style macros hide side effects",
        ),
    ]
}

fn settings() -> ReviewSettings {
    ReviewSettings {
        model: "test-model".to_string(),
        max_tokens: 256,
        window_lines: 200,
    }
}

fn unit(text: &str) -> SourceUnit {
    SourceUnit {
        index: 0,
        text: text.to_string(),
        origin: UnitOrigin::Parsed,
        start_line: 1,
    }
}

fn subset(name: &str, ids: &[&str]) -> GuidelineSubset {
    GuidelineSubset {
        name: name.to_string(),
        guidelines: ids
            .iter()
            .map(|id| guideline(id, "rule", "description"))
            .collect(),
    }
}

async fn matcher(top_k: usize) -> Matcher {
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashProvider::new(1024));
    Matcher::build(guidelines(), provider, top_k).await.unwrap()
}

#[tokio::test]
async fn retrieval_review_reports_macro_violation() {
    let caller = ScriptedCaller::new(vec![
        (
            "Relevant Guidelines:",
            Reply::Text(
                r#"```json
{"remarks": [{"line": 1, "guideline_id": "G007", "issue": "UNSAFE_MACRO used", "suggestion": "inline the expression"}]}
```"#,
            ),
        ),
        ("potentially referred file paths", Reply::Text(r#"{"files": []}"#)),
    ]);
    let reviewer = Reviewer::new(matcher(1).await, caller.clone(), settings());

    let report = reviewer
        .review_source("f.c", "void f(){ int x=UNSAFE_MACRO(x); }")
        .await
        .unwrap();

    assert_eq!(report.summary.chunks_reviewed, 1);
    assert_eq!(report.summary.total_remarks, 1);
    let remark = &report.results[0].remarks[0];
    assert_eq!(remark.line, 1);
    assert_eq!(remark.rule_id, "G007");
    assert_eq!(remark.suggested_fix, "inline the expression");
    assert!(report.results[0].related_files.is_empty());

    // top_k = 1: only the macro guideline reaches the review prompt.
    let prompts = caller.prompts();
    assert_eq!(prompts.len(), 2);
    let review = prompts
        .iter()
        .find(|p| p.starts_with("Relevant Guidelines:"))
        .unwrap();
    assert!(review.contains("- G007 [high | general]"));
    assert!(!review.contains("G001"));
    assert!(!review.contains("G002"));
}

#[tokio::test]
async fn retrieval_review_of_file_keeps_single_macro_remark() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("f.c");
    std::fs::write(&path, "void f(){ int x=UNSAFE_MACRO(x); }\n").unwrap();

    let caller = ScriptedCaller::new(vec![(
        "Relevant Guidelines:",
        Reply::Text(
            r#"[{"lineNumber":1,"ruleViolated":"G007","description":"...","severity":"high","explanation":"...","suggestedFix":"..."}]"#,
        ),
    )]);
    let reviewer = Reviewer::new(matcher(1).await, caller.clone(), settings());

    let report = reviewer.review_file(&path).await.unwrap();

    assert_eq!(report.file, path.display().to_string());
    assert_eq!(report.results.len(), 1);
    let remarks = &report.results[0].remarks;
    assert_eq!(remarks.len(), 1);
    assert_eq!(remarks[0].key(), (1, "G007"));
    assert_eq!(remarks[0].description, "...");
    assert_eq!(remarks[0].severity, "high");
    assert_eq!(remarks[0].explanation, "...");
    assert_eq!(remarks[0].suggested_fix, "...");

    let prompts = caller.prompts();
    let review = prompts
        .iter()
        .find(|p| p.starts_with("Relevant Guidelines:"))
        .unwrap();
    assert!(review.contains("void f(){ int x=UNSAFE_MACRO(x); }"));
    assert_eq!(review.matches("\n- G").count(), 1);
    assert!(review.starts_with("Relevant Guidelines:\n- G007 "));
}

#[tokio::test]
async fn retrieval_review_collects_related_files() {
    let caller = ScriptedCaller::new(vec![(
        "potentially referred file paths",
        Reply::Text(r#"{"name": "files", "files": [{"fileName": "uart.h", "explanation": "included at line 1"}]}"#),
    )]);
    let reviewer = Reviewer::new(matcher(2).await, caller, settings());

    let report = reviewer
        .review_source("u.c", "#include \"uart.h\"\nint g(void)\n{\n    return 0;\n}\n")
        .await
        .unwrap();

    assert_eq!(report.summary.referenced_files, 1);
    assert_eq!(report.results[0].related_files[0].file_name, "uart.h");
    assert!(report.results[0].remarks.is_empty());
}

#[tokio::test]
async fn failed_model_calls_leave_empty_results() {
    let caller = ScriptedCaller::new(vec![("", Reply::Fail)]);
    let reviewer = Reviewer::new(matcher(2).await, caller, settings());

    let report = reviewer
        .review_source("a.c", "int a(void) { return 1; }\nint b(void) { return 2; }\n")
        .await
        .unwrap();

    assert_eq!(report.summary.chunks_reviewed, 2);
    assert_eq!(report.summary.total_remarks, 0);
    assert_eq!(report.summary.referenced_files, 0);
}

#[tokio::test]
async fn empty_source_has_nothing_to_review() {
    let caller = ScriptedCaller::new(Vec::new());
    let reviewer = Reviewer::new(matcher(2).await, caller.clone(), settings());

    let err = reviewer.review_source("empty.c", "").await.unwrap_err();
    assert!(matches!(err, ReviewError::NothingToReview(_)));
    assert!(caller.prompts().is_empty());
}

#[tokio::test]
async fn agents_merge_in_subset_order_and_dedup() {
    let caller = ScriptedCaller::new(vec![
        (
            "(G002)",
            Reply::Text(
                r#"[{"lineNumber": 5, "ruleViolated": "G002", "description": "unchecked malloc", "suggestedFix": "from first agent"}]"#,
            ),
        ),
        (
            "(G010)",
            Reply::Text(
                r#"Found these:
[{"lineNumber": 5, "ruleViolated": "G002", "description": "unchecked malloc", "suggestedFix": "from second agent"},
 {"lineNumber": 7, "ruleViolated": "G010", "description": "magic number"}]"#,
            ),
        ),
    ]);
    let subsets = vec![subset("g1.json", &["G002"]), subset("g2.json", &["G010"])];

    let remarks = run_agents(&unit("int x;"), &subsets, caller.clone(), &settings()).await;

    assert_eq!(remarks.len(), 2);
    assert_eq!(remarks[0].key(), (5, "G002"));
    assert_eq!(remarks[0].suggested_fix, "from first agent");
    assert_eq!(remarks[1].key(), (7, "G010"));
    assert_eq!(caller.prompts().len(), 2);
}

#[tokio::test]
async fn failing_and_panicking_agents_contribute_nothing() {
    let caller = ScriptedCaller::new(vec![
        ("(G100)", Reply::Fail),
        ("(G200)", Reply::Panic),
        (
            "(G300)",
            Reply::Text(r#"[{"lineNumber": 2, "ruleViolated": "G300", "description": "survivor"}]"#),
        ),
    ]);
    let subsets = vec![
        subset("g1.json", &["G100"]),
        subset("g2.json", &["G200"]),
        subset("g3.json", &["G300"]),
    ];

    let remarks = run_agents(&unit("int x;"), &subsets, caller, &settings()).await;

    assert_eq!(remarks.len(), 1);
    assert_eq!(remarks[0].description, "survivor");
}

#[tokio::test]
async fn agent_prompt_numbers_lines_from_chunk_start() {
    let caller = ScriptedCaller::new(Vec::new());
    let mut chunk = unit("int a;\nint b;");
    chunk.start_line = 40;

    let remarks = run_agents(&chunk, &[subset("g1.json", &["G001"])], caller.clone(), &settings()).await;

    assert!(remarks.is_empty());
    let prompt = &caller.prompts()[0];
    assert!(prompt.contains(" 40: int a;"));
    assert!(prompt.contains(" 41: int b;"));
}

#[tokio::test]
async fn agent_review_of_file_on_disk() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("buf.c");
    std::fs::write(
        &path,
        "#include <stdlib.h>\n\nchar *make(int n)\n{\n    char *p = malloc(n);\n    return p;\n}\n\nvoid drop(char *p)\n{\n    free(p);\n}\n",
    )
    .unwrap();

    let caller = ScriptedCaller::new(vec![(
        "malloc(n)",
        Reply::Text(r#"[{"lineNumber": 5, "ruleViolated": "G002", "description": "unchecked malloc"}]"#),
    )]);
    let subsets = vec![subset("g1.json", &["G002"])];

    let report = review_file_with_agents(&path, &subsets, caller, &settings())
        .await
        .unwrap();

    assert_eq!(report.model, "test-model");
    assert_eq!(report.summary.chunks_reviewed, 2);
    assert_eq!(report.summary.total_remarks, 1);
    assert_eq!(report.results[0].remarks[0].line, 5);
    assert!(report.results[1].remarks.is_empty());
}

#[tokio::test]
async fn agent_review_rejects_non_c_files() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("script.py");
    std::fs::write(&path, "print('hi')\n").unwrap();

    let caller = ScriptedCaller::new(Vec::new());
    let err = review_file_with_agents(&path, &[subset("g1.json", &["G001"])], caller, &settings())
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::UnsupportedExtension(_)));
}
