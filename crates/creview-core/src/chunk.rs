//! Function-level C source chunker.
//!
//! Splits a C source file into [`SourceUnit`]s, one per top-level
//! function definition, falling back to fixed-size line windows when the
//! structural pass fails or finds nothing.
//!
//! # Algorithm
//!
//! 1. Strip `//` and `/* */` comments by regex substitution.
//! 2. Parse the stripped text with the tree-sitter C grammar. A tree that
//!    contains error nodes counts as a parse failure.
//! 3. For each top-level `function_definition`, start at its declared
//!    line and accumulate lines while tracking the running brace balance
//!    (`+= '{' count - '}' count`). The unit ends at the first line, at or
//!    after the first line holding a `{`, where the balance is back to 0.
//! 4. On parse failure or when no function was found, split the stripped
//!    text into windows of `window_lines` lines.
//!
//! # Known limitations
//!
//! Comment stripping is textual: `//` or `/*` inside a string literal is
//! treated as a comment. Brace counting does not skip string or character
//! literals, so a `"{"` shifts the unit boundary. Both are kept as-is so
//! chunk boundaries stay stable across versions.
//!
//! # Example
//!
//! ```rust
//! use creview_core::chunk::chunk_source;
//! use creview_core::models::UnitOrigin;
//!
//! let units = chunk_source("int one(void)\n{\n    return 1;\n}\n", 200);
//! assert_eq!(units.len(), 1);
//! assert_eq!(units[0].origin, UnitOrigin::Parsed);
//! assert_eq!(units[0].start_line, 1);
//! ```

use std::sync::OnceLock;

use regex::Regex;
use tree_sitter::{Node, Parser};

use crate::error::{Result, ReviewError};
use crate::models::{SourceUnit, UnitOrigin};

/// Default number of lines per fallback window.
pub const DEFAULT_WINDOW_LINES: usize = 200;

fn line_comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"//.*").expect("valid line comment regex"))
}

fn block_comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/\*[\s\S]*?\*/").expect("valid block comment regex"))
}

/// Remove `//` line comments, then `/* */` block comments.
///
/// Block comments spanning several lines take their newlines with them,
/// so line numbers after such a comment refer to the stripped text.
pub fn strip_comments(code: &str) -> String {
    let without_line = line_comment_re().replace_all(code, "");
    block_comment_re()
        .replace_all(&without_line, "")
        .into_owned()
}

/// Split a C source file into reviewable units.
///
/// Never fails: structural problems degrade to line windows. Returns no
/// units only for empty input.
pub fn chunk_source(source: &str, window_lines: usize) -> Vec<SourceUnit> {
    if source.is_empty() {
        return Vec::new();
    }

    let clean = strip_comments(source);
    tracing::debug!(lines = clean.lines().count(), "stripped comments");

    let units = match parse_functions(&clean) {
        Ok(units) if !units.is_empty() => {
            tracing::info!(functions = units.len(), "function parsing succeeded");
            units
        }
        Ok(_) => {
            tracing::info!("no function definitions found, using line windows");
            window_chunks(&clean, window_lines)
        }
        Err(e) => {
            tracing::warn!(error = %e, "parse failed, using line windows");
            window_chunks(&clean, window_lines)
        }
    };

    if units.is_empty() {
        // Comment-only input strips down to nothing.
        return vec![SourceUnit {
            index: 0,
            text: clean,
            origin: UnitOrigin::Fallback,
            start_line: 1,
        }];
    }

    units
}

/// Split `text` into windows of `window_lines` lines.
///
/// The last window may be shorter. A `window_lines` of 0 is treated as 1.
pub fn window_chunks(text: &str, window_lines: usize) -> Vec<SourceUnit> {
    let window = window_lines.max(1);
    let lines: Vec<&str> = text.lines().collect();

    let units: Vec<SourceUnit> = lines
        .chunks(window)
        .enumerate()
        .map(|(index, slice)| SourceUnit {
            index,
            text: slice.join("\n"),
            origin: UnitOrigin::Fallback,
            start_line: index * window + 1,
        })
        .collect();

    tracing::info!(
        chunks = units.len(),
        window_lines = window,
        "line-window chunking"
    );
    units
}

/// Run the structural pass over already comment-stripped text.
///
/// Returns [`ReviewError::Parse`] when the grammar reports errors.
pub fn parse_functions(clean: &str) -> Result<Vec<SourceUnit>> {
    let mut parser = Parser::new();
    let language: tree_sitter::Language = tree_sitter_c::LANGUAGE.into();
    parser
        .set_language(&language)
        .map_err(|e| ReviewError::Parse(format!("failed to load C grammar: {e}")))?;

    let tree = parser
        .parse(clean, None)
        .ok_or_else(|| ReviewError::Parse("parser returned no tree".to_string()))?;
    let root = tree.root_node();
    if root.has_error() {
        return Err(ReviewError::Parse(format!(
            "syntax error near line {}",
            first_error_line(root).map_or(0, |row| row + 1)
        )));
    }

    let mut starts = Vec::new();
    collect_function_starts(root, &mut starts);

    let lines: Vec<&str> = clean.lines().collect();
    let units = starts
        .into_iter()
        .filter(|&start| start < lines.len())
        .enumerate()
        .map(|(index, start)| {
            let end = brace_balanced_end(&lines, start);
            SourceUnit {
                index,
                text: lines[start..end].join("\n"),
                origin: UnitOrigin::Parsed,
                start_line: start + 1,
            }
        })
        .collect();

    Ok(units)
}

/// Collect the start rows of top-level function definitions.
///
/// Conditional preprocessor blocks are transparent: a function inside
/// `#ifdef` is still top-level C.
fn collect_function_starts(node: Node, starts: &mut Vec<usize>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function_definition" => starts.push(child.start_position().row),
            "preproc_if" | "preproc_ifdef" | "preproc_else" | "preproc_elif" => {
                collect_function_starts(child, starts)
            }
            _ => {}
        }
    }
}

fn first_error_line(node: Node) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row);
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|c| c.has_error())
        .find_map(first_error_line)
}

/// Exclusive end line of the unit starting at `start`.
fn brace_balanced_end(lines: &[&str], start: usize) -> usize {
    let mut balance: i64 = 0;
    let mut opened = false;

    for (i, line) in lines.iter().enumerate().skip(start) {
        let opens = line.matches('{').count() as i64;
        let closes = line.matches('}').count() as i64;
        balance += opens - closes;
        if opens > 0 {
            opened = true;
        }
        if opened && balance == 0 {
            return i + 1;
        }
    }

    lines.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_FUNCS: &str = "#include <stdio.h>
int add(int a, int b)
{
    return a + b;
}

static void noop(void) { }
";

    #[test]
    fn test_empty_source_yields_no_units() {
        assert!(chunk_source("", 200).is_empty());
    }

    #[test]
    fn test_functions_become_parsed_units() {
        let units = chunk_source(TWO_FUNCS, 200);
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].origin, UnitOrigin::Parsed);
        assert_eq!(units[0].start_line, 2);
        assert_eq!(
            units[0].text,
            "int add(int a, int b)\n{\n    return a + b;\n}"
        );
        assert_eq!(units[1].start_line, 7);
        assert_eq!(units[1].text, "static void noop(void) { }");
        assert_eq!(units[1].index, 1);
    }

    #[test]
    fn test_single_line_function() {
        let units = chunk_source("void f(){ int x=UNSAFE_MACRO(x); }", 200);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].origin, UnitOrigin::Parsed);
        assert_eq!(units[0].text, "void f(){ int x=UNSAFE_MACRO(x); }");
    }

    #[test]
    fn test_parse_failure_matches_direct_windowing() {
        let broken = "int main( {\n  return @@@;\n}\n// trailing\nint y = ;\n";
        let units = chunk_source(broken, 2);
        let expected = window_chunks(&strip_comments(broken), 2);
        assert_eq!(units, expected);
        assert!(units.iter().all(|u| u.origin == UnitOrigin::Fallback));
    }

    #[test]
    fn test_no_functions_falls_back() {
        let src = "int a;\nint b;\nint c;\n";
        let units = chunk_source(src, 2);
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].text, "int a;\nint b;");
        assert_eq!(units[1].text, "int c;");
        assert_eq!(units[1].start_line, 3);
    }

    #[test]
    fn test_window_last_is_shorter() {
        let text = (1..=450)
            .map(|i| format!("x{};", i))
            .collect::<Vec<_>>()
            .join("\n");
        let units = window_chunks(&text, DEFAULT_WINDOW_LINES);
        assert_eq!(units.len(), 3);
        assert_eq!(units[2].line_count(), 50);
        assert_eq!(units[2].start_line, 401);
    }

    #[test]
    fn test_comment_only_source_yields_one_unit() {
        let units = chunk_source("// nothing here", 200);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].origin, UnitOrigin::Fallback);
    }

    #[test]
    fn test_strip_comments() {
        assert_eq!(strip_comments("a // c\nb /* x */ c"), "a \nb  c");
        assert_eq!(strip_comments("/* one\ntwo */int z;"), "int z;");
    }

    #[test]
    fn test_brace_in_string_shifts_boundary() {
        let lines = vec!["void f(void)", "{", "  puts(\"}\");", "  g();", "}"];
        assert_eq!(brace_balanced_end(&lines, 0), 3);
    }

    #[test]
    fn test_unclosed_body_runs_to_end() {
        let lines = vec!["void f(void) {", "  g();"];
        assert_eq!(brace_balanced_end(&lines, 0), 2);
    }
}
