//! Code search tools — regex grep and symbol definition lookup.

use async_trait::async_trait;
use leap_core::error::ToolError;
use leap_core::tool::{Tool, ToolOutput, ToolParam};
use regex_lite::Regex;
use serde::Serialize;
use std::path::Path;

use crate::{expand_path, walk_tree};

const MAX_MATCHES: usize = 50;
const MAX_LINE_CHARS: usize = 100;

const GREP_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "jsx", "tsx", "java", "go", "rs", "c", "cpp", "h", "hpp",
];
const DEFINITION_EXTENSIONS: &[&str] = &["py", "js", "ts", "jsx", "tsx", "rs", "go", "java"];

/// A single matching source line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineMatch {
    pub file: String,
    pub line: usize,
    pub content: String,
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.contains(&e))
}

/// Scan source files under `root` line by line, collecting up to `limit` hits.
fn scan_lines(
    root: &Path,
    extensions: &[&str],
    limit: usize,
    mut matches_line: impl FnMut(&str) -> bool,
) -> Vec<LineMatch> {
    let mut hits = Vec::new();
    let files = walk_tree(root)
        .filter(|e| e.file_type().is_file())
        .filter(|e| has_extension(e.path(), extensions));

    for entry in files {
        // Unreadable or non-UTF-8 files are skipped
        let Ok(text) = std::fs::read_to_string(entry.path()) else {
            continue;
        };
        for (idx, line) in text.lines().enumerate() {
            if matches_line(line) {
                hits.push(LineMatch {
                    file: entry.path().display().to_string(),
                    line: idx + 1,
                    content: line.trim().chars().take(MAX_LINE_CHARS).collect(),
                });
                if hits.len() >= limit {
                    return hits;
                }
            }
        }
    }
    hits
}

async fn scan_blocking<F>(tool_name: &str, task: F) -> Result<Vec<LineMatch>, ToolError>
where
    F: FnOnce() -> Vec<LineMatch> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| ToolError::ExecutionFailed {
            tool_name: tool_name.into(),
            reason: e.to_string(),
        })
}

pub struct GrepCodeTool;

#[async_trait]
impl Tool for GrepCodeTool {
    fn name(&self) -> &str {
        "grep_code"
    }

    fn description(&self) -> &str {
        "Search pattern in code files"
    }

    fn parameters(&self) -> &[ToolParam] {
        const PARAMS: &[ToolParam] = &[ToolParam::required("pattern"), ToolParam::optional("directory")];
        PARAMS
    }

    fn output_fields(&self) -> &[&str] {
        &["matches", "files", "count"]
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let pattern = arguments["pattern"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'pattern' argument".into()))?;
        let directory = expand_path(arguments["directory"].as_str().unwrap_or("."));

        let re = match Regex::new(pattern) {
            Ok(re) => re,
            Err(e) => return Ok(ToolOutput::failed(format!("Invalid pattern '{pattern}': {e}"))),
        };

        let root = directory.clone();
        let matches = scan_blocking("grep_code", move || {
            scan_lines(&root, GREP_EXTENSIONS, MAX_MATCHES, |line| re.is_match(line))
        })
        .await?;

        let mut files: Vec<&str> = matches.iter().map(|m| m.file.as_str()).collect();
        files.dedup();

        Ok(ToolOutput::data(serde_json::json!({
            "pattern": pattern,
            "directory": directory.display().to_string(),
            "files": files,
            "count": matches.len(),
            "matches": matches,
        })))
    }
}

pub struct FindDefinitionTool;

/// Lines that define `symbol` in common languages: `def`, `class`, `fn`,
/// `struct`, `function`, `const` and friends, plus top-level assignment.
fn definition_regex(symbol: &str) -> Result<Regex, regex_lite::Error> {
    let sym = regex_lite::escape(symbol);
    Regex::new(&format!(
        r"^\s*(?:(?:pub(?:\([^)]*\))?|export|default|async|unsafe|static|abstract|public|private|protected)\s+)*(?:def|class|fn|struct|enum|trait|type|const|static|function|interface|let|var|mod|impl)\s+{sym}\b|^\s*func\s+(?:\([^)]*\)\s*)?{sym}\b|^\s*{sym}\s*=(?:[^=]|$)"
    ))
}

#[async_trait]
impl Tool for FindDefinitionTool {
    fn name(&self) -> &str {
        "find_definition"
    }

    fn description(&self) -> &str {
        "Find definition of symbol"
    }

    fn parameters(&self) -> &[ToolParam] {
        const PARAMS: &[ToolParam] = &[ToolParam::required("symbol"), ToolParam::optional("directory")];
        PARAMS
    }

    fn output_fields(&self) -> &[&str] {
        &["definitions", "count"]
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let symbol = arguments["symbol"]
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'symbol' argument".into()))?;
        let directory = expand_path(arguments["directory"].as_str().unwrap_or("."));

        let re = definition_regex(symbol).map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        let root = directory.clone();
        let definitions = scan_blocking("find_definition", move || {
            scan_lines(&root, DEFINITION_EXTENSIONS, MAX_MATCHES, |line| re.is_match(line))
        })
        .await?;

        Ok(ToolOutput::data(serde_json::json!({
            "symbol": symbol,
            "directory": directory.display().to_string(),
            "count": definitions.len(),
            "definitions": definitions,
        })))
    }
}
