//! Directory listing and filename search.

use async_trait::async_trait;
use leap_core::error::ToolError;
use leap_core::tool::{Tool, ToolOutput, ToolParam};
use std::path::{Path, PathBuf};

use crate::{expand_path, walk_tree};

const MAX_LIST_ENTRIES: usize = 100;
const MAX_SEARCH_MATCHES: usize = 50;

pub struct ListDirectoryTool;

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List directory contents"
    }

    fn parameters(&self) -> &[ToolParam] {
        const PARAMS: &[ToolParam] = &[ToolParam::optional("path")];
        PARAMS
    }

    fn output_fields(&self) -> &[&str] {
        &["files", "directories", "count"]
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let path = expand_path(arguments["path"].as_str().unwrap_or("."));

        let mut reader = match tokio::fs::read_dir(&path).await {
            Ok(r) => r,
            Err(e) => {
                return Ok(ToolOutput::failed(format!(
                    "Failed to list {}: {e}",
                    path.display()
                )));
            }
        };

        let mut names = Vec::new();
        loop {
            match reader.next_entry().await {
                Ok(Some(entry)) => names.push(entry.file_name().to_string_lossy().into_owned()),
                Ok(None) => break,
                Err(e) => return Ok(ToolOutput::failed(format!("Failed to list: {e}"))),
            }
        }
        names.sort();
        names.truncate(MAX_LIST_ENTRIES);

        let mut files = Vec::new();
        let mut directories = Vec::new();
        for name in names {
            // Follows symlinks, like a shell `ls -L`
            match tokio::fs::metadata(path.join(&name)).await {
                Ok(meta) if meta.is_dir() => directories.push(serde_json::json!(name)),
                Ok(meta) => files.push(serde_json::json!({ "name": name, "size": meta.len() })),
                // Dangling symlink
                Err(_) => files.push(serde_json::json!({ "name": name, "size": 0 })),
            }
        }

        Ok(ToolOutput::data(serde_json::json!({
            "path": path.display().to_string(),
            "file_count": files.len(),
            "dir_count": directories.len(),
            "files": files,
            "directories": directories,
        })))
    }
}

pub struct SearchFilesTool;

#[async_trait]
impl Tool for SearchFilesTool {
    fn name(&self) -> &str {
        "search_files"
    }

    fn description(&self) -> &str {
        "Find files by pattern"
    }

    fn parameters(&self) -> &[ToolParam] {
        const PARAMS: &[ToolParam] = &[ToolParam::required("pattern"), ToolParam::optional("directory")];
        PARAMS
    }

    fn output_fields(&self) -> &[&str] {
        &["matches", "count"]
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let pattern = arguments["pattern"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'pattern' argument".into()))?
            .to_string();
        let directory = expand_path(arguments["directory"].as_str().unwrap_or("."));

        if !directory.is_dir() {
            return Ok(ToolOutput::failed(format!(
                "Not a directory: {}",
                directory.display()
            )));
        }

        let root = directory.clone();
        let pat = pattern.clone();
        let matches = tokio::task::spawn_blocking(move || find_matching(&root, &pat))
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "search_files".into(),
                reason: e.to_string(),
            })?;

        let matches: Vec<String> = matches.iter().map(|p| p.display().to_string()).collect();
        Ok(ToolOutput::data(serde_json::json!({
            "pattern": pattern,
            "directory": directory.display().to_string(),
            "count": matches.len(),
            "matches": matches,
        })))
    }
}

/// Walk `root` and collect paths whose name matches `pattern`.
///
/// A pattern containing `/` is matched against the path relative to `root`.
fn find_matching(root: &Path, pattern: &str) -> Vec<PathBuf> {
    let against_relative = pattern.contains('/');
    walk_tree(root)
        .filter(|entry| entry.depth() > 0)
        .filter(|entry| {
            if against_relative {
                entry
                    .path()
                    .strip_prefix(root)
                    .map(|rel| wildcard_match(pattern, &rel.to_string_lossy()))
                    .unwrap_or(false)
            } else {
                wildcard_match(pattern, &entry.file_name().to_string_lossy())
            }
        })
        .take(MAX_SEARCH_MATCHES)
        .map(|entry| entry.into_path())
        .collect()
}

/// Shell-style wildcard match: `*` matches any run of characters, `?` exactly one.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    // Position of the last `*` and the text index it was tried at
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        match p.get(pi) {
            Some('*') => {
                backtrack = Some((pi, ti));
                pi += 1;
            }
            Some(&c) if c == '?' || c == t[ti] => {
                pi += 1;
                ti += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    pi = star + 1;
                    ti = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}
