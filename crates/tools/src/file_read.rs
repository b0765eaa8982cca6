//! File read tools — read contents and inspect metadata.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leap_core::error::ToolError;
use leap_core::tool::{Tool, ToolOutput, ToolParam};

use crate::expand_path;

/// Characters of file content returned before truncating.
const MAX_CONTENT_CHARS: usize = 10_000;

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read file contents"
    }

    fn parameters(&self) -> &[ToolParam] {
        const PARAMS: &[ToolParam] = &[ToolParam::required("path")];
        PARAMS
    }

    fn output_fields(&self) -> &[&str] {
        &["content", "size", "error"]
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;
        let path = expand_path(path);

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return Ok(ToolOutput::failed(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        // Invalid UTF-8 is replaced rather than rejected
        let content = String::from_utf8_lossy(&bytes);
        let size = content.chars().count();
        let truncated = size > MAX_CONTENT_CHARS;
        let content: String = content.chars().take(MAX_CONTENT_CHARS).collect();

        Ok(ToolOutput::data(serde_json::json!({
            "content": content,
            "size": size,
            "path": path.display().to_string(),
            "truncated": truncated,
        })))
    }
}

pub struct FileInfoTool;

#[async_trait]
impl Tool for FileInfoTool {
    fn name(&self) -> &str {
        "file_info"
    }

    fn description(&self) -> &str {
        "Get file metadata"
    }

    fn parameters(&self) -> &[ToolParam] {
        const PARAMS: &[ToolParam] = &[ToolParam::required("path")];
        PARAMS
    }

    fn output_fields(&self) -> &[&str] {
        &["size", "modified", "is_file", "is_dir", "readonly"]
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;
        let path = expand_path(path);

        let meta = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(e) => {
                return Ok(ToolOutput::failed(format!(
                    "Failed to stat {}: {e}",
                    path.display()
                )));
            }
        };

        let modified = meta
            .modified()
            .ok()
            .map(|t| DateTime::<Utc>::from(t).to_rfc3339());

        Ok(ToolOutput::data(serde_json::json!({
            "path": path.display().to_string(),
            "size": meta.len(),
            "modified": modified,
            "is_file": meta.is_file(),
            "is_dir": meta.is_dir(),
            "readonly": meta.permissions().readonly(),
        })))
    }
}
