//! File write tools — overwrite, replace text, insert lines.

use async_trait::async_trait;
use leap_core::error::ToolError;
use leap_core::tool::{Tool, ToolOutput, ToolParam};

use crate::expand_path;

pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to file (overwrite)"
    }

    fn parameters(&self) -> &[ToolParam] {
        const PARAMS: &[ToolParam] = &[ToolParam::required("path"), ToolParam::required("content")];
        PARAMS
    }

    fn output_fields(&self) -> &[&str] {
        &["success", "bytes_written", "error"]
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;

        let content = arguments["content"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'content' argument".into()))?;

        let path = expand_path(path);

        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty())
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            return Ok(ToolOutput::failed(format!("Failed to create directory: {e}")));
        }

        match tokio::fs::write(&path, content).await {
            Ok(()) => Ok(ToolOutput::data(serde_json::json!({
                "success": true,
                "path": path.display().to_string(),
                "bytes_written": content.len(),
            }))),
            Err(e) => Ok(ToolOutput::failed(format!("Failed to write file: {e}"))),
        }
    }
}

pub struct ReplaceInFileTool;

#[async_trait]
impl Tool for ReplaceInFileTool {
    fn name(&self) -> &str {
        "replace_in_file"
    }

    fn description(&self) -> &str {
        "Replace text in file"
    }

    fn parameters(&self) -> &[ToolParam] {
        const PARAMS: &[ToolParam] = &[
            ToolParam::required("path"),
            ToolParam::required("old_text"),
            ToolParam::required("new_text"),
        ];
        PARAMS
    }

    fn output_fields(&self) -> &[&str] {
        &["success", "replacements", "error"]
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;
        let old_text = arguments["old_text"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'old_text' argument".into()))?;
        let new_text = arguments["new_text"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'new_text' argument".into()))?;

        if old_text.is_empty() {
            return Ok(ToolOutput::failed("old_text must not be empty"));
        }

        let path = expand_path(path);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) => return Ok(ToolOutput::failed(format!("Failed to read {}: {e}", path.display()))),
        };

        let replacements = content.matches(old_text).count();
        if replacements == 0 {
            let preview: String = old_text.chars().take(50).collect();
            return Ok(ToolOutput::failed(format!("Text not found in file: {preview}...")));
        }

        let new_content = content.replace(old_text, new_text);
        if let Err(e) = tokio::fs::write(&path, &new_content).await {
            return Ok(ToolOutput::failed(format!("Failed to write file: {e}")));
        }

        Ok(ToolOutput::data(serde_json::json!({
            "success": true,
            "path": path.display().to_string(),
            "replacements": replacements,
            "new_size": new_content.len(),
        })))
    }
}

pub struct InsertInFileTool;

#[async_trait]
impl Tool for InsertInFileTool {
    fn name(&self) -> &str {
        "insert_in_file"
    }

    fn description(&self) -> &str {
        "Insert text/lines in file"
    }

    fn parameters(&self) -> &[ToolParam] {
        const PARAMS: &[ToolParam] = &[
            ToolParam::required("path"),
            ToolParam::required("content"),
            ToolParam::optional("line"),
        ];
        PARAMS
    }

    fn output_fields(&self) -> &[&str] {
        &["success", "inserted_at", "error"]
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;
        let content = arguments["content"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'content' argument".into()))?;

        // Small models often quote numbers
        let line = match &arguments["line"] {
            serde_json::Value::Null => -1,
            serde_json::Value::String(s) => s.trim().parse::<i64>().map_err(|_| {
                ToolError::InvalidArguments(format!("'line' must be an integer, got '{s}'"))
            })?,
            v => v
                .as_i64()
                .ok_or_else(|| ToolError::InvalidArguments("'line' must be an integer".into()))?,
        };

        let path = expand_path(path);
        let existing = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) => return Ok(ToolOutput::failed(format!("Failed to read {}: {e}", path.display()))),
        };

        let mut lines: Vec<String> = existing.split_inclusive('\n').map(String::from).collect();
        if let Some(last) = lines.last_mut()
            && !last.ends_with('\n')
        {
            last.push('\n');
        }
        let inserted = format!("{content}\n");

        let inserted_at = if line == -1 {
            lines.push(inserted);
            serde_json::json!("end")
        } else {
            let max = lines.len() as i64 + 1;
            if line < 1 || line > max {
                return Ok(ToolOutput::failed(format!("Line {line} out of range (1-{max})")));
            }
            lines.insert((line - 1) as usize, inserted);
            serde_json::json!(line)
        };

        if let Err(e) = tokio::fs::write(&path, lines.concat()).await {
            return Ok(ToolOutput::failed(format!("Failed to write file: {e}")));
        }

        Ok(ToolOutput::data(serde_json::json!({
            "success": true,
            "path": path.display().to_string(),
            "inserted_at": inserted_at,
            "new_lines": lines.len(),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_definitions() {
        let spec = WriteFileTool.spec();
        assert_eq!(spec.name, "write_file");
        assert_eq!(spec.required, vec!["path", "content"]);

        let spec = InsertInFileTool.spec();
        assert_eq!(spec.parameters, vec!["path", "content", "line"]);
        assert_eq!(spec.required, vec!["path", "content"]);
    }

    #[tokio::test]
    async fn write_and_verify() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("output.txt");

        let result = WriteFileTool
            .execute(serde_json::json!({
                "path": file_path.to_str().unwrap(),
                "content": "Hello from test!"
            }))
            .await
            .unwrap()
            .into_value();

        assert_eq!(result["success"], true);
        assert_eq!(result["bytes_written"], 16);
        assert_eq!(std::fs::read_to_string(&file_path).unwrap(), "Hello from test!");
    }

    #[tokio::test]
    async fn write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("sub").join("dir").join("file.txt");

        let result = WriteFileTool
            .execute(serde_json::json!({
                "path": file_path.to_str().unwrap(),
                "content": "nested"
            }))
            .await
            .unwrap();

        assert!(!result.is_failure());
        assert_eq!(std::fs::read_to_string(&file_path).unwrap(), "nested");
    }

    #[tokio::test]
    async fn write_missing_content() {
        let result = WriteFileTool
            .execute(serde_json::json!({"path": "/tmp/x"}))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn replace_counts_all_occurrences() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.txt");
        std::fs::write(&path, "foo bar foo").unwrap();

        let result = ReplaceInFileTool
            .execute(serde_json::json!({
                "path": path.to_str().unwrap(),
                "old_text": "foo",
                "new_text": "baz"
            }))
            .await
            .unwrap()
            .into_value();

        assert_eq!(result["replacements"], 2);
        assert_eq!(result["new_size"], 11);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "baz bar baz");
    }

    #[tokio::test]
    async fn replace_text_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.txt");
        std::fs::write(&path, "hello").unwrap();

        let result = ReplaceInFileTool
            .execute(serde_json::json!({
                "path": path.to_str().unwrap(),
                "old_text": "absent",
                "new_text": "x"
            }))
            .await
            .unwrap();
        assert!(result.is_failure());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
    }

    #[tokio::test]
    async fn insert_at_line_and_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("i.txt");
        std::fs::write(&path, "one\nthree").unwrap();

        let result = InsertInFileTool
            .execute(serde_json::json!({
                "path": path.to_str().unwrap(),
                "content": "two",
                "line": 2
            }))
            .await
            .unwrap()
            .into_value();
        assert_eq!(result["inserted_at"], 2);
        assert_eq!(result["new_lines"], 3);

        let result = InsertInFileTool
            .execute(serde_json::json!({
                "path": path.to_str().unwrap(),
                "content": "four"
            }))
            .await
            .unwrap()
            .into_value();
        assert_eq!(result["inserted_at"], "end");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\ntwo\nthree\nfour\n");
    }

    #[tokio::test]
    async fn insert_accepts_quoted_line_number() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.txt");
        std::fs::write(&path, "b\n").unwrap();

        let result = InsertInFileTool
            .execute(serde_json::json!({
                "path": path.to_str().unwrap(),
                "content": "a",
                "line": "1"
            }))
            .await
            .unwrap();
        assert!(!result.is_failure());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\nb\n");
    }

    #[tokio::test]
    async fn insert_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("o.txt");
        std::fs::write(&path, "only\n").unwrap();

        let result = InsertInFileTool
            .execute(serde_json::json!({
                "path": path.to_str().unwrap(),
                "content": "x",
                "line": 9
            }))
            .await
            .unwrap();
        assert!(result.is_failure());
    }
}
