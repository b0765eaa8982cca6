//! Small utility tools: current time and JSON parsing.

use async_trait::async_trait;
use chrono::format::{Item, StrftimeItems};
use chrono::{Datelike, Local, Timelike};
use leap_core::error::ToolError;
use leap_core::tool::{Tool, ToolOutput, ToolParam};

const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "get_current_time"
    }

    fn description(&self) -> &str {
        "Get current date/time"
    }

    fn parameters(&self) -> &[ToolParam] {
        const PARAMS: &[ToolParam] = &[ToolParam::optional("format")];
        PARAMS
    }

    fn output_fields(&self) -> &[&str] {
        &["datetime", "timestamp", "timezone"]
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let format = arguments["format"].as_str().unwrap_or(DEFAULT_TIME_FORMAT);

        // chrono panics when displaying an invalid format string
        if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
            return Ok(ToolOutput::failed(format!("Invalid time format: '{format}'")));
        }

        let now = Local::now();
        Ok(ToolOutput::data(serde_json::json!({
            "datetime": now.format(format).to_string(),
            "timestamp": now.timestamp_millis() as f64 / 1000.0,
            "iso": now.to_rfc3339(),
            "timezone": now.offset().to_string(),
            "year": now.year(),
            "month": now.month(),
            "day": now.day(),
            "hour": now.hour(),
            "minute": now.minute(),
        })))
    }
}

pub struct ParseJsonTool;

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(n) if n.is_f64() => "float",
        serde_json::Value::Number(_) => "int",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[async_trait]
impl Tool for ParseJsonTool {
    fn name(&self) -> &str {
        "parse_json"
    }

    fn description(&self) -> &str {
        "Parse/format JSON"
    }

    fn parameters(&self) -> &[ToolParam] {
        const PARAMS: &[ToolParam] = &[ToolParam::required("text")];
        PARAMS
    }

    fn output_fields(&self) -> &[&str] {
        &["parsed", "valid"]
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let text = arguments["text"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'text' argument".into()))?;

        // Invalid input is a normal answer here, not a tool failure
        match serde_json::from_str::<serde_json::Value>(text) {
            Ok(parsed) => Ok(ToolOutput::data(serde_json::json!({
                "valid": true,
                "type": json_type_name(&parsed),
                "parsed": parsed,
            }))),
            Err(e) => Ok(ToolOutput::data(serde_json::json!({
                "valid": false,
                "error": e.to_string(),
            }))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn current_time_fields() {
        let result = CurrentTimeTool.execute(serde_json::json!({})).await.unwrap().into_value();
        let year = result["year"].as_i64().unwrap();
        assert!(year >= 2024);
        assert_eq!(result["datetime"].as_str().unwrap().len(), 19);
        assert!(result["timestamp"].as_f64().unwrap() > 0.0);
        assert!(result["iso"].as_str().unwrap().contains('T'));
        assert!(result["timezone"].is_string());
    }

    #[tokio::test]
    async fn current_time_custom_format() {
        let result = CurrentTimeTool
            .execute(serde_json::json!({"format": "%Y"}))
            .await
            .unwrap()
            .into_value();
        assert_eq!(result["datetime"].as_str().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn current_time_invalid_format_is_failure() {
        let result = CurrentTimeTool
            .execute(serde_json::json!({"format": "%Q%"}))
            .await
            .unwrap();
        assert!(result.is_failure());
    }

    #[tokio::test]
    async fn parse_valid_json() {
        let result = ParseJsonTool
            .execute(serde_json::json!({"text": r#"{"a": [1, 2.5]}"#}))
            .await
            .unwrap()
            .into_value();
        assert_eq!(result["valid"], true);
        assert_eq!(result["type"], "object");
        assert_eq!(result["parsed"]["a"][1], 2.5);
    }

    #[tokio::test]
    async fn parse_invalid_json_reports_error() {
        let result = ParseJsonTool
            .execute(serde_json::json!({"text": "{not json"}))
            .await
            .unwrap();
        assert!(!result.is_failure());
        let value = result.into_value();
        assert_eq!(value["valid"], false);
        assert!(value["error"].is_string());
    }

    #[test]
    fn type_names() {
        assert_eq!(json_type_name(&serde_json::json!(1)), "int");
        assert_eq!(json_type_name(&serde_json::json!(1.5)), "float");
        assert_eq!(json_type_name(&serde_json::json!([])), "array");
        assert_eq!(json_type_name(&serde_json::json!(null)), "null");
    }
}
