//! Tool trait — the abstraction over the orchestrator's external actions.
//!
//! Tools are plain "named parameters in, structured result out" functions:
//! read a file, run a shell command, fetch a URL. The planning model only
//! ever sees their name and a one-line description; the parameter list and
//! the declared output fields stay on this side of the prompt.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use crate::error::{Error, ToolError};

/// A parameter accepted by a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolParam {
    pub name: &'static str,
    pub required: bool,
}

impl ToolParam {
    pub const fn required(name: &'static str) -> Self {
        Self { name, required: true }
    }

    pub const fn optional(name: &'static str) -> Self {
        Self { name, required: false }
    }
}

/// Immutable description of a registered tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// Parameter names in declaration order.
    pub parameters: Vec<String>,
    /// Subset of `parameters` that must be present.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    /// Output fields a filter may ask for.
    pub output_fields: Vec<String>,
}

/// A tool call extracted from planning-model output.
///
/// The "finish" case is represented by the parser, not by an empty
/// `tool` here: a `ToolRequest` always names a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub tool: String,

    #[serde(default)]
    pub params: Map<String, Value>,

    #[serde(default)]
    pub filter: Vec<String>,
}

impl ToolRequest {
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            params: Map::new(),
            filter: Vec::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_filter<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter = fields.into_iter().map(Into::into).collect();
        self
    }
}

/// The outcome of running a tool.
///
/// Expected failures (missing file, bad pattern, non-zero exit) are
/// `Failed`, not `Err`: they are data for the planner to react to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ToolOutput {
    /// A mapping of field name to value.
    Data(Map<String, Value>),
    /// Free text.
    Text(String),
    /// The tool ran and reported a failure.
    Failed(String),
}

impl ToolOutput {
    /// Build a `Data` output from a `json!({...})` literal.
    ///
    /// Non-object values are wrapped as `{"result": value}`.
    pub fn data(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Data(map),
            other => {
                let mut map = Map::new();
                map.insert("result".into(), other);
                Self::Data(map)
            }
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// The JSON value that is shown to the models. Failures become `{"error": msg}`.
    pub fn into_value(self) -> Value {
        match self {
            Self::Data(map) => Value::Object(map),
            Self::Text(text) => Value::String(text),
            Self::Failed(message) => serde_json::json!({ "error": message }),
        }
    }
}

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "read_file").
    fn name(&self) -> &str;

    /// One-line description. This is all the planning model learns about the tool.
    fn description(&self) -> &str;

    /// Accepted parameters, in order.
    fn parameters(&self) -> &[ToolParam] {
        &[]
    }

    /// Fields of the result the filter may project onto.
    fn output_fields(&self) -> &[&str] {
        &[]
    }

    /// Execute the tool with the given named parameters (a JSON object).
    async fn execute(&self, params: Value) -> std::result::Result<ToolOutput, ToolError>;

    fn spec(&self) -> ToolSpec {
        let params = self.parameters();
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: params.iter().map(|p| p.name.to_string()).collect(),
            required: params
                .iter()
                .filter(|p| p.required)
                .map(|p| p.name.to_string())
                .collect(),
            output_fields: self.output_fields().iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// An insertion-ordered registry of tools.
///
/// Built once at startup, then shared read-only (typically behind an `Arc`).
/// Iteration order is registration order, so rendered catalogues are stable.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a tool. Duplicate names are a configuration error.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> crate::Result<()> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(Error::config(format!("tool '{name}' registered twice")));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.index.get(name).map(|&i| self.tools[i].as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Tools in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Tool> {
        self.tools.iter().map(|t| t.as_ref())
    }

    /// List all registered tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validate a request's parameters against the tool's declared list and run it.
    pub async fn execute(&self, request: &ToolRequest) -> std::result::Result<ToolOutput, ToolError> {
        let tool = self
            .get(&request.tool)
            .ok_or_else(|| ToolError::NotFound(request.tool.clone()))?;

        let declared = tool.parameters();
        if let Some(unknown) = request
            .params
            .keys()
            .find(|k| !declared.iter().any(|p| p.name == k.as_str()))
        {
            return Err(ToolError::InvalidArguments(format!(
                "{} does not accept parameter '{unknown}'",
                request.tool
            )));
        }
        if let Some(missing) = declared
            .iter()
            .find(|p| p.required && !request.params.contains_key(p.name))
        {
            return Err(ToolError::InvalidArguments(format!(
                "{} requires parameter '{}'",
                request.tool, missing.name
            )));
        }

        tool.execute(Value::Object(request.params.clone())).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str { "echo" }
        fn description(&self) -> &str { "Echo back the input" }
        fn parameters(&self) -> &[ToolParam] {
            const PARAMS: &[ToolParam] = &[ToolParam::required("text"), ToolParam::optional("upper")];
            PARAMS
        }
        fn output_fields(&self) -> &[&str] {
            &["text"]
        }
        async fn execute(&self, params: Value) -> std::result::Result<ToolOutput, ToolError> {
            let text = params["text"].as_str().unwrap_or("").to_string();
            if text.is_empty() {
                return Ok(ToolOutput::failed("nothing to echo"));
            }
            Ok(ToolOutput::data(serde_json::json!({ "text": text })))
        }
    }

    struct SecondTool;

    #[async_trait]
    impl Tool for SecondTool {
        fn name(&self) -> &str { "second" }
        fn description(&self) -> &str { "Second tool" }
        async fn execute(&self, _params: Value) -> std::result::Result<ToolOutput, ToolError> {
            Ok(ToolOutput::Text("ok".into()))
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool)).unwrap();
        registry.register(Box::new(SecondTool)).unwrap();
        registry
    }

    #[test]
    fn registry_register_and_lookup() {
        let registry = registry();
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert!(registry.contains("second"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn registry_preserves_insertion_order() {
        let registry = registry();
        assert_eq!(registry.names(), vec!["echo", "second"]);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = registry();
        let err = registry.register(Box::new(EchoTool)).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn spec_lists_params_and_fields() {
        let spec = EchoTool.spec();
        assert_eq!(spec.parameters, vec!["text", "upper"]);
        assert_eq!(spec.required, vec!["text"]);
        assert_eq!(spec.output_fields, vec!["text"]);
    }

    #[tokio::test]
    async fn registry_execute_tool() {
        let registry = registry();
        let request = ToolRequest::new("echo").with_param("text", "hello world");
        let output = registry.execute(&request).await.unwrap();
        assert_eq!(output.into_value(), serde_json::json!({ "text": "hello world" }));
    }

    #[tokio::test]
    async fn registry_execute_missing_tool() {
        let registry = registry();
        let err = registry.execute(&ToolRequest::new("nonexistent")).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[tokio::test]
    async fn registry_rejects_unknown_and_missing_params() {
        let registry = registry();

        let unknown = ToolRequest::new("echo").with_param("text", "x").with_param("colour", "red");
        let err = registry.execute(&unknown).await.unwrap_err();
        assert!(err.to_string().contains("colour"));

        let missing = ToolRequest::new("echo").with_param("upper", true);
        let err = registry.execute(&missing).await.unwrap_err();
        assert!(err.to_string().contains("text"));
    }

    #[test]
    fn failed_output_becomes_error_field() {
        let value = ToolOutput::failed("file not found").into_value();
        assert_eq!(value, serde_json::json!({ "error": "file not found" }));
        assert!(ToolOutput::failed("x").is_failure());
    }

    #[test]
    fn data_wraps_non_objects() {
        let output = ToolOutput::data(serde_json::json!(42));
        assert_eq!(output.into_value(), serde_json::json!({ "result": 42 }));
    }

    #[test]
    fn tool_request_deserializes_with_defaults() {
        let req: ToolRequest = serde_json::from_str(r#"{"tool": "get_current_time"}"#).unwrap();
        assert_eq!(req.tool, "get_current_time");
        assert!(req.params.is_empty());
        assert!(req.filter.is_empty());
    }
}
