//! Result filter — compresses tool output before it reaches the planner.
//!
//! Small mappings pass through untouched. Larger ones are projected onto
//! the requested fields by the execution model; if its reply can't be
//! parsed, the requested keys are copied over directly, and if none of
//! them exist the raw result is kept rather than returning nothing.

use leap_config::{ModelsConfig, OrchestratorConfig};
use leap_core::{GenerationRequest, ProviderError};
use leap_providers::GenerationService;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::parser::{extract_json_fragment, strip_reasoning};
use crate::prompts;
use crate::text::truncate_chars;

/// How a filtered value was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMethod {
    /// A string or scalar result, truncated and wrapped in a mapping.
    Wrapped,
    /// Filtering disabled or no fields requested.
    Skipped,
    /// Below the small-result threshold.
    PassThrough,
    /// Projected by the execution model.
    Model,
    /// Model reply unusable; requested keys copied from the raw mapping.
    KeySubset,
    /// Model reply unusable and no requested key present.
    Unchanged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filtered {
    pub value: Value,
    pub method: FilterMethod,
}

impl Filtered {
    fn new(value: Value, method: FilterMethod) -> Self {
        Self { value, method }
    }
}

/// Size limits and model settings for filtering.
#[derive(Debug, Clone)]
pub struct ResultFilter {
    model: String,
    temperature: f32,
    max_tokens: u32,
    small_result_chars: usize,
    input_chars: usize,
    text_chars: usize,
}

impl ResultFilter {
    pub fn new(models: &ModelsConfig, limits: &OrchestratorConfig) -> Self {
        Self {
            model: models.sub.clone(),
            temperature: models.sub_temperature,
            max_tokens: limits.filter_max_tokens,
            small_result_chars: limits.small_result_chars,
            input_chars: limits.filter_input_chars,
            text_chars: limits.text_truncate_chars,
        }
    }

    /// Filter `raw` down to `fields`.
    ///
    /// With `enabled == false` or no fields, mappings pass through and only
    /// the string/scalar wrapping is applied. Backend failures propagate.
    pub async fn filter(
        &self,
        service: &GenerationService,
        raw: &Value,
        fields: &[String],
        enabled: bool,
    ) -> Result<Filtered, ProviderError> {
        let map = match raw {
            Value::Object(map) => map,
            Value::String(text) => {
                return Ok(Filtered::new(
                    serde_json::json!({ "content": truncate_chars(text, self.text_chars) }),
                    FilterMethod::Wrapped,
                ));
            }
            other => {
                let text = other.to_string();
                return Ok(Filtered::new(
                    serde_json::json!({ "result": truncate_chars(&text, self.text_chars) }),
                    FilterMethod::Wrapped,
                ));
            }
        };

        if !enabled || fields.is_empty() {
            return Ok(Filtered::new(raw.clone(), FilterMethod::Skipped));
        }

        let pretty = serde_json::to_string_pretty(raw).unwrap_or_else(|_| raw.to_string());
        if pretty.chars().count() < self.small_result_chars {
            return Ok(Filtered::new(raw.clone(), FilterMethod::PassThrough));
        }

        let prompt = prompts::filter(fields, truncate_chars(&pretty, self.input_chars));
        let request = GenerationRequest::new(self.model.clone(), prompt)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        let reply = service.generate(request).await?;

        if let Some(projected) = parse_projection(&reply.text) {
            debug!(fields = ?fields, "Result filtered by execution model");
            return Ok(Filtered::new(projected, FilterMethod::Model));
        }

        warn!(fields = ?fields, "Filter reply unparseable, falling back to key subset");
        Ok(key_subset(map, fields))
    }
}

/// The first balanced JSON object or array in the model's reply.
fn parse_projection(reply: &str) -> Option<Value> {
    let cleaned = strip_reasoning(reply);
    let fragment = extract_json_fragment(&cleaned)?;
    serde_json::from_str(fragment).ok()
}

/// Copy the requested keys that exist; fall back to the whole mapping if none do.
fn key_subset(map: &Map<String, Value>, fields: &[String]) -> Filtered {
    let subset: Map<String, Value> = fields
        .iter()
        .filter_map(|f| map.get(f).map(|v| (f.clone(), v.clone())))
        .collect();
    if subset.is_empty() {
        Filtered::new(Value::Object(map.clone()), FilterMethod::Unchanged)
    } else {
        Filtered::new(Value::Object(subset), FilterMethod::KeySubset)
    }
}
