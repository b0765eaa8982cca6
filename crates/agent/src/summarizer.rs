//! Rolling state summary.
//!
//! The summary is the only thing that carries information from one turn
//! to the next. The model is asked to keep it under 300 words; the stored
//! text is additionally cut to `summary_max_chars`.

use leap_config::{ModelsConfig, OrchestratorConfig};
use leap_core::{GenerationRequest, ProviderError};
use leap_providers::GenerationService;
use tracing::{debug, warn};

use crate::parser::strip_reasoning;
use crate::prompts;
use crate::text::truncate_chars;

/// Summary at turn 1, before any tool has run.
pub const INITIAL_SUMMARY: &str = "No actions taken yet.";

#[derive(Debug, Clone)]
pub struct RollingSummarizer {
    model: String,
    temperature: f32,
    max_tokens: u32,
    result_chars: usize,
    max_chars: usize,
}

impl RollingSummarizer {
    pub fn new(models: &ModelsConfig, limits: &OrchestratorConfig) -> Self {
        Self {
            model: models.main.clone(),
            temperature: models.planning_temperature,
            max_tokens: limits.state_max_tokens,
            result_chars: limits.state_result_chars,
            max_chars: limits.summary_max_chars,
        }
    }

    /// Merge one action into `previous` and return the new summary.
    pub async fn update(
        &self,
        service: &GenerationService,
        query: &str,
        previous: &str,
        tool: &str,
        result: &str,
    ) -> Result<String, ProviderError> {
        let prompt = prompts::state_update(
            query,
            previous,
            tool,
            truncate_chars(result, self.result_chars),
        );
        let request = GenerationRequest::new(self.model.clone(), prompt)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        let reply = service.generate(request).await?;

        let cleaned = strip_reasoning(&reply.text);
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            warn!(tool, "State update returned nothing, keeping previous summary");
            return Ok(previous.to_string());
        }

        let summary = truncate_chars(cleaned, self.max_chars);
        if summary.len() < cleaned.len() {
            debug!(tool, max_chars = self.max_chars, "Summary truncated");
        }
        Ok(summary.to_string())
    }
}
