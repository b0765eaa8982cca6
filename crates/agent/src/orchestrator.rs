//! The LEAP turn loop.
//!
//! ```text
//! PLANNING ──tool──▶ EXECUTING ──▶ STATE_UPDATE ──▶ PLANNING (turn + 1)
//!    │
//!    ├─ finish, turn 1 ──▶ DIRECT_RESPONSE
//!    ├─ finish, turn > 1 ──▶ FINAL_ANSWER
//!    └─ turn > max_turns ──▶ FINAL_ANSWER
//! ```
//!
//! Every phase runs to completion before the next one starts; nothing in a
//! run is concurrent. The planner never sees raw tool output or earlier
//! prompts, only the catalogue, the query and the rolling summary.

use chrono::Utc;
use futures::FutureExt;
use leap_config::{AppConfig, ModelsConfig, OrchestratorConfig};
use leap_core::{
    DomainEvent, Error, EventBus, GenerationRequest, Phase, ProviderError, Result, ToolRegistry,
    ToolRequest,
};
use leap_providers::GenerationService;
use leap_telemetry::{GenerationTotals, MetricsCollector, MetricsReport};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::catalogue::{Catalogue, estimate_tokens};
use crate::filter::ResultFilter;
use crate::parser::{self, ParsedResponse, strip_reasoning};
use crate::prompts;
use crate::stream::AnswerStream;
use crate::summarizer::{INITIAL_SUMMARY, RollingSummarizer};
use crate::text::truncate_chars;

/// Receives answer fragments as they are generated.
pub type AnswerSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Models and limits for one orchestrator.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorSettings {
    pub models: ModelsConfig,
    pub limits: OrchestratorConfig,
}

impl From<&AppConfig> for OrchestratorSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            models: config.models.clone(),
            limits: config.orchestrator.clone(),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terminal {
    /// The first plan needed no tool; answered from the query alone.
    Direct,
    /// The planner signalled completion after at least one tool call.
    Finished,
    /// `max_turns` planning calls were spent.
    TurnLimit,
}

impl std::fmt::Display for Terminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Direct => "direct",
            Self::Finished => "finished",
            Self::TurnLimit => "turn_limit",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub answer: String,
    /// The rolling summary as it stood when the run ended.
    pub summary: String,
    pub terminal: Terminal,
    /// Planning calls made.
    pub turns: u32,
    pub metrics: MetricsReport,
}

pub struct Orchestrator {
    service: Arc<GenerationService>,
    registry: Arc<ToolRegistry>,
    catalogue: Catalogue,
    settings: OrchestratorSettings,
    filter: ResultFilter,
    summarizer: RollingSummarizer,
    events: Option<Arc<EventBus>>,
    answer_sink: Option<AnswerSink>,
}

impl Orchestrator {
    /// Build an orchestrator. The catalogue is rendered here, once.
    pub fn new(
        service: Arc<GenerationService>,
        registry: Arc<ToolRegistry>,
        settings: OrchestratorSettings,
    ) -> Self {
        let catalogue = Catalogue::render(&registry);
        let filter = ResultFilter::new(&settings.models, &settings.limits);
        let summarizer = RollingSummarizer::new(&settings.models, &settings.limits);
        Self {
            service,
            registry,
            catalogue,
            settings,
            filter,
            summarizer,
            events: None,
            answer_sink: None,
        }
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    /// Stream final and direct answers to `sink` as they are generated.
    pub fn with_answer_sink(mut self, sink: AnswerSink) -> Self {
        self.answer_sink = Some(sink);
        self
    }

    pub fn catalogue(&self) -> &Catalogue {
        &self.catalogue
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Run one query through the loop.
    ///
    /// Tool failures and unparseable plans never end a run with an error;
    /// only backend failures do.
    pub async fn run_query(&self, query: &str, max_turns: u32) -> Result<RunOutcome> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidQuery("query must not be empty".into()));
        }
        if max_turns == 0 {
            return Err(Error::config("max_turns must be at least 1"));
        }

        let mut metrics = MetricsCollector::new();
        metrics.set_catalogue_tokens(self.catalogue.estimated_tokens());
        let baseline = self.service.stats();
        let run_id = metrics.run_id();

        info!(run_id = %run_id, max_turns, "Run started");
        self.publish(DomainEvent::RunStarted {
            run_id: run_id.clone(),
            query_preview: truncate_chars(query, 80).to_string(),
            max_turns,
            timestamp: Utc::now(),
        });

        let mut summary = INITIAL_SUMMARY.to_string();
        let mut turn = 1u32;
        let (answer, terminal) = loop {
            if turn > max_turns {
                warn!(max_turns, "Turn limit reached, forcing final answer");
                let answer = self.final_answer(query, &summary, max_turns, &mut metrics).await?;
                break (answer, Terminal::TurnLimit);
            }

            let start = Instant::now();
            let decision = self.plan(query, &summary).await?;
            self.phase_done(&mut metrics, turn, Phase::Planning, start.elapsed());

            let request = match decision {
                ParsedResponse::Call(request) => request,
                other => {
                    if other == ParsedResponse::Unparseable {
                        warn!(turn, "Planner reply unparseable, treating as finish");
                    }
                    if turn == 1 {
                        let answer = self.direct_answer(query, &mut metrics).await?;
                        break (answer, Terminal::Direct);
                    }
                    let answer = self.final_answer(query, &summary, turn, &mut metrics).await?;
                    break (answer, Terminal::Finished);
                }
            };

            info!(turn, tool = %request.tool, "Executing tool");
            let result_text = self.execute_and_filter(turn, &request, &mut metrics).await?;

            let start = Instant::now();
            summary = self
                .summarizer
                .update(&self.service, query, &summary, &request.tool, &result_text)
                .await?;
            self.phase_done(&mut metrics, turn, Phase::StateUpdate, start.elapsed());
            debug!(turn, summary_chars = summary.len(), "Summary updated");

            turn += 1;
        };

        let after = self.service.stats();
        metrics.set_generation(GenerationTotals {
            calls: after.calls.saturating_sub(baseline.calls),
            generated_tokens: after.generated_tokens.saturating_sub(baseline.generated_tokens),
            model_swaps: after.model_swaps.saturating_sub(baseline.model_swaps),
        });

        let turns = metrics.planning_calls();
        let report = metrics.report();
        info!(
            run_id = %run_id,
            turns,
            terminal = %terminal,
            tools = report.tool_invocations,
            total_secs = report.total_secs,
            "Run finished"
        );
        self.publish(DomainEvent::RunFinished {
            run_id,
            turns,
            terminal: terminal.to_string(),
            timestamp: Utc::now(),
        });

        Ok(RunOutcome {
            answer,
            summary,
            terminal,
            turns,
            metrics: report,
        })
    }

    async fn plan(&self, query: &str, summary: &str) -> Result<ParsedResponse> {
        let prompt = prompts::planning(&self.catalogue, query, summary);
        let request = GenerationRequest::new(self.settings.models.main.clone(), prompt)
            .with_temperature(self.settings.models.planning_temperature)
            .with_max_tokens(self.settings.limits.planning_max_tokens);
        let reply = self.service.generate(request).await?;
        debug!(reply_chars = reply.text.len(), "Planner replied");
        Ok(parser::parse(&reply.text))
    }

    /// Run the tool, filter its result, record sizes. Returns the text for the state update.
    async fn execute_and_filter(
        &self,
        turn: u32,
        request: &ToolRequest,
        metrics: &mut MetricsCollector,
    ) -> Result<String> {
        let start = Instant::now();
        let (raw, success) = self.execute(request).await;
        let filtered = self
            .filter
            .filter(
                &self.service,
                &raw,
                &request.filter,
                self.settings.limits.enable_filtering,
            )
            .await?;
        self.phase_done(metrics, turn, Phase::Execution, start.elapsed());

        let raw_tokens = match &raw {
            Value::String(text) => estimate_tokens(text),
            other => estimate_tokens(&other.to_string()),
        };
        let result_text = filtered.value.to_string();
        let filtered_tokens = estimate_tokens(&result_text);
        metrics.record_tool(&request.tool, raw_tokens, filtered_tokens);
        debug!(turn, tool = %request.tool, method = ?filtered.method, raw_tokens, filtered_tokens, "Result filtered");

        self.publish(DomainEvent::ToolExecuted {
            turn,
            tool_name: request.tool.clone(),
            success,
            raw_tokens,
            filtered_tokens,
            timestamp: Utc::now(),
        });
        Ok(result_text)
    }

    /// Execute one tool call. Every failure mode becomes `{error: ...}` data.
    async fn execute(&self, request: &ToolRequest) -> (Value, bool) {
        let outcome = AssertUnwindSafe(self.registry.execute(request))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(output)) => {
                let success = !output.is_failure();
                if !success {
                    debug!(tool = %request.tool, "Tool reported failure");
                }
                (output.into_value(), success)
            }
            Ok(Err(e)) => {
                warn!(tool = %request.tool, error = %e, "Tool call failed");
                (serde_json::json!({ "error": e.to_string() }), false)
            }
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".into());
                warn!(tool = %request.tool, panic = %message, "Tool panicked");
                (serde_json::json!({ "error": format!("tool panicked: {message}") }), false)
            }
        }
    }

    async fn direct_answer(&self, query: &str, metrics: &mut MetricsCollector) -> Result<String> {
        let start = Instant::now();
        let models = &self.settings.models;
        let limits = &self.settings.limits;

        let request = GenerationRequest::new(models.main.clone(), prompts::direct(query))
            .with_temperature(models.main_temperature)
            .with_max_tokens(limits.direct_max_tokens);
        let mut answer = self.respond(request.clone(), limits.direct_min_chars).await?;

        if answer.chars().count() < limits.direct_min_chars {
            warn!(chars = answer.chars().count(), "Direct answer too short, retrying");
            let retry = request.with_temperature(limits.direct_retry_temperature);
            answer = self.respond(retry, 0).await?;
        }

        self.phase_done(metrics, 1, Phase::DirectResponse, start.elapsed());
        Ok(answer)
    }

    async fn final_answer(
        &self,
        query: &str,
        summary: &str,
        turn: u32,
        metrics: &mut MetricsCollector,
    ) -> Result<String> {
        let start = Instant::now();
        let request =
            GenerationRequest::new(self.settings.models.main.clone(), prompts::final_answer(query, summary))
                .with_temperature(self.settings.models.main_temperature)
                .with_max_tokens(self.settings.limits.final_max_tokens);
        let answer = self.respond(request, 0).await?;
        self.phase_done(metrics, turn, Phase::FinalAnswer, start.elapsed());
        Ok(answer)
    }

    /// Generate a user-facing answer, streaming it if a sink is attached.
    ///
    /// The sink sees reasoning-free text only, and nothing at all unless the
    /// visible answer reaches `min_chars`.
    async fn respond(
        &self,
        request: GenerationRequest,
        min_chars: usize,
    ) -> std::result::Result<String, ProviderError> {
        let generation = match &self.answer_sink {
            Some(sink) => {
                let mut stream = AnswerStream::new(sink.as_ref(), min_chars);
                let generation = self
                    .service
                    .generate_stream(request, &mut |fragment: &str| stream.push(fragment))
                    .await?;
                if !stream.finish() {
                    debug!(min_chars, "Streamed answer withheld");
                }
                generation
            }
            None => self.service.generate(request).await?,
        };
        Ok(strip_reasoning(&generation.text).trim().to_string())
    }

    fn phase_done(&self, metrics: &mut MetricsCollector, turn: u32, phase: Phase, elapsed: Duration) {
        metrics.record_phase(phase, elapsed);
        debug!(turn, phase = %phase, elapsed_ms = elapsed.as_millis() as u64, "Phase completed");
        self.publish(DomainEvent::PhaseCompleted {
            turn,
            phase,
            duration_ms: elapsed.as_millis() as u64,
            timestamp: Utc::now(),
        });
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}
