//! Per-run metrics accumulator.
//!
//! One collector belongs to exactly one orchestrator run. It is mutated in
//! place while the run progresses and frozen into a [`MetricsReport`] at the end.

use crate::model::{GenerationTotals, MetricsReport, PhaseTimings, reduction_pct};
use chrono::{DateTime, Utc};
use leap_core::Phase;
use std::time::{Duration, Instant};
use uuid::Uuid;

pub struct MetricsCollector {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    clock: Instant,
    timings: PhaseTimings,
    last_tool: Option<String>,
    tool_invocations: u32,
    planning_calls: u32,
    raw_tokens: usize,
    filtered_tokens: usize,
    catalogue_tokens: usize,
    generation: GenerationTotals,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            clock: Instant::now(),
            timings: PhaseTimings::default(),
            last_tool: None,
            tool_invocations: 0,
            planning_calls: 0,
            raw_tokens: 0,
            filtered_tokens: 0,
            catalogue_tokens: 0,
            generation: GenerationTotals::default(),
        }
    }

    pub fn run_id(&self) -> String {
        self.run_id.to_string()
    }

    pub fn record_phase(&mut self, phase: Phase, elapsed: Duration) {
        if phase == Phase::Planning {
            self.planning_calls += 1;
        }
        self.timings.add(phase, elapsed);
    }

    /// Record one tool invocation with its raw and filtered size estimates.
    pub fn record_tool(&mut self, name: &str, raw_tokens: usize, filtered_tokens: usize) {
        self.last_tool = Some(name.to_string());
        self.tool_invocations += 1;
        self.raw_tokens += raw_tokens;
        self.filtered_tokens += filtered_tokens;
        tracing::debug!(
            tool = name,
            raw_tokens,
            filtered_tokens,
            "Recorded tool output size"
        );
    }

    pub fn set_catalogue_tokens(&mut self, tokens: usize) {
        self.catalogue_tokens = tokens;
    }

    pub fn set_generation(&mut self, totals: GenerationTotals) {
        self.generation = totals;
    }

    pub fn timings(&self) -> PhaseTimings {
        self.timings
    }

    pub fn tool_invocations(&self) -> u32 {
        self.tool_invocations
    }

    pub fn planning_calls(&self) -> u32 {
        self.planning_calls
    }

    pub fn token_reduction_pct(&self) -> f64 {
        reduction_pct(self.raw_tokens, self.filtered_tokens)
    }

    /// Freeze into a report. `total_secs` is wall-clock time since `new()`.
    pub fn report(&self) -> MetricsReport {
        MetricsReport {
            run_id: self.run_id(),
            started_at: self.started_at,
            planning_secs: self.timings.planning.as_secs_f64(),
            execution_secs: self.timings.execution.as_secs_f64(),
            state_update_secs: self.timings.state_update.as_secs_f64(),
            response_secs: self.timings.response.as_secs_f64(),
            total_secs: self.clock.elapsed().as_secs_f64(),
            last_tool: self.last_tool.clone(),
            tool_invocations: self.tool_invocations,
            planning_calls: self.planning_calls,
            raw_tokens: self.raw_tokens,
            filtered_tokens: self.filtered_tokens,
            token_reduction_pct: self.token_reduction_pct(),
            catalogue_tokens: self.catalogue_tokens,
            generation_calls: self.generation.calls,
            generated_tokens: self.generation.generated_tokens,
            model_swaps: self.generation.model_swaps,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_collector_reports_zeroes() {
        let report = MetricsCollector::new().report();
        assert_eq!(report.tool_invocations, 0);
        assert_eq!(report.planning_calls, 0);
        assert!(report.last_tool.is_none());
        assert_eq!(report.token_reduction_pct, 0.0);
    }

    #[test]
    fn tool_sizes_are_cumulative() {
        let mut m = MetricsCollector::new();
        m.record_tool("read_file", 1000, 100);
        m.record_tool("calculate", 20, 20);
        let report = m.report();
        assert_eq!(report.last_tool.as_deref(), Some("calculate"));
        assert_eq!(report.tool_invocations, 2);
        assert_eq!(report.raw_tokens, 1020);
        assert_eq!(report.filtered_tokens, 120);
        assert!(report.token_reduction_pct > 88.0);
    }

    #[test]
    fn planning_phases_count_calls() {
        let mut m = MetricsCollector::new();
        m.record_phase(Phase::Planning, Duration::from_millis(10));
        m.record_phase(Phase::Execution, Duration::from_millis(10));
        m.record_phase(Phase::Planning, Duration::from_millis(10));
        assert_eq!(m.planning_calls(), 2);
        assert_eq!(m.timings().planning, Duration::from_millis(20));
    }

    #[test]
    fn report_serializes_flat() {
        let mut m = MetricsCollector::new();
        m.set_catalogue_tokens(42);
        m.set_generation(GenerationTotals { calls: 3, generated_tokens: 90, model_swaps: 1 });
        let json = serde_json::to_value(m.report()).unwrap();
        assert_eq!(json["catalogue_tokens"], 42);
        assert_eq!(json["generation_calls"], 3);
        assert_eq!(json["model_swaps"], 1);
        assert!(json["run_id"].is_string());
    }

    #[test]
    fn report_display_mentions_reduction() {
        let mut m = MetricsCollector::new();
        m.record_tool("list_directory", 400, 100);
        let text = m.report().to_string();
        assert!(text.contains("75% reduction"));
        assert!(text.contains("list_directory"));
    }
}
