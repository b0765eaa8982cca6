//! Data model for per-run metrics.

use chrono::{DateTime, Utc};
use leap_core::Phase;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ── Phase timings ─────────────────────────────────────────────────────────

/// Cumulative wall-clock time spent in each phase of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhaseTimings {
    pub planning: Duration,
    pub execution: Duration,
    pub state_update: Duration,
    /// Final answer or direct response.
    pub response: Duration,
}

impl PhaseTimings {
    pub fn add(&mut self, phase: Phase, elapsed: Duration) {
        let slot = match phase {
            Phase::Planning => &mut self.planning,
            Phase::Execution => &mut self.execution,
            Phase::StateUpdate => &mut self.state_update,
            Phase::DirectResponse | Phase::FinalAnswer => &mut self.response,
        };
        *slot += elapsed;
    }

    pub fn total(&self) -> Duration {
        self.planning + self.execution + self.state_update + self.response
    }
}

// ── Generation totals ─────────────────────────────────────────────────────

/// Counters reported by the generation service for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationTotals {
    pub calls: u64,
    pub generated_tokens: u64,
    pub model_swaps: u64,
}

// ── Report ────────────────────────────────────────────────────────────────

/// Flat, read-only record of one run. Consumed by the CLI for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub planning_secs: f64,
    pub execution_secs: f64,
    pub state_update_secs: f64,
    pub response_secs: f64,
    pub total_secs: f64,
    pub last_tool: Option<String>,
    pub tool_invocations: u32,
    pub planning_calls: u32,
    /// Estimated tokens of raw tool output (chars / 4), summed over the run.
    pub raw_tokens: usize,
    /// Estimated tokens after filtering, summed over the run.
    pub filtered_tokens: usize,
    pub token_reduction_pct: f64,
    pub catalogue_tokens: usize,
    pub generation_calls: u64,
    pub generated_tokens: u64,
    pub model_swaps: u64,
}

impl std::fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "LEAP metrics (run {})", self.run_id)?;
        writeln!(f, "  Planning:      {:>7.2}s", self.planning_secs)?;
        writeln!(f, "  Execution:     {:>7.2}s", self.execution_secs)?;
        writeln!(f, "  State update:  {:>7.2}s", self.state_update_secs)?;
        writeln!(f, "  Response:      {:>7.2}s", self.response_secs)?;
        writeln!(f, "  Total:         {:>7.2}s", self.total_secs)?;
        writeln!(
            f,
            "  Tools:         {} call(s), last: {}",
            self.tool_invocations,
            self.last_tool.as_deref().unwrap_or("-")
        )?;
        writeln!(f, "  Planning calls: {}", self.planning_calls)?;
        writeln!(
            f,
            "  Tool output:   ~{} -> ~{} tokens ({:.0}% reduction)",
            self.raw_tokens, self.filtered_tokens, self.token_reduction_pct
        )?;
        writeln!(f, "  Catalogue:     ~{} tokens", self.catalogue_tokens)?;
        write!(
            f,
            "  Generation:    {} call(s), {} token(s), {} model swap(s)",
            self.generation_calls, self.generated_tokens, self.model_swaps
        )
    }
}

/// `(1 - filtered / raw) * 100`, or 0 when nothing was measured.
pub fn reduction_pct(raw: usize, filtered: usize) -> f64 {
    if raw == 0 {
        return 0.0;
    }
    (1.0 - filtered as f64 / raw as f64) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_timings_accumulate() {
        let mut t = PhaseTimings::default();
        t.add(Phase::Planning, Duration::from_millis(300));
        t.add(Phase::Planning, Duration::from_millis(200));
        t.add(Phase::FinalAnswer, Duration::from_millis(100));
        t.add(Phase::DirectResponse, Duration::from_millis(100));
        assert_eq!(t.planning, Duration::from_millis(500));
        assert_eq!(t.response, Duration::from_millis(200));
        assert_eq!(t.total(), Duration::from_millis(700));
    }

    #[test]
    fn reduction_handles_zero_and_growth() {
        assert_eq!(reduction_pct(0, 0), 0.0);
        assert!((reduction_pct(100, 25) - 75.0).abs() < f64::EPSILON);
        // Filtering can make things bigger when the model adds keys
        assert!(reduction_pct(10, 20) < 0.0);
    }
}
