//! Per-run metrics for LEAP orchestration.
//!
//! Tracks cumulative wall-clock time per phase (planning, execution, state
//! update, response), tool invocations, and the estimated size of tool
//! output before and after filtering. The token-reduction figure is the
//! headline number: how much smaller the filtered results were than the raw
//! ones the planner would otherwise have read.

pub mod collector;
pub mod model;

pub use collector::MetricsCollector;
pub use model::{GenerationTotals, MetricsReport, PhaseTimings, reduction_pct};
