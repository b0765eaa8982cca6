//! Domain event system — decoupled observation of orchestration runs.
//!
//! The orchestrator publishes an event at each phase boundary. Subscribers
//! (the CLI's verbose view, tests) react without coupling to the loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// The phases of one orchestration turn, plus the two terminal responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Planning,
    Execution,
    StateUpdate,
    DirectResponse,
    FinalAnswer,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Planning => "planning",
            Self::Execution => "execution",
            Self::StateUpdate => "state_update",
            Self::DirectResponse => "direct_response",
            Self::FinalAnswer => "final_answer",
        };
        f.write_str(s)
    }
}

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A query entered the loop
    RunStarted {
        run_id: String,
        query_preview: String,
        max_turns: u32,
        timestamp: DateTime<Utc>,
    },

    /// A phase of a turn finished
    PhaseCompleted {
        turn: u32,
        phase: Phase,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolExecuted {
        turn: u32,
        tool_name: String,
        success: bool,
        raw_tokens: usize,
        filtered_tokens: usize,
        timestamp: DateTime<Utc>,
    },

    /// The generation service switched the resident model
    ModelSwapped {
        from: Option<String>,
        to: String,
        timestamp: DateTime<Utc>,
    },

    /// The run reached a terminal state
    RunFinished {
        run_id: String,
        turns: u32,
        terminal: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
