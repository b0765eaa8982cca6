//! # LEAP Core
//!
//! Domain types, traits, and error definitions for the LEAP sequential
//! tool orchestrator. This crate has **no framework dependencies**: it
//! defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here. Implementations live in
//! their respective crates:
//! - `Provider`: a text-generation backend (Ollama, OpenAI-compatible)
//! - `Tool`: a named action with a structured result
//!
//! The orchestrator in `leap-agent` is written only against these traits,
//! so tests drive it with scripted providers and in-memory tools.

pub mod error;
pub mod provider;
pub mod tool;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, ToolError};
pub use provider::{GenerationRequest, GenerationResponse, Provider, StreamChunk, StreamReceiver};
pub use tool::{Tool, ToolOutput, ToolParam, ToolRegistry, ToolRequest, ToolSpec};
pub use event::{DomainEvent, EventBus, Phase};
