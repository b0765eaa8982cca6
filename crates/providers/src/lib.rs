//! Generation backends for LEAP.
//!
//! All backends implement the `leap_core::Provider` trait. The router builds
//! the configured one, and [`GenerationService`] wraps it with single-flight
//! access, model-swap bookkeeping and per-call latency tracking.

mod http;
pub mod ollama;
pub mod openai_compat;
pub mod router;
pub mod service;

pub use ollama::OllamaProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::build_from_config;
pub use service::{Generation, GenerationService, InferenceStats, ServiceStats};
