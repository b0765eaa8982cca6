//! The generation service: the single gateway between the orchestrator
//! and a backend.
//!
//! Only one generation is in flight at a time. The service remembers which
//! model the backend last ran and, in sequential mode, asks the backend to
//! evict it before switching, so a small GPU only ever holds one model.
//! Every call is timed and its generated-token count recorded.

use chrono::Utc;
use leap_core::error::ProviderError;
use leap_core::event::{DomainEvent, EventBus};
use leap_core::provider::{GenerationRequest, Provider};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Latency and throughput of one generation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceStats {
    pub model: String,
    pub duration: Duration,
    pub eval_count: u32,
    pub tokens_per_sec: f64,
}

impl InferenceStats {
    fn new(model: &str, duration: Duration, eval_count: u32) -> Self {
        let secs = duration.as_secs_f64();
        let tokens_per_sec = if secs > 0.0 { eval_count as f64 / secs } else { 0.0 };
        Self {
            model: model.to_string(),
            duration,
            eval_count,
            tokens_per_sec,
        }
    }
}

/// A finished generation.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub stats: InferenceStats,
}

/// Cumulative counters since the service was created.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServiceStats {
    pub calls: u64,
    pub generated_tokens: u64,
    pub model_swaps: u64,
    pub inference_time: Duration,
    pub last: Option<InferenceStats>,
}

impl ServiceStats {
    pub fn average_tokens_per_sec(&self) -> f64 {
        let secs = self.inference_time.as_secs_f64();
        if secs > 0.0 { self.generated_tokens as f64 / secs } else { 0.0 }
    }
}

pub struct GenerationService {
    provider: Arc<dyn Provider>,
    sequential: bool,
    /// Held for the whole duration of a call; also records the resident model.
    resident: tokio::sync::Mutex<Option<String>>,
    stats: Mutex<ServiceStats>,
    events: Option<Arc<EventBus>>,
}

impl GenerationService {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            sequential: true,
            resident: tokio::sync::Mutex::new(None),
            stats: Mutex::new(ServiceStats::default()),
            events: None,
        }
    }

    /// Whether to unload the previous model when the requested model changes.
    pub fn with_sequential(mut self, sequential: bool) -> Self {
        self.sequential = sequential;
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    /// Snapshot of the cumulative counters.
    pub fn stats(&self) -> ServiceStats {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// The model the backend most recently ran, if any.
    pub async fn resident_model(&self) -> Option<String> {
        self.resident.lock().await.clone()
    }

    /// Run a blocking generation.
    pub async fn generate(&self, request: GenerationRequest) -> Result<Generation, ProviderError> {
        let mut resident = self.resident.lock().await;
        self.switch_model(&mut resident, &request.model).await;

        let model = request.model.clone();
        debug!(model = %model, prompt_chars = request.prompt.len(), "Generating");
        let start = Instant::now();
        let response = self.provider.complete(request).await?;
        let elapsed = start.elapsed();

        // Backends that don't report a count get a chars/4 estimate
        let eval_count = response
            .eval_count
            .unwrap_or_else(|| (response.text.len() / 4) as u32);
        let stats = self.record(&model, elapsed, eval_count);

        Ok(Generation {
            text: response.text,
            stats,
        })
    }

    /// Run a streaming generation, handing each fragment to `sink` in order.
    ///
    /// A stream that ends before the backend marks it done is an error:
    /// the partial text must not be mistaken for a complete answer.
    pub async fn generate_stream(
        &self,
        mut request: GenerationRequest,
        sink: &mut (dyn FnMut(&str) + Send),
    ) -> Result<Generation, ProviderError> {
        let mut resident = self.resident.lock().await;
        self.switch_model(&mut resident, &request.model).await;

        request.stream = true;
        let model = request.model.clone();
        let start = Instant::now();
        let mut rx = self.provider.stream(request).await?;

        let mut text = String::new();
        let mut chunks = 0u32;
        let eval_count = loop {
            match rx.recv().await {
                Some(Ok(chunk)) => {
                    if let Some(content) = chunk.content.as_deref() {
                        chunks += 1;
                        text.push_str(content);
                        sink(content);
                    }
                    if chunk.done {
                        break chunk.eval_count.unwrap_or(chunks);
                    }
                }
                Some(Err(e)) => return Err(e),
                None => {
                    warn!(model = %model, received_chars = text.len(), "Stream ended before completion");
                    return Err(ProviderError::StreamInterrupted(
                        "stream closed before the backend finished".into(),
                    ));
                }
            }
        };

        let stats = self.record(&model, start.elapsed(), eval_count);
        Ok(Generation { text, stats })
    }

    /// Issue a one-token generation per model so the backend loads it.
    ///
    /// Failures are returned, not raised: a cold model is slow, not broken.
    pub async fn warmup(&self, models: &[String]) -> Vec<(String, Result<Duration, ProviderError>)> {
        let mut results = Vec::with_capacity(models.len());
        for model in models {
            let request = GenerationRequest::new(model.clone(), "Hello")
                .with_temperature(0.0)
                .with_max_tokens(1);
            let start = Instant::now();
            let outcome = self.generate(request).await.map(|_| start.elapsed());
            match &outcome {
                Ok(elapsed) => info!(model = %model, elapsed_ms = elapsed.as_millis() as u64, "Model warmed up"),
                Err(e) => warn!(model = %model, error = %e, "Warmup failed"),
            }
            results.push((model.clone(), outcome));
        }
        results
    }

    async fn switch_model(&self, resident: &mut Option<String>, model: &str) {
        if resident.as_deref() == Some(model) {
            return;
        }

        let previous = resident.take();
        if let Some(prev) = &previous {
            self.stats
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .model_swaps += 1;

            if self.sequential
                && let Err(e) = self.provider.unload(prev).await
            {
                warn!(model = %prev, error = %e, "Failed to unload model, continuing");
            }
            debug!(from = %prev, to = %model, "Swapping model");
        }

        if let Some(bus) = &self.events {
            bus.publish(DomainEvent::ModelSwapped {
                from: previous,
                to: model.to_string(),
                timestamp: Utc::now(),
            });
        }
        *resident = Some(model.to_string());
    }

    fn record(&self, model: &str, elapsed: Duration, eval_count: u32) -> InferenceStats {
        let call = InferenceStats::new(model, elapsed, eval_count);
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        stats.calls += 1;
        stats.generated_tokens += eval_count as u64;
        stats.inference_time += elapsed;
        stats.last = Some(call.clone());
        debug!(
            model,
            elapsed_ms = elapsed.as_millis() as u64,
            eval_count,
            tokens_per_sec = call.tokens_per_sec,
            "Generation finished"
        );
        call
    }
}
