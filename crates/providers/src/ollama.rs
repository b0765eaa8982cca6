//! Ollama native API provider.
//!
//! Talks to `/api/generate` rather than the OpenAI shim so that the
//! `num_predict` option, `eval_count` and explicit model unloading
//! (`keep_alive: 0`) are available. Streaming responses are
//! newline-delimited JSON objects, one per fragment.

use async_trait::async_trait;
use futures::StreamExt;
use leap_core::error::ProviderError;
use leap_core::provider::*;
use serde::Deserialize;
use tracing::{debug, trace};

use crate::http::{LineBuffer, build_client, check_status, transport_error};

pub struct OllamaProvider {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    /// Create a provider for the Ollama server at `base_url` (e.g. `http://localhost:11434`).
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, ProviderError> {
        let base_url = base_url.into();
        // Accept the OpenAI-style URL too
        let base_url = base_url
            .trim_end_matches('/')
            .trim_end_matches("/v1")
            .to_string();
        Ok(Self {
            base_url,
            client: build_client(timeout_secs)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request_body(request: &GenerationRequest, stream: bool) -> serde_json::Value {
        let mut options = serde_json::json!({ "temperature": request.temperature });
        if let Some(max_tokens) = request.max_tokens {
            options["num_predict"] = serde_json::json!(max_tokens);
        }
        serde_json::json!({
            "model": request.model,
            "prompt": request.prompt,
            "stream": stream,
            "options": options,
        })
    }

    async fn post_generate(
        &self,
        request: &GenerationRequest,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&Self::request_body(request, stream))
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response, &request.model).await
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, ProviderError> {
        debug!(model = %request.model, prompt_chars = request.prompt.len(), "Sending generate request");

        let response = self.post_generate(&request, false).await?;
        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        if let Some(error) = body.error {
            return Err(ProviderError::ApiError {
                status_code: 200,
                message: error,
            });
        }

        Ok(GenerationResponse {
            text: body.response,
            model: body.model.unwrap_or(request.model),
            eval_count: body.eval_count,
        })
    }

    async fn stream(&self, request: GenerationRequest) -> Result<StreamReceiver, ProviderError> {
        debug!(model = %request.model, "Sending streaming generate request");

        let response = self.post_generate(&request, true).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(64);

        // Read the NDJSON body in the background; the receiver sees
        // fragments in generation order.
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut buffer = LineBuffer::default();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                for line in buffer.push(&bytes) {
                    match parse_stream_line(&line) {
                        Some(Ok(chunk)) => {
                            let done = chunk.done;
                            if tx.send(Ok(chunk)).await.is_err() {
                                return; // receiver dropped
                            }
                            if done {
                                return;
                            }
                        }
                        Some(Err(e)) => {
                            let _ = tx.send(Err(e)).await;
                            return;
                        }
                        None => trace!(line = %line, "Ignoring unparseable stream line"),
                    }
                }
            }

            if let Some(line) = buffer.finish()
                && let Some(Ok(chunk)) = parse_stream_line(&line)
            {
                let _ = tx.send(Ok(chunk)).await;
            }
            // Body ended without a done record: the receiver observes the
            // channel closing and treats the stream as interrupted.
        });

        Ok(rx)
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.client.get(&url).send().await.map_err(transport_error)?;
        let response = check_status(response, "").await?;
        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.client.get(&url).send().await.map_err(transport_error)?;
        Ok(response.status().is_success())
    }

    async fn unload(&self, model: &str) -> Result<(), ProviderError> {
        let url = format!("{}/api/generate", self.base_url);
        debug!(model, "Unloading model");
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "model": model, "keep_alive": 0 }))
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response, model).await?;
        Ok(())
    }
}

/// Parse one NDJSON record. `None` for lines that are not JSON at all.
fn parse_stream_line(line: &str) -> Option<Result<StreamChunk, ProviderError>> {
    let record: GenerateResponse = serde_json::from_str(line).ok()?;
    if let Some(error) = record.error {
        return Some(Err(ProviderError::StreamInterrupted(error)));
    }
    Some(Ok(StreamChunk {
        content: (!record.response.is_empty()).then_some(record.response),
        done: record.done,
        eval_count: record.eval_count,
    }))
}

// --- Ollama API types (internal) ---

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}
