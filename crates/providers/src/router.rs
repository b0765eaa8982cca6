//! Backend selection — builds the configured generation backend.

use std::sync::Arc;
use leap_config::{BackendConfig, BackendKind};
use leap_core::error::ProviderError;
use leap_core::provider::Provider;
use crate::ollama::OllamaProvider;
use crate::openai_compat::OpenAiCompatProvider;

/// Build the backend described by the `[backend]` config section.
pub fn build_from_config(config: &BackendConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let base_url = if config.api_url.trim().is_empty() {
        default_base_url(config.kind).to_string()
    } else {
        config.api_url.clone()
    };

    let provider: Arc<dyn Provider> = match config.kind {
        BackendKind::Ollama => Arc::new(OllamaProvider::new(base_url, config.timeout_secs)?),
        BackendKind::OpenaiCompat => Arc::new(OpenAiCompatProvider::new(
            "openai_compat",
            base_url,
            config.api_key.clone().unwrap_or_default(),
            config.timeout_secs,
        )?),
    };

    tracing::debug!(backend = %config.kind, "Built generation backend");
    Ok(provider)
}

/// Get the default base URL for a backend kind.
pub fn default_base_url(kind: BackendKind) -> &'static str {
    match kind {
        BackendKind::Ollama => "http://localhost:11434",
        BackendKind::OpenaiCompat => "http://localhost:8080/v1",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_base_urls() {
        assert!(default_base_url(BackendKind::Ollama).contains("11434"));
        assert!(default_base_url(BackendKind::OpenaiCompat).ends_with("/v1"));
    }

    #[test]
    fn build_from_default_config() {
        let provider = build_from_config(&BackendConfig::default()).unwrap();
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn build_openai_compat_with_empty_url() {
        let config = BackendConfig {
            kind: BackendKind::OpenaiCompat,
            api_url: String::new(),
            ..BackendConfig::default()
        };
        let provider = build_from_config(&config).unwrap();
        assert_eq!(provider.name(), "openai_compat");
    }
}
