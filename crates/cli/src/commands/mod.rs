//! Command implementations and the session setup they share.

pub mod ask;
pub mod chat;
pub mod config_cmd;
pub mod doctor;
pub mod pairs;
pub mod tools;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use leap_agent::{Orchestrator, OrchestratorSettings};
use leap_config::{AppConfig, ConfigError};
use leap_core::{DomainEvent, EventBus};
use leap_providers::GenerationService;
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;

use crate::GlobalArgs;

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

impl GlobalArgs {
    /// Apply command-line overrides on top of file and environment settings.
    pub fn apply(&self, config: &mut AppConfig) -> Result<(), ConfigError> {
        if let Some(pair) = &self.pair {
            config.apply_pair(pair)?;
        }
        if let Some(model) = &self.main_model {
            config.models.main = model.clone();
        }
        if let Some(model) = &self.sub_model {
            config.models.sub = model.clone();
        }
        if let Some(max_turns) = self.max_turns {
            config.orchestrator.max_turns = max_turns;
        }
        if self.verbose {
            config.verbose = true;
        }
        if self.no_warmup {
            config.models.warmup = false;
        }
        Ok(())
    }
}

/// File, then `LEAP_*` variables, then flags. Validated last.
pub fn load_config(global: &GlobalArgs) -> Result<AppConfig, ConfigError> {
    let mut config = match &global.config {
        Some(path) => {
            let mut config = AppConfig::load_from(path)?;
            config.apply_env_overrides(|key| std::env::var(key).ok());
            config
        }
        None => AppConfig::load()?,
    };
    global.apply(&mut config)?;
    config.validate()?;
    Ok(config)
}

/// Everything a query needs: the orchestrator, its generation service,
/// and the switch for the progress printer.
pub struct Session {
    pub config: AppConfig,
    pub orchestrator: Orchestrator,
    pub service: Arc<GenerationService>,
    pub verbose: Arc<AtomicBool>,
}

impl Session {
    pub async fn start(config: AppConfig, stream: bool) -> CliResult<Self> {
        let provider = leap_providers::build_from_config(&config.backend)?;
        let events = Arc::new(EventBus::default());
        let service = Arc::new(
            GenerationService::new(provider)
                .with_sequential(config.backend.sequential)
                .with_event_bus(events.clone()),
        );
        let registry = Arc::new(leap_tools::default_registry(&config.tools)?);

        let mut orchestrator = Orchestrator::new(
            service.clone(),
            registry,
            OrchestratorSettings::from(&config),
        )
        .with_event_bus(events.clone());
        if stream {
            orchestrator = orchestrator.with_answer_sink(Arc::new(|fragment: &str| {
                use std::io::Write;
                print!("{fragment}");
                let _ = std::io::stdout().flush();
            }));
        }

        let verbose = Arc::new(AtomicBool::new(config.verbose));
        spawn_progress_printer(events.subscribe(), verbose.clone());

        if config.models.warmup {
            warmup(&service, &config).await;
        }

        Ok(Self {
            config,
            orchestrator,
            service,
            verbose,
        })
    }

    pub fn max_turns(&self) -> u32 {
        self.config.orchestrator.max_turns
    }
}

async fn warmup(service: &GenerationService, config: &AppConfig) {
    let mut models = vec![config.models.main.clone()];
    if config.models.sub != config.models.main {
        models.push(config.models.sub.clone());
    }
    eprintln!("  Warming up {}...", models.join(", "));
    for (model, outcome) in service.warmup(&models).await {
        match outcome {
            Ok(elapsed) => eprintln!("  ✅ {model} ready ({:.1}s)", elapsed.as_secs_f64()),
            Err(e) => eprintln!("  ⚠️  {model} failed to load: {e}"),
        }
    }
}

/// Print run progress to stderr while `verbose` is set.
fn spawn_progress_printer(mut rx: Receiver<Arc<DomainEvent>>, verbose: Arc<AtomicBool>) {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if verbose.load(Ordering::Relaxed)
                        && let Some(line) = describe(&event)
                    {
                        eprintln!("  {line}");
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// One progress line per event.
pub fn describe(event: &DomainEvent) -> Option<String> {
    match event {
        DomainEvent::RunStarted { max_turns, .. } => Some(format!("▶ run started (max {max_turns} turns)")),
        DomainEvent::PhaseCompleted {
            turn,
            phase,
            duration_ms,
            ..
        } => Some(format!("[turn {turn}] {phase} ({duration_ms} ms)")),
        DomainEvent::ToolExecuted {
            turn,
            tool_name,
            success,
            raw_tokens,
            filtered_tokens,
            ..
        } => {
            let mark = if *success { "✓" } else { "✗" };
            Some(format!(
                "[turn {turn}] {mark} {tool_name}: ~{raw_tokens} -> ~{filtered_tokens} tokens"
            ))
        }
        DomainEvent::ModelSwapped { from: Some(from), to, .. } => Some(format!("⇄ {from} -> {to}")),
        DomainEvent::ModelSwapped { from: None, .. } => None,
        DomainEvent::RunFinished { turns, terminal, .. } => {
            Some(format!("■ {terminal} after {turns} turn(s)"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use leap_core::Phase;

    #[test]
    fn flags_override_config() {
        let global = GlobalArgs {
            pair: Some("8gb".into()),
            sub_model: Some("gemma3:1b".into()),
            max_turns: Some(4),
            no_warmup: true,
            ..GlobalArgs::default()
        };
        let mut config = AppConfig::default();
        global.apply(&mut config).unwrap();
        assert_eq!(config.models.main, "gemma3:4b");
        assert_eq!(config.models.sub, "gemma3:1b");
        assert_eq!(config.orchestrator.max_turns, 4);
        assert!(!config.models.warmup);
    }

    #[test]
    fn unknown_pair_is_rejected() {
        let global = GlobalArgs {
            pair: Some("32gb".into()),
            ..GlobalArgs::default()
        };
        assert!(global.apply(&mut AppConfig::default()).is_err());
    }

    #[test]
    fn load_config_validates_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[orchestrator]\nmax_turns = 3\n").unwrap();

        let global = GlobalArgs {
            config: Some(path.clone()),
            ..GlobalArgs::default()
        };
        assert_eq!(load_config(&global).unwrap().orchestrator.max_turns, 3);

        let global = GlobalArgs {
            config: Some(path),
            max_turns: Some(0),
            ..GlobalArgs::default()
        };
        assert!(load_config(&global).is_err());
    }

    #[test]
    fn progress_lines() {
        let line = describe(&DomainEvent::ToolExecuted {
            turn: 2,
            tool_name: "read_file".into(),
            success: false,
            raw_tokens: 400,
            filtered_tokens: 20,
            timestamp: Utc::now(),
        })
        .unwrap();
        assert_eq!(line, "[turn 2] ✗ read_file: ~400 -> ~20 tokens");

        let line = describe(&DomainEvent::PhaseCompleted {
            turn: 1,
            phase: Phase::StateUpdate,
            duration_ms: 850,
            timestamp: Utc::now(),
        })
        .unwrap();
        assert_eq!(line, "[turn 1] state_update (850 ms)");

        assert!(describe(&DomainEvent::ModelSwapped { from: None, to: "m".into(), timestamp: Utc::now() }).is_none());
    }
}
