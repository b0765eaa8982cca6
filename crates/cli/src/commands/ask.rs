//! `leap ask` — answer one query and exit.

use leap_core::Error;

use super::{CliResult, Session, load_config};
use crate::GlobalArgs;

#[derive(Debug, Clone, Copy, Default)]
pub struct AskOptions {
    pub metrics: bool,
    pub json: bool,
    pub stream: bool,
}

pub async fn run(global: &GlobalArgs, query: &str, options: AskOptions) -> CliResult {
    let config = load_config(global)?;
    let api_url = config.backend.api_url.clone();
    let session = Session::start(config, options.stream).await?;

    let outcome = match session.orchestrator.run_query(query, session.max_turns()).await {
        Ok(outcome) => outcome,
        Err(Error::Generation(e)) => {
            return Err(format!("generation backend at {api_url} failed: {e}").into());
        }
        Err(e) => return Err(e.into()),
    };

    if options.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    if options.stream {
        println!();
    } else {
        println!("{}", outcome.answer);
    }

    if options.metrics {
        eprintln!();
        eprintln!("{}", outcome.metrics);
    }
    Ok(())
}
