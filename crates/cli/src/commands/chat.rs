//! `leap chat` — interactive session.

use std::io::Write;
use std::sync::atomic::Ordering;

use leap_config::find_pair;
use leap_telemetry::MetricsReport;
use tokio::io::{self, AsyncBufReadExt, BufReader};

use super::{CliResult, Session, load_config};
use crate::GlobalArgs;

/// A line typed at the prompt.
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Help,
    Quit,
    Metrics,
    Tools,
    Models,
    Verbose,
    Clear,
    Unknown(String),
    Query(String),
    Empty,
}

pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    if !line.starts_with('/') {
        return Input::Query(line.to_string());
    }
    match line.split_whitespace().next().unwrap_or(line) {
        "/help" | "/?" => Input::Help,
        "/quit" | "/exit" | "/q" => Input::Quit,
        "/metrics" => Input::Metrics,
        "/tools" => Input::Tools,
        "/models" => Input::Models,
        "/verbose" => Input::Verbose,
        "/clear" => Input::Clear,
        other => Input::Unknown(other.to_string()),
    }
}

const HELP: &str = "\
  /help      Show this help
  /metrics   Metrics of the last query
  /tools     Tool catalogue
  /models    Current model pair
  /verbose   Toggle progress output
  /clear     Forget the last metrics
  /quit      Exit (also /exit)";

pub async fn run(global: &GlobalArgs) -> CliResult {
    let config = load_config(global)?;
    let session = Session::start(config, false).await?;
    let models = &session.config.models;

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║            LEAP — Interactive Mode           ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Backend:   {} ({})", session.config.backend.kind, session.config.backend.api_url);
    println!("  Main:      {}", models.main);
    println!("  Sub:       {}", models.sub);
    println!("  Tools:     {}", session.orchestrator.registry().len());
    println!("  Max turns: {}", session.max_turns());
    println!();
    println!("  Type a request and press Enter. /help for commands.");
    println!();

    let mut last: Option<MetricsReport> = None;
    let mut lines = BufReader::new(io::stdin()).lines();

    prompt()?;
    while let Some(line) = lines.next_line().await? {
        match parse_input(&line) {
            Input::Empty => {}
            Input::Quit => break,
            Input::Help => println!("{HELP}"),
            Input::Metrics => match &last {
                Some(report) => println!("{report}"),
                None => println!("  No query run yet."),
            },
            Input::Tools => {
                let catalogue = session.orchestrator.catalogue();
                println!("{catalogue}");
                println!("  (~{} tokens)", catalogue.estimated_tokens());
            }
            Input::Models => {
                let models = &session.orchestrator.settings().models;
                let pair = global.pair.as_deref().and_then(find_pair);
                println!("  Main: {}", models.main);
                println!("  Sub:  {}", models.sub);
                if let Some(pair) = pair {
                    println!("  Pair: {} ({})", pair.name, pair.description);
                }
            }
            Input::Verbose => {
                let now = !session.verbose.load(Ordering::Relaxed);
                session.verbose.store(now, Ordering::Relaxed);
                println!("  Verbose {}", if now { "on" } else { "off" });
            }
            Input::Clear => {
                last = None;
                println!("  Cleared.");
            }
            Input::Unknown(command) => println!("  Unknown command {command}. /help for commands."),
            Input::Query(query) => {
                eprint!("  Thinking...");
                let result = session.orchestrator.run_query(&query, session.max_turns()).await;
                eprint!("\r              \r");
                match result {
                    Ok(outcome) => {
                        println!();
                        for line in outcome.answer.lines() {
                            println!("  LEAP > {line}");
                        }
                        println!();
                        if session.config.track_latency {
                            let stats = session.service.stats();
                            println!(
                                "  ({} turn(s), {:.1}s, {:.1} tok/s avg)",
                                outcome.turns,
                                outcome.metrics.total_secs,
                                stats.average_tokens_per_sec()
                            );
                            println!();
                        }
                        last = Some(outcome.metrics);
                    }
                    Err(e) => {
                        eprintln!("  [Error] {e}");
                        println!();
                    }
                }
            }
        }
        prompt()?;
    }

    println!();
    println!("  Goodbye!");
    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}
