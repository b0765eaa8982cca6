//! LEAP CLI — the main entry point.
//!
//! Commands:
//! - `ask`     Answer one query and exit
//! - `chat`    Interactive session
//! - `tools`   Show the tool catalogue the planner sees
//! - `pairs`   List model-pair presets
//! - `doctor`  Check the backend and models
//! - `config`  Print the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "leap",
    about = "LEAP — sequential two-model tool orchestration for small local models",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalArgs,
}

/// Flags shared by every command. They override the config file and `LEAP_*` variables.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Planning model
    #[arg(long, global = true)]
    pub main_model: Option<String>,

    /// Filtering model
    #[arg(long, global = true)]
    pub sub_model: Option<String>,

    /// Model-pair preset (see `leap pairs`)
    #[arg(long, global = true)]
    pub pair: Option<String>,

    /// Skip loading the models before the first query
    #[arg(long, global = true)]
    pub no_warmup: bool,

    /// Maximum planning turns per query
    #[arg(long, global = true)]
    pub max_turns: Option<u32>,

    /// Show per-phase progress and debug logs
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (defaults to $LEAP_CONFIG or ~/.leap/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a single query
    Ask {
        /// The query
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Print run metrics after the answer
        #[arg(long)]
        metrics: bool,

        /// Print the whole outcome (answer, summary, metrics) as JSON
        #[arg(long, conflicts_with = "stream")]
        json: bool,

        /// Print the answer as it is generated
        #[arg(long)]
        stream: bool,
    },

    /// Interactive session
    Chat,

    /// Show the tool catalogue and its estimated size
    Tools,

    /// List model-pair presets
    Pairs,

    /// Check backend health and model availability
    Doctor,

    /// Print the effective configuration
    Config {
        /// Print the built-in defaults instead
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.global.verbose {
        "debug"
    } else if cli.global.quiet {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Ask {
            query,
            metrics,
            json,
            stream,
        } => {
            let options = commands::ask::AskOptions { metrics, json, stream };
            commands::ask::run(&cli.global, &query.join(" "), options).await?
        }
        Commands::Chat => commands::chat::run(&cli.global).await?,
        Commands::Tools => commands::tools::run(&cli.global)?,
        Commands::Pairs => commands::pairs::run(&cli.global)?,
        Commands::Doctor => commands::doctor::run(&cli.global).await?,
        Commands::Config { default } => commands::config_cmd::run(&cli.global, default)?,
    }

    Ok(())
}
