//! `leap tools` — the catalogue exactly as the planner sees it.

use leap_agent::Catalogue;

use super::{CliResult, load_config};
use crate::GlobalArgs;

pub fn run(global: &GlobalArgs) -> CliResult {
    let config = load_config(global)?;
    let registry = leap_tools::default_registry(&config.tools)?;
    let catalogue = Catalogue::render(&registry);

    println!("{catalogue}");
    println!();
    println!(
        "  {} tool(s), ~{} tokens per planning prompt",
        registry.len(),
        catalogue.estimated_tokens()
    );
    Ok(())
}
