//! `leap pairs` — list model-pair presets.

use leap_config::MODEL_PAIRS;

use super::{CliResult, load_config};
use crate::GlobalArgs;

pub fn run(global: &GlobalArgs) -> CliResult {
    let config = load_config(global)?;

    println!("  Model pairs (use with --pair NAME):");
    println!();
    println!("  {:<11} {:<12} {:<14} Description", "Name", "Main", "Sub");
    for pair in MODEL_PAIRS {
        let current = pair.main == config.models.main && pair.sub == config.models.sub;
        println!(
            "{} {:<11} {:<12} {:<14} {}",
            if current { "*" } else { " " },
            pair.name,
            pair.main,
            pair.sub,
            pair.description
        );
    }
    println!();
    println!("  Current: {} + {}", config.models.main, config.models.sub);
    Ok(())
}
