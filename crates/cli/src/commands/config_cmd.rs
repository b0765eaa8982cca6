//! `leap config` — print the effective configuration.

use leap_config::AppConfig;

use super::{CliResult, load_config};
use crate::GlobalArgs;

pub fn run(global: &GlobalArgs, default: bool) -> CliResult {
    if default {
        println!("{}", AppConfig::default_toml());
        return Ok(());
    }

    let config = load_config(global)?;
    let path = global
        .config
        .clone()
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));
    println!("# {}", path.display());
    println!("{}", toml::to_string_pretty(&config.redacted())?);
    Ok(())
}
