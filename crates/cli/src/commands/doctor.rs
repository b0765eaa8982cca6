//! `leap doctor` — diagnose backend and model availability.

use leap_config::AppConfig;

use super::{CliResult, load_config};
use crate::GlobalArgs;

pub async fn run(global: &GlobalArgs) -> CliResult {
    println!("🩺 LEAP Doctor — System Diagnostics");
    println!("===================================\n");

    let mut issues = 0;

    let config_path = global
        .config
        .clone()
        .or_else(|| std::env::var("LEAP_CONFIG").ok().map(Into::into))
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));
    if config_path.exists() {
        println!("  ✅ Config file: {}", config_path.display());
    } else {
        println!("  ⚠️  No config file at {}, using defaults", config_path.display());
    }

    let config = match load_config(global) {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            return Err(e.into());
        }
    };

    match leap_tools::default_registry(&config.tools) {
        Ok(registry) => println!("  ✅ {} tool(s) registered", registry.len()),
        Err(e) => {
            println!("  ❌ Tool registry: {e}");
            issues += 1;
        }
    }

    let provider = leap_providers::build_from_config(&config.backend)?;
    let url = &config.backend.api_url;
    match provider.health_check().await {
        Ok(true) => println!("  ✅ Backend reachable ({} at {url})", config.backend.kind),
        Ok(false) | Err(_) => {
            println!("  ❌ Backend not reachable at {url}");
            issues += 1;
        }
    }

    match provider.list_models().await {
        Ok(available) if !available.is_empty() => {
            for (role, model) in [("main", &config.models.main), ("sub", &config.models.sub)] {
                if model_present(&available, model) {
                    println!("  ✅ {role} model {model} available");
                } else {
                    println!("  ❌ {role} model {model} not found (try `ollama pull {model}`)");
                    issues += 1;
                }
            }
        }
        Ok(_) => println!("  ⚠️  Backend did not list any models"),
        Err(e) => {
            println!("  ⚠️  Could not list models: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}

/// Whether `wanted` is among `available`. A name without a tag matches `:latest`.
fn model_present(available: &[String], wanted: &str) -> bool {
    available.iter().any(|name| {
        name == wanted || (!wanted.contains(':') && name.strip_suffix(":latest") == Some(wanted))
    })
}
