//! Built-in tool implementations for LEAP.
//!
//! Tools give the orchestrator the ability to interact with the world:
//! read and edit files, search a source tree, run shell commands, fetch
//! web pages, do math. The planning model only sees each tool's name and
//! one-line description; everything else stays here.

pub mod calculator;
pub mod code;
pub mod file_read;
pub mod file_write;
pub mod fs_search;
pub mod shell;
pub mod utility;
pub mod web;

use leap_config::ToolsConfig;
use leap_core::tool::{Tool, ToolRegistry};
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

/// Directories never descended into by the search tools.
const SKIP_DIRS: &[&str] = &[".git", "target", "node_modules", "__pycache__"];

/// Expand a leading `~` to the user's home directory.
pub(crate) fn expand_path(path: &str) -> PathBuf {
    if path == "~" {
        return leap_config::dirs_home();
    }
    match path.strip_prefix("~/") {
        Some(rest) => leap_config::dirs_home().join(rest),
        None => PathBuf::from(path),
    }
}

/// Walk a directory tree, skipping VCS and build directories and unreadable entries.
pub(crate) fn walk_tree(root: &Path) -> impl Iterator<Item = walkdir::DirEntry> {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            !(e.depth() > 0
                && e.file_type().is_dir()
                && e.file_name().to_str().is_some_and(|n| SKIP_DIRS.contains(&n)))
        })
        .filter_map(|e| e.ok())
}

fn http_client(timeout_secs: u64) -> leap_core::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent("Mozilla/5.0 (compatible; leap-agent)")
        .build()
        .map_err(|e| leap_core::Error::config(format!("failed to build HTTP client: {e}")))
}

/// Every built-in tool, in catalogue order.
pub fn builtin_tools(config: &ToolsConfig) -> leap_core::Result<Vec<Box<dyn Tool>>> {
    let client = http_client(config.web_timeout_secs)?;
    Ok(vec![
        Box::new(file_read::ReadFileTool),
        Box::new(file_write::WriteFileTool),
        Box::new(file_write::ReplaceInFileTool),
        Box::new(file_write::InsertInFileTool),
        Box::new(fs_search::ListDirectoryTool),
        Box::new(fs_search::SearchFilesTool),
        Box::new(file_read::FileInfoTool),
        Box::new(shell::ShellTool::new(config.shell_timeout_secs)),
        Box::new(shell::ShellEnvTool),
        Box::new(web::WebSearchTool::new(client.clone())),
        Box::new(web::FetchUrlTool::new(client)),
        Box::new(code::GrepCodeTool),
        Box::new(code::FindDefinitionTool),
        Box::new(calculator::CalculatorTool),
        Box::new(utility::CurrentTimeTool),
        Box::new(utility::ParseJsonTool),
    ])
}

/// Create the tool registry described by the `[tools]` config section.
///
/// An empty `enabled` list registers every built-in tool. Naming a tool
/// that does not exist is a configuration error.
pub fn default_registry(config: &ToolsConfig) -> leap_core::Result<ToolRegistry> {
    let tools = builtin_tools(config)?;

    if let Some(unknown) = config
        .enabled
        .iter()
        .find(|name| !tools.iter().any(|t| t.name() == name.as_str()))
    {
        return Err(leap_core::Error::config(format!(
            "unknown tool '{unknown}' in tools.enabled"
        )));
    }

    let mut registry = ToolRegistry::new();
    for tool in tools {
        if config.enabled.is_empty() || config.enabled.iter().any(|n| n == tool.name()) {
            registry.register(tool)?;
        }
    }
    tracing::debug!(tools = registry.len(), "Tool registry built");
    Ok(registry)
}
