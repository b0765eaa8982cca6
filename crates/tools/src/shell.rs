//! Shell tools — execute system commands and describe the environment.
//!
//! Commands run through `sh -c` (`cmd /C` on Windows) in the current
//! working directory, bounded by a timeout. A small blocklist rejects the
//! obviously destructive one-liners.

use async_trait::async_trait;
use leap_core::error::ToolError;
use leap_core::tool::{Tool, ToolOutput, ToolParam};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

const MAX_STDOUT_CHARS: usize = 5000;
const MAX_STDERR_CHARS: usize = 1000;

/// Substrings that block a command outright.
const BLOCKED_PATTERNS: &[&str] = &["rm -rf /", "mkfs", "dd if=", ":(){:|:&};:"];

/// Execute shell commands with a timeout.
pub struct ShellTool {
    timeout: Duration,
}

impl ShellTool {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    fn blocked_pattern(command: &str) -> Option<&'static str> {
        BLOCKED_PATTERNS.iter().copied().find(|p| command.contains(p))
    }
}

impl Default for ShellTool {
    fn default() -> Self {
        Self::new(30)
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "run_shell_command"
    }

    fn description(&self) -> &str {
        "Execute shell command"
    }

    fn parameters(&self) -> &[ToolParam] {
        const PARAMS: &[ToolParam] = &[ToolParam::required("command")];
        PARAMS
    }

    fn output_fields(&self) -> &[&str] {
        &["stdout", "stderr", "exit_code", "success"]
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let command = arguments["command"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'command' argument".into()))?;

        if let Some(pattern) = Self::blocked_pattern(command) {
            warn!(command = %command, pattern, "Blocked shell command");
            return Ok(ToolOutput::failed(format!(
                "Command blocked for safety: contains '{pattern}'"
            )));
        }

        debug!(command = %command, "Executing shell command");

        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };
        cmd.kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result,
            Err(_) => {
                warn!(command = %command, timeout_secs = self.timeout.as_secs(), "Command timed out");
                return Err(ToolError::Timeout {
                    tool_name: "run_shell_command".into(),
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        match output {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                let code = output.status.code().unwrap_or(-1);
                if !output.status.success() {
                    debug!(command = %command, exit_code = code, "Command failed");
                }

                Ok(ToolOutput::data(serde_json::json!({
                    "command": command,
                    "stdout": truncate_chars(&stdout, MAX_STDOUT_CHARS),
                    "stderr": truncate_chars(&stderr, MAX_STDERR_CHARS),
                    "exit_code": code,
                    "success": output.status.success(),
                })))
            }
            Err(e) => Err(ToolError::ExecutionFailed {
                tool_name: "run_shell_command".into(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Report basic facts about the host environment.
pub struct ShellEnvTool;

#[async_trait]
impl Tool for ShellEnvTool {
    fn name(&self) -> &str {
        "get_shell_env"
    }

    fn description(&self) -> &str {
        "Get system environment info"
    }

    fn output_fields(&self) -> &[&str] {
        &["os", "arch", "user", "cwd"]
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let env_or_unknown = |key: &str| std::env::var(key).unwrap_or_else(|_| "unknown".into());
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".into());
        let cwd = std::env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| "unknown".into());
        let home = leap_config::dirs_home().display().to_string();

        Ok(ToolOutput::data(serde_json::json!({
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "user": user,
            "home": home,
            "cwd": cwd,
            "shell": env_or_unknown("SHELL"),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocklist_check() {
        assert_eq!(ShellTool::blocked_pattern("sudo rm -rf / --no-preserve-root"), Some("rm -rf /"));
        assert_eq!(ShellTool::blocked_pattern("mkfs.ext4 /dev/sda1"), Some("mkfs"));
        assert_eq!(ShellTool::blocked_pattern("dd if=/dev/zero of=/dev/sda"), Some("dd if="));
        assert!(ShellTool::blocked_pattern("ls -la").is_none());
        assert!(ShellTool::blocked_pattern("rm -rf ./build").is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn execute_echo() {
        let result = ShellTool::default()
            .execute(serde_json::json!({"command": "echo hello"}))
            .await
            .unwrap()
            .into_value();
        assert_eq!(result["success"], true);
        assert_eq!(result["exit_code"], 0);
        assert!(result["stdout"].as_str().unwrap().contains("hello"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_reported_not_failed() {
        let result = ShellTool::default()
            .execute(serde_json::json!({"command": "echo oops >&2; exit 3"}))
            .await
            .unwrap()
            .into_value();
        assert_eq!(result["success"], false);
        assert_eq!(result["exit_code"], 3);
        assert!(result["stderr"].as_str().unwrap().contains("oops"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_is_enforced() {
        let result = ShellTool::new(1)
            .execute(serde_json::json!({"command": "sleep 5"}))
            .await;
        assert!(matches!(result, Err(ToolError::Timeout { timeout_secs: 1, .. })));
    }

    #[tokio::test]
    async fn blocked_command() {
        let result = ShellTool::default()
            .execute(serde_json::json!({"command": "rm -rf /"}))
            .await
            .unwrap();
        assert!(result.is_failure());
    }

    #[tokio::test]
    async fn shell_env_fields() {
        let result = ShellEnvTool.execute(serde_json::json!({})).await.unwrap().into_value();
        assert_eq!(result["os"], std::env::consts::OS);
        assert!(result["cwd"].is_string());
        assert!(result.get("shell").is_some());
    }
}
