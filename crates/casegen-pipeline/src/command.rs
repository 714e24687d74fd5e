//! External command execution with mandatory timeouts.
//!
//! Every subprocess is built as an argument vector (never through a shell),
//! killed when its future is dropped, and bounded by a timeout. A binary that
//! cannot be spawned or that times out maps to [`Error::ToolUnavailable`]; a
//! non-zero exit maps to [`Error::ToolExecution`].

use std::io::ErrorKind;
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::debug;

use casegen_core::{defaults, Error, Result};

/// Build a command with the settings shared by every tool invocation.
pub fn tool_command(bin: &str) -> Command {
    let mut cmd = Command::new(bin);
    cmd.stdin(Stdio::null()).kill_on_drop(true);
    cmd
}

/// Run a command with a timeout, returning the raw output regardless of
/// exit status.
pub async fn run_cmd_output(cmd: &mut Command, tool: &str, timeout_secs: u64) -> Result<Output> {
    tokio::time::timeout(Duration::from_secs(timeout_secs), cmd.output())
        .await
        .map_err(|_| {
            Error::ToolUnavailable(format!("{} timed out after {}s", tool, timeout_secs))
        })?
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                Error::ToolUnavailable(format!("{}: {}", tool, e))
            }
            _ => Error::ToolExecution(format!("Failed to execute {}: {}", tool, e)),
        })
}

/// Run a command with a timeout, returning stdout as a string.
pub async fn run_cmd_with_timeout(cmd: &mut Command, tool: &str, timeout_secs: u64) -> Result<String> {
    let output = run_cmd_output(cmd, tool, timeout_secs).await?;
    check_status(&output, tool)?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run a command that writes to files rather than stdout.
pub async fn run_cmd_status(cmd: &mut Command, tool: &str, timeout_secs: u64) -> Result<()> {
    let output = run_cmd_output(cmd, tool, timeout_secs).await?;
    check_status(&output, tool)
}

fn check_status(output: &Output, tool: &str) -> Result<()> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: String = stderr
            .trim()
            .lines()
            .rev()
            .take(3)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect::<Vec<_>>()
            .join(" | ");
        return Err(Error::ToolExecution(format!(
            "{} failed ({}): {}",
            tool, output.status, tail
        )));
    }
    Ok(())
}

/// Presence probe for an external binary, evaluated at most once.
///
/// The probe runs `bin <args>` and reports whether it exited successfully
/// within [`defaults::PROBE_TIMEOUT_SECS`].
#[derive(Debug)]
pub struct ToolProbe {
    bin: String,
    args: Vec<String>,
    result: OnceCell<bool>,
}

impl ToolProbe {
    pub fn new(bin: impl Into<String>, args: &[&str]) -> Self {
        Self {
            bin: bin.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            result: OnceCell::new(),
        }
    }

    pub fn bin(&self) -> &str {
        &self.bin
    }

    /// Whether the tool is present. Cached after the first call.
    pub async fn is_available(&self) -> bool {
        *self
            .result
            .get_or_init(|| async {
                let mut cmd = tool_command(&self.bin);
                cmd.args(&self.args)
                    .stdout(Stdio::null())
                    .stderr(Stdio::null());
                let available =
                    match run_cmd_status(&mut cmd, &self.bin, defaults::PROBE_TIMEOUT_SECS).await {
                        Ok(()) => true,
                        Err(e) => {
                            debug!(tool = %self.bin, error = %e, "Tool probe failed");
                            false
                        }
                    };
                debug!(tool = %self.bin, available, "Tool probe");
                available
            })
            .await
    }
}
