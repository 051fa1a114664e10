// src/exec/command.rs

//! Shell command runner for `exec` tasks.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;

/// How often a running command checks for cancellation.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Lines of stderr kept for the failure message.
const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, Clone)]
pub struct ShellCommand {
    pub cmd: String,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl ShellCommand {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            cwd: None,
            env: Vec::new(),
        }
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Success,
    Failed { code: i32, stderr: String },
    Cancelled,
}

/// Build a shell command appropriate for the platform.
fn shell(cmd: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    }
}

/// Run `command` to completion, or until `cancel` fires (the child is then
/// killed).
pub async fn run_shell(command: &ShellCommand, cancel: &CancelToken) -> Result<CommandOutcome> {
    info!(cmd = %command.cmd, cwd = ?command.cwd, "starting command");

    let mut cmd = shell(&command.cmd);
    if let Some(cwd) = &command.cwd {
        cmd.current_dir(cwd);
    }
    for (key, value) in &command.env {
        cmd.env(key, value);
    }
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning command '{}'", command.cmd))?;

    if let Some(stdout) = child.stdout.take() {
        let name = command.cmd.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(cmd = %name, "stdout: {}", line);
            }
        });
    }

    // Keep the tail of stderr for the failure report.
    let stderr_task = child.stderr.take().map(|stderr| {
        let name = command.cmd.clone();
        tokio::spawn(async move {
            let mut tail: Vec<String> = Vec::new();
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(cmd = %name, "stderr: {}", line);
                if tail.len() == STDERR_TAIL_LINES {
                    tail.remove(0);
                }
                tail.push(line);
            }
            tail.join("\n")
        })
    });

    let status = loop {
        tokio::select! {
            status_res = child.wait() => {
                break status_res
                    .with_context(|| format!("waiting for command '{}'", command.cmd))?;
            }
            _ = tokio::time::sleep(CANCEL_POLL_INTERVAL) => {
                if cancel.is_cancelled() {
                    info!(cmd = %command.cmd, "cancellation requested; killing command");
                    if let Err(e) = child.kill().await {
                        warn!(cmd = %command.cmd, error = %e, "failed to kill command");
                    }
                    return Ok(CommandOutcome::Cancelled);
                }
            }
        }
    };

    let stderr = match stderr_task {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    };

    let code = status.code().unwrap_or(-1);
    info!(cmd = %command.cmd, exit_code = code, success = status.success(), "command exited");

    if status.success() {
        Ok(CommandOutcome::Success)
    } else {
        Ok(CommandOutcome::Failed { code, stderr })
    }
}
