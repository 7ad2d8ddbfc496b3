// Copyright 2026 The wattlog authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Timeout-bounded execution of vendor command-line tools.
//
// - Centralize timeout behavior
// - Normalize stdout/stderr handling (UTF-8 lossy conversion)
// - Kill the child on timeout so a hung tool cannot outlive its tick

use std::time::Duration;

use tokio::process::Command;

use crate::source::{SourceError, SourceResult};

/// Normalized command output.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Process exit code (or -1 if unavailable)
    pub status: i32,
    /// UTF-8 (lossy) decoded stdout
    pub stdout: String,
    /// UTF-8 (lossy) decoded stderr
    pub stderr: String,
}

/// Execute a command with a timeout.
///
/// Returns the normalized output if the command completes within the
/// timeout; a timed-out command is killed and reported as
/// [`SourceError::Timeout`]. The exit status is not checked here, callers
/// that need one use [`run_checked_command`].
pub async fn run_command_with_timeout(
    command: &str,
    args: &[&str],
    timeout: Duration,
) -> SourceResult<CommandOutput> {
    let child = Command::new(command)
        .args(args)
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(timeout, child).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(SourceError::Timeout(format!(
                "'{command}' did not complete within {timeout:?}"
            )))
        }
    };

    Ok(CommandOutput {
        status: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Like [`run_command_with_timeout`], but a non-zero exit status becomes
/// [`SourceError::CommandFailed`].
pub async fn run_checked_command(
    command: &str,
    args: &[&str],
    timeout: Duration,
) -> SourceResult<CommandOutput> {
    let out = run_command_with_timeout(command, args, timeout).await?;
    if out.status != 0 {
        return Err(SourceError::CommandFailed {
            command: format!("{command} {}", args.join(" ")),
            code: Some(out.status),
            stderr: out.stderr.trim().to_string(),
        });
    }
    Ok(out)
}
