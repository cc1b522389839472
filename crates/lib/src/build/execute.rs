//! Build tool subprocess execution.
//!
//! Runs one build tool invocation to completion, capturing its output. The
//! child is spawned with `kill_on_drop`, so both a timeout and a cancellation
//! terminate the build instead of leaving it running in the background.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::types::{BuildError, BuildInvocation};

/// Execute a single build tool invocation.
///
/// # Arguments
///
/// * `arch` - Architecture name, used for error context
/// * `invocation` - Tool, expression, result link and parameters
/// * `cwd` - Working directory for the tool (relative paths resolve here)
/// * `timeout` - Optional upper bound on the run time
/// * `cancel` - Cancels the build and kills the child when triggered
///
/// # Returns
///
/// `Ok(())` when the tool exits with status 0.
pub async fn run_build_tool(
  arch: &str,
  invocation: &BuildInvocation,
  cwd: &Path,
  timeout: Option<Duration>,
  cancel: &CancellationToken,
) -> Result<(), BuildError> {
  info!(arch, tool = %invocation.tool, expression = %invocation.expression.display(), "running build tool");

  let mut command = Command::new(&invocation.tool);
  command
    .args(invocation.args())
    .current_dir(cwd)
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);

  debug!(arch, args = ?invocation.args(), cwd = %cwd.display(), "spawning process");

  let child = command.spawn().map_err(|source| BuildError::Spawn {
    arch: arch.to_string(),
    tool: invocation.tool.clone(),
    source,
  })?;

  let wait = async {
    match timeout {
      Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
        .await
        .map_err(|_| BuildError::TimedOut {
          arch: arch.to_string(),
          timeout: limit,
        }),
      None => Ok(child.wait_with_output().await),
    }
  };

  let output = tokio::select! {
    biased;
    _ = cancel.cancelled() => {
      return Err(BuildError::Cancelled {
        arch: arch.to_string(),
        attempts: 1,
      });
    }
    result = wait => result?,
  };

  let output = output.map_err(|source| BuildError::Spawn {
    arch: arch.to_string(),
    tool: invocation.tool.clone(),
    source,
  })?;

  if !output.status.success() {
    let mut captured = String::from_utf8_lossy(&output.stdout).into_owned();
    captured.push_str(&String::from_utf8_lossy(&output.stderr));

    return Err(BuildError::Failed {
      arch: arch.to_string(),
      status: output.status.to_string(),
      output: captured.trim_end().to_string(),
    });
  }

  let stdout = String::from_utf8_lossy(&output.stdout);
  if !stdout.trim().is_empty() {
    debug!(arch, stdout = %stdout.trim(), "build tool output");
  }

  Ok(())
}
