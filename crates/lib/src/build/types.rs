use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// One invocation of the external build tool.
///
/// Renders as `<tool> -o <out_link> <expression> [--argstr <key> <value>]*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInvocation {
  pub tool: String,
  pub expression: PathBuf,
  /// Link the tool leaves pointing at its output directory.
  pub out_link: PathBuf,
  /// Flattened `--argstr` parameters; always contains `system`.
  pub params: BTreeMap<String, String>,
}

impl BuildInvocation {
  pub fn args(&self) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
      "-o".into(),
      self.out_link.clone().into_os_string(),
      self.expression.clone().into_os_string(),
    ];
    for (key, value) in &self.params {
      args.push("--argstr".into());
      args.push(key.into());
      args.push(value.into());
    }
    args
  }
}

/// A successful build for one architecture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
  /// The result link in the work directory.
  pub out_link: PathBuf,
  /// Fully resolved directory the link points at.
  pub output_dir: PathBuf,
  /// How many invocations it took, including the successful one.
  pub attempts: u32,
}

#[derive(Debug, Error)]
pub enum BuildError {
  #[error("failed to start {tool} for {arch}: {source}")]
  Spawn {
    arch: String,
    tool: String,
    #[source]
    source: io::Error,
  },

  /// The tool exited non-zero. `output` is its captured stdout followed by
  /// stderr; it is reported through [`BuildError::output`], not the message.
  #[error("building {arch} failed ({status})")]
  Failed {
    arch: String,
    status: String,
    output: String,
  },

  #[error("building {arch} timed out after {}", humantime::format_duration(*.timeout))]
  TimedOut { arch: String, timeout: Duration },

  #[error("build tool exited successfully but left no result at {path}: {source}")]
  MissingResult {
    arch: String,
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// `attempts` counts the invocation that was interrupted, if any.
  #[error("build for {arch} was cancelled")]
  Cancelled { arch: String, attempts: u32 },

  #[error("giving up on {arch} after {attempts} attempt(s): {last}")]
  Exhausted {
    arch: String,
    attempts: u32,
    last: Box<BuildError>,
  },
}

impl BuildError {
  pub fn is_cancelled(&self) -> bool {
    matches!(self, BuildError::Cancelled { .. })
  }

  /// Invocations made before this error was returned, when known.
  pub fn attempts(&self) -> Option<u32> {
    match self {
      BuildError::Exhausted { attempts, .. } | BuildError::Cancelled { attempts, .. } => Some(*attempts),
      _ => None,
    }
  }

  /// Captured tool output behind this error, looking through [`BuildError::Exhausted`].
  pub fn output(&self) -> Option<&str> {
    match self {
      BuildError::Failed { output, .. } => Some(output),
      BuildError::Exhausted { last, .. } => last.output(),
      _ => None,
    }
  }
}
