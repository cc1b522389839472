//! Netboot image builds.
//!
//! A build hands one architecture to the external build tool (normally
//! `nix-build`) and waits for it to leave a result link in the work
//! directory. Failed builds are retried up to the configured bound; the
//! first success ends the loop.
//!
//! # Submodules
//!
//! - [`execute`] - Subprocess invocation, output capture, timeout and cancellation

pub mod execute;
mod types;

pub use types::*;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::arch::Architecture;
use crate::config::BuildConfig;
use crate::consts::SYSTEM_ARG;
use execute::run_build_tool;

/// Invokes the build tool for an architecture, retrying failures.
#[derive(Debug, Clone)]
pub struct Builder {
  config: BuildConfig,
  work_dir: PathBuf,
}

impl Builder {
  pub fn new(config: BuildConfig, work_dir: PathBuf) -> Self {
    Self { config, work_dir }
  }

  pub fn config(&self) -> &BuildConfig {
    &self.config
  }

  /// Result link name for `arch`: `<expression stem>-<arch>-result`.
  pub fn result_link_name(&self, arch: &Architecture) -> String {
    let stem = self
      .config
      .expression
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_else(|| "build".to_string());
    format!("{}-{}-result", stem, arch.name)
  }

  /// Absolute-or-work-dir-relative path of the result link for `arch`.
  pub fn result_link(&self, arch: &Architecture) -> PathBuf {
    self.work_dir.join(self.result_link_name(arch))
  }

  pub fn invocation(&self, arch: &Architecture) -> BuildInvocation {
    let mut params: BTreeMap<String, String> = self.config.args.clone();
    params.insert(SYSTEM_ARG.to_string(), arch.system.clone());

    BuildInvocation {
      tool: self.config.tool.clone(),
      expression: self.config.expression.clone(),
      out_link: PathBuf::from(self.result_link_name(arch)),
      params,
    }
  }

  /// Build `arch`, retrying up to `attempts` times.
  ///
  /// Returns the resolved output directory on the first success. After the
  /// last failed attempt the error is wrapped in [`BuildError::Exhausted`].
  /// Cancellation is honored while a build runs and during the retry delay.
  pub async fn build(&self, arch: &Architecture, cancel: &CancellationToken) -> Result<BuildOutput, BuildError> {
    let max = self.config.attempts.max(1);
    let invocation = self.invocation(arch);

    let mut attempt = 0;
    loop {
      attempt += 1;
      info!(arch = %arch, attempt, max, "starting build");

      let err = match self.build_once(arch, &invocation, cancel).await {
        Ok(output_dir) => {
          info!(arch = %arch, attempt, output = %output_dir.display(), "build succeeded");
          return Ok(BuildOutput {
            out_link: self.result_link(arch),
            output_dir,
            attempts: attempt,
          });
        }
        Err(e) if e.is_cancelled() => {
          return Err(BuildError::Cancelled {
            arch: arch.name.clone(),
            attempts: attempt,
          });
        }
        Err(e) => e,
      };

      warn!(
        arch = %arch,
        attempt,
        max,
        error = %err,
        output = ?err.output().unwrap_or_default(),
        "build attempt failed"
      );

      if attempt >= max {
        return Err(BuildError::Exhausted {
          arch: arch.name.clone(),
          attempts: attempt,
          last: Box::new(err),
        });
      }

      if !self.config.retry_delay.is_zero() {
        tokio::select! {
          _ = cancel.cancelled() => {
            return Err(BuildError::Cancelled {
              arch: arch.name.clone(),
              attempts: attempt,
            });
          }
          _ = tokio::time::sleep(self.config.retry_delay) => {}
        }
      }
    }
  }

  async fn build_once(
    &self,
    arch: &Architecture,
    invocation: &BuildInvocation,
    cancel: &CancellationToken,
  ) -> Result<PathBuf, BuildError> {
    run_build_tool(&arch.name, invocation, &self.work_dir, self.config.timeout, cancel).await?;
    resolve_result_link(&arch.name, &self.result_link(arch))
  }
}

/// Follow the result link to the real output directory.
fn resolve_result_link(arch: &str, link: &Path) -> Result<PathBuf, BuildError> {
  std::fs::canonicalize(link).map_err(|source| BuildError::MissingResult {
    arch: arch.to_string(),
    path: link.to_path_buf(),
    source,
  })
}
