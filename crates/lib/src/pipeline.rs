//! One daily build-and-publish run.
//!
//! Architectures are processed one at a time in configured order. A failure
//! is contained to its architecture: it is logged, recorded in the job
//! registry and the report, and the next architecture still runs.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::arch::Architecture;
use crate::build::Builder;
use crate::config::PipelineConfig;
use crate::jobs::{JobId, JobOutcome, JobRegistry};
use crate::publish::{ArtifactStore, PublishedSnapshot};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArchStatus {
  Published { snapshot: PublishedSnapshot },
  BuildFailed {
    error: String,
    /// Build tool output from the last attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
  },
  PublishFailed { error: String },
  /// Cancelled while running, or never started because the run was cancelled.
  Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchReport {
  pub arch: String,
  pub system: String,
  /// `None` when the architecture was never started.
  pub job_id: Option<JobId>,
  pub attempts: u32,
  #[serde(flatten)]
  pub status: ArchStatus,
}

impl ArchReport {
  pub fn is_published(&self) -> bool {
    matches!(self.status, ArchStatus::Published { .. })
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
  pub date: NaiveDate,
  /// In processing order.
  pub results: Vec<ArchReport>,
}

impl RunReport {
  pub fn is_success(&self) -> bool {
    self.results.iter().all(ArchReport::is_published)
  }

  pub fn failed_count(&self) -> usize {
    self.results.iter().filter(|r| !r.is_published()).count()
  }
}

/// Drives [`Builder`] then [`ArtifactStore`] for every architecture and
/// owns the [`JobRegistry`].
#[derive(Debug)]
pub struct Pipeline {
  architectures: Vec<Architecture>,
  builder: Builder,
  store: ArtifactStore,
  registry: JobRegistry,
}

impl Pipeline {
  pub fn new(config: &PipelineConfig) -> Self {
    Self {
      architectures: config.architectures.clone(),
      builder: Builder::new(config.build.clone(), config.work_dir.clone()),
      store: ArtifactStore::new(config.public_dir.clone()),
      registry: JobRegistry::new(config.job_retention),
    }
  }

  pub fn store(&self) -> &ArtifactStore {
    &self.store
  }

  pub fn registry(&self) -> &JobRegistry {
    &self.registry
  }

  /// Build and publish every architecture for `today`.
  pub async fn run(&mut self, today: NaiveDate, cancel: &CancellationToken) -> RunReport {
    self.registry.evict_expired(Utc::now());
    info!(date = %today, architectures = self.architectures.len(), "starting run");

    let mut results = Vec::with_capacity(self.architectures.len());
    for arch in &self.architectures {
      if cancel.is_cancelled() {
        warn!(arch = %arch, "run cancelled, not starting");
        results.push(ArchReport {
          arch: arch.name.clone(),
          system: arch.system.clone(),
          job_id: None,
          attempts: 0,
          status: ArchStatus::Cancelled,
        });
        continue;
      }

      let job_id = self.registry.start(&arch.name, Utc::now());
      let (attempts, status) = process_arch(&self.builder, &self.store, arch, today, cancel).await;

      let outcome = match &status {
        ArchStatus::Published { .. } => JobOutcome::Published,
        ArchStatus::BuildFailed { error, .. } | ArchStatus::PublishFailed { error } => JobOutcome::Failed {
          reason: error.clone(),
        },
        ArchStatus::Cancelled => JobOutcome::Cancelled,
      };
      self.registry.set_attempts(job_id, attempts);
      self.registry.finish(job_id, outcome, Utc::now());

      results.push(ArchReport {
        arch: arch.name.clone(),
        system: arch.system.clone(),
        job_id: Some(job_id),
        attempts,
        status,
      });
    }

    let report = RunReport { date: today, results };
    if report.is_success() {
      info!("successfully built {today} images");
    } else {
      warn!(
        date = %today,
        failed = report.failed_count(),
        total = report.results.len(),
        "run finished with failures"
      );
    }
    report
  }
}

/// Build then publish one architecture. Returns the attempt count and status.
async fn process_arch(
  builder: &Builder,
  store: &ArtifactStore,
  arch: &Architecture,
  today: NaiveDate,
  cancel: &CancellationToken,
) -> (u32, ArchStatus) {
  let output = match builder.build(arch, cancel).await {
    Ok(output) => output,
    Err(e) if e.is_cancelled() => {
      let attempts = e.attempts().unwrap_or(0);
      warn!(arch = %arch, attempts, "build cancelled");
      return (attempts, ArchStatus::Cancelled);
    }
    Err(e) => {
      let output = e.output().map(str::to_string);
      error!(
        arch = %arch,
        error = %e,
        output = ?output.as_deref().unwrap_or_default(),
        "build failed"
      );
      let attempts = e.attempts().unwrap_or(builder.config().attempts);
      return (
        attempts,
        ArchStatus::BuildFailed {
          error: e.to_string(),
          output,
        },
      );
    }
  };

  match store.publish(&arch.name, &output.output_dir, today) {
    Ok(snapshot) => (output.attempts, ArchStatus::Published { snapshot }),
    Err(e) => {
      error!(arch = %arch, error = %e, "publish failed");
      (output.attempts, ArchStatus::PublishFailed { error: e.to_string() })
    }
  }
}
