//! In-memory audit trail of build jobs.
//!
//! One [`BuildJob`] is recorded per architecture per run. Entries are kept
//! until they have been finished for longer than the retention window; jobs
//! that are still running are never evicted.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

/// Time-sortable job identifier (UUIDv7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct JobId(pub Uuid);

impl JobId {
  pub fn new() -> Self {
    Self(Uuid::now_v7())
  }
}

impl Default for JobId {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Display for JobId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
  Published,
  Failed { reason: String },
  Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildJob {
  pub id: JobId,
  pub arch: String,
  pub started_at: DateTime<Utc>,
  pub finished_at: Option<DateTime<Utc>>,
  pub finished: bool,
  pub attempts: u32,
  pub outcome: Option<JobOutcome>,
}

impl BuildJob {
  pub fn is_running(&self) -> bool {
    !self.finished
  }
}

/// Owned by the orchestrator; nothing outside the pipeline writes to it.
#[derive(Debug)]
pub struct JobRegistry {
  jobs: BTreeMap<JobId, BuildJob>,
  retention: Duration,
}

impl JobRegistry {
  pub fn new(retention: Duration) -> Self {
    Self {
      jobs: BTreeMap::new(),
      retention,
    }
  }

  /// Record a new running job for `arch`.
  pub fn start(&mut self, arch: &str, now: DateTime<Utc>) -> JobId {
    let id = JobId::new();
    self.jobs.insert(
      id,
      BuildJob {
        id,
        arch: arch.to_string(),
        started_at: now,
        finished_at: None,
        finished: false,
        attempts: 0,
        outcome: None,
      },
    );
    id
  }

  pub fn set_attempts(&mut self, id: JobId, attempts: u32) {
    if let Some(job) = self.jobs.get_mut(&id) {
      job.attempts = attempts;
    }
  }

  /// Mark a job complete. Only the first call for a job has any effect.
  ///
  /// Returns `false` if the job is unknown or was already finished.
  pub fn finish(&mut self, id: JobId, outcome: JobOutcome, now: DateTime<Utc>) -> bool {
    match self.jobs.get_mut(&id) {
      Some(job) if !job.finished => {
        job.finished = true;
        job.finished_at = Some(now);
        job.outcome = Some(outcome);
        true
      }
      _ => false,
    }
  }

  /// Drop finished jobs older than the retention window. Returns how many
  /// were removed.
  pub fn evict_expired(&mut self, now: DateTime<Utc>) -> usize {
    let retention = chrono::Duration::from_std(self.retention).unwrap_or(chrono::Duration::MAX);
    let before = self.jobs.len();

    self.jobs.retain(|_, job| match job.finished_at {
      Some(finished_at) if job.finished => now.signed_duration_since(finished_at) <= retention,
      _ => true,
    });

    let evicted = before - self.jobs.len();
    if evicted > 0 {
      debug!(evicted, remaining = self.jobs.len(), "evicted expired jobs");
    }
    evicted
  }

  pub fn get(&self, id: JobId) -> Option<&BuildJob> {
    self.jobs.get(&id)
  }

  /// Jobs in id order. UUIDv7 ids sort by creation time.
  pub fn iter(&self) -> impl Iterator<Item = &BuildJob> {
    self.jobs.values()
  }

  pub fn len(&self) -> usize {
    self.jobs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.jobs.is_empty()
  }
}
