//! Implementation of the `netbuild run` command.
//!
//! This is the entry point the daily scheduler invokes. It takes the run lock,
//! builds and publishes every configured architecture, and exits non-zero if
//! any architecture failed. A run that finds another one active does nothing
//! and exits successfully.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use netbuild_lib::config::PipelineConfig;
use netbuild_lib::pipeline::{ArchStatus, Pipeline, RunReport};
use netbuild_lib::run_lock::RunLock;

use crate::output::{
  OutputFormat, format_duration, print_error, print_json, print_stat, print_success, print_warning, symbols,
};

pub fn cmd_run(config_path: Option<&Path>, date: Option<NaiveDate>, output: OutputFormat) -> Result<()> {
  let start = Instant::now();
  let config = PipelineConfig::load(config_path).context("Failed to load configuration")?;

  let _lock = match RunLock::acquire(&config.work_dir, "run") {
    Ok(lock) => lock,
    Err(e) if e.is_contention() => {
      warn!(error = %e, "skipping run");
      if output.is_json() {
        print_json(&serde_json::json!({ "skipped": true, "reason": e.to_string() }))?;
      } else {
        print_warning(&format!("Skipping run: {}", e));
      }
      return Ok(());
    }
    Err(e) => return Err(e).context("Failed to acquire run lock"),
  };

  let today = date.unwrap_or_else(|| config.clock.today());

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report = rt.block_on(async {
    let cancel = CancellationToken::new();
    let interrupt = {
      let cancel = cancel.clone();
      tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
          warn!("interrupted, finishing current step and cancelling the rest");
          cancel.cancel();
        }
      })
    };

    let mut pipeline = Pipeline::new(&config);
    let report = pipeline.run(today, &cancel).await;
    interrupt.abort();
    report
  });

  if output.is_json() {
    print_json(&report)?;
  } else {
    print_report(&report);
    println!();
    print_stat("Duration", &format_duration(start.elapsed()));
  }

  if !report.is_success() {
    bail!(
      "{} of {} architecture(s) failed for {}",
      report.failed_count(),
      report.results.len(),
      report.date
    );
  }

  Ok(())
}

fn print_report(report: &RunReport) {
  for result in &report.results {
    match &result.status {
      ArchStatus::Published { snapshot } => {
        print_success(&format!(
          "{}: published {} {} {} ({} copied, {} linked)",
          result.arch,
          snapshot.date,
          symbols::ARROW,
          snapshot.dir.display(),
          snapshot.copied_count(),
          snapshot.linked_count()
        ));
      }
      ArchStatus::BuildFailed { error, output } => {
        print_error(&format!("{}: build failed after {} attempt(s)", result.arch, result.attempts));
        eprintln!("{}", error);
        if let Some(output) = output {
          eprintln!("{}", output);
        }
      }
      ArchStatus::PublishFailed { error } => {
        print_error(&format!("{}: publish failed: {}", result.arch, error));
      }
      ArchStatus::Cancelled => {
        print_warning(&format!("{}: cancelled", result.arch));
      }
    }
  }
}
