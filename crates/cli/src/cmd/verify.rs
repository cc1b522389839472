//! Verify command implementation.
//!
//! Re-hashes a published snapshot against its `sha256sum.txt`, the same check
//! `sha256sum -c` performs on a downloaded copy.

use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;

use netbuild_lib::arch::invalid_name_reason;
use netbuild_lib::config::PipelineConfig;
use netbuild_lib::consts::{DATE_FORMAT, LATEST_LINK};
use netbuild_lib::publish::ArtifactStore;
use netbuild_lib::publish::verify::VerifyStatus;

use crate::output::{OutputFormat, print_error, print_json, print_success, print_warning, truncate_hash};

pub fn cmd_verify(config_path: Option<&Path>, arch: &str, date: &str, output: OutputFormat) -> Result<()> {
  if let Some(reason) = invalid_name_reason(arch) {
    bail!("Invalid architecture '{}': {}", arch, reason);
  }

  let config = PipelineConfig::load(config_path).context("Failed to load configuration")?;
  let store = ArtifactStore::new(&config.public_dir);

  let date = if date == LATEST_LINK {
    store
      .latest(arch)?
      .with_context(|| format!("Nothing published for {} yet", arch))?
  } else {
    NaiveDate::parse_from_str(date, DATE_FORMAT).with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", date))?
  };

  let report = store.verify(arch, date)?;

  if output.is_json() {
    print_json(&report)?;
  } else {
    for entry in &report.entries {
      match &entry.status {
        VerifyStatus::Ok => print_success(&format!("{}: OK", entry.name)),
        VerifyStatus::Mismatch { actual } => print_error(&format!(
          "{}: FAILED (expected {}, got {})",
          entry.name,
          entry.expected.as_ref().map(|d| truncate_hash(d.as_str())).unwrap_or("-"),
          truncate_hash(actual.as_str())
        )),
        VerifyStatus::Missing => print_error(&format!("{}: FAILED open or read", entry.name)),
        VerifyStatus::Unreadable { message } => print_error(&format!("{}: FAILED ({})", entry.name, message)),
        VerifyStatus::Unlisted => print_warning(&format!("{}: not listed in manifest", entry.name)),
      }
    }
  }

  let failed = report.failures().count();
  if failed > 0 {
    bail!("{} {}: {} file(s) failed verification", arch, date, failed);
  }

  Ok(())
}
