//! Status command implementation.
//!
//! Lists the dated snapshots on disk and the `latest` pointer for each
//! configured architecture.

use std::path::Path;

use anyhow::{Context, Result};

use netbuild_lib::config::PipelineConfig;
use netbuild_lib::publish::{ArtifactStore, SnapshotListing};

use crate::output::{OutputFormat, print_info, print_json, print_stat, print_success, print_warning, symbols};

pub fn cmd_status(config_path: Option<&Path>, output: OutputFormat) -> Result<()> {
  let config = PipelineConfig::load(config_path).context("Failed to load configuration")?;
  let store = ArtifactStore::new(&config.public_dir);

  let listings = config
    .architectures
    .iter()
    .map(|arch| store.list_snapshots(&arch.name))
    .collect::<Result<Vec<SnapshotListing>, _>>()
    .context("Failed to read snapshot tree")?;

  if output.is_json() {
    print_json(&listings)?;
    return Ok(());
  }

  print_stat("Public directory", &config.public_dir.display().to_string());
  println!();

  for listing in &listings {
    let (Some(oldest), Some(newest)) = (listing.dates.first(), listing.dates.last()) else {
      print_info(&format!("{}: nothing published yet", listing.arch));
      continue;
    };

    match listing.latest {
      Some(latest) if listing.dates.contains(&latest) => {
        print_success(&format!("{} {} {}", listing.arch, symbols::ARROW, latest));
      }
      Some(latest) => {
        print_warning(&format!("{}: latest points at missing snapshot {}", listing.arch, latest));
      }
      None => print_warning(&format!("{}: no latest pointer", listing.arch)),
    }
    print_stat("Snapshots", &listing.dates.len().to_string());
    print_stat("Oldest", &oldest.to_string());
    print_stat("Newest", &newest.to_string());
  }

  Ok(())
}
