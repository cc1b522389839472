//! netbuild-lib: daily netboot image builds and their public snapshot tree
//!
//! A run builds the netboot kernel, initrd and iPXE script for every
//! configured architecture and publishes them under a dated directory:
//! - `build`: invoking the build tool with bounded retries
//! - `publish`: the snapshot tree, copy-vs-link dedup, manifests and `latest`
//! - `pipeline`: one run across all architectures, with per-architecture isolation
//! - `jobs`: the in-memory audit trail of build jobs
//! - `run_lock`: keeps overlapping runs from touching the tree at once

pub mod arch;
pub mod build;
pub mod config;
pub mod consts;
pub mod jobs;
pub mod pipeline;
pub mod platform;
pub mod publish;
pub mod run_lock;
pub mod util;
