//! Pipeline configuration.
//!
//! Configuration is read from a TOML file (see [`default_config_path`]) and
//! then adjusted by environment overrides. Every key is optional; an absent
//! file at the default location means "all defaults".
//!
//! ```toml
//! public_dir = "/srv/netboot/public"
//! work_dir = "/var/lib/netbuild"
//! architectures = ["x86_64", "i386", "aarch64"]
//! clock = "utc"
//! job_retention = "24h"
//!
//! [systems]
//! aarch64 = "aarch64-linux"
//!
//! [build]
//! expression = "build-netboot.nix"
//! attempts = 3
//! retry_delay = "30s"
//! timeout = "2h"
//!
//! [build.args]
//! channel = "nixos-unstable"
//! ```
//!
//! [`default_config_path`]: crate::platform::paths::default_config_path

use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::arch::{Architecture, default_architectures, invalid_name_reason};
use crate::consts::{DEFAULT_BUILD_ATTEMPTS, DEFAULT_BUILD_TOOL, DEFAULT_EXPRESSION, SYSTEM_ARG};
use crate::platform::paths::{default_config_path, default_work_dir};

pub const PUBLIC_DIR_ENV: &str = "NETBUILD_PUBLIC_DIR";
pub const WORK_DIR_ENV: &str = "NETBUILD_WORK_DIR";

const DEFAULT_JOB_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("invalid config {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("architecture '{0}' has no build system mapping (add it under [systems])")]
  MissingSystem(String),

  #[error("architecture '{0}' is listed more than once")]
  DuplicateArchitecture(String),

  #[error("invalid architecture name '{name}': {reason}")]
  InvalidArchitecture { name: String, reason: &'static str },

  #[error("no architectures configured")]
  NoArchitectures,

  #[error("build.attempts must be at least 1")]
  ZeroAttempts,

  #[error("build.args must not set 'system', it is derived from the architecture")]
  ReservedArg,

  #[error("invalid duration for {field}: {message}")]
  Duration { field: &'static str, message: String },
}

/// Which calendar "today" is read from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Clock {
  #[default]
  Local,
  Utc,
}

impl Clock {
  pub fn today(self) -> NaiveDate {
    match self {
      Clock::Local => chrono::Local::now().date_naive(),
      Clock::Utc => chrono::Utc::now().date_naive(),
    }
  }
}

/// `[build]` section as written in the file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct BuildSection {
  tool: Option<String>,
  expression: Option<PathBuf>,
  #[serde(default)]
  args: BTreeMap<String, String>,
  attempts: Option<u32>,
  retry_delay: Option<String>,
  timeout: Option<String>,
}

/// The file as written, before defaults and validation.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
  public_dir: Option<PathBuf>,
  work_dir: Option<PathBuf>,
  architectures: Option<Vec<String>>,
  #[serde(default)]
  systems: BTreeMap<String, String>,
  #[serde(default)]
  build: BuildSection,
  #[serde(default)]
  clock: Clock,
  job_retention: Option<String>,
}

/// How the external build tool is invoked and retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
  /// Program to run, resolved through `PATH` when not absolute.
  pub tool: String,
  /// Build expression passed to the tool.
  pub expression: PathBuf,
  /// Extra `--argstr` pairs shared by every architecture.
  pub args: BTreeMap<String, String>,
  pub attempts: u32,
  pub retry_delay: Duration,
  pub timeout: Option<Duration>,
}

impl Default for BuildConfig {
  fn default() -> Self {
    Self {
      tool: DEFAULT_BUILD_TOOL.to_string(),
      expression: PathBuf::from(DEFAULT_EXPRESSION),
      args: BTreeMap::new(),
      attempts: DEFAULT_BUILD_ATTEMPTS,
      retry_delay: Duration::ZERO,
      timeout: None,
    }
  }
}

/// Fully resolved, validated configuration for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
  /// Root of the published tree (`<public_dir>/<arch>/<date>/...`).
  pub public_dir: PathBuf,
  /// Where build result links and the run lock live. Defaults to the XDG
  /// state directory so it does not depend on the caller's working directory.
  pub work_dir: PathBuf,
  /// Build order is the order of this list.
  pub architectures: Vec<Architecture>,
  pub build: BuildConfig,
  pub clock: Clock,
  pub job_retention: Duration,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      public_dir: PathBuf::from("public"),
      work_dir: default_work_dir(),
      architectures: default_architectures(),
      build: BuildConfig::default(),
      clock: Clock::default(),
      job_retention: DEFAULT_JOB_RETENTION,
    }
  }
}

impl PipelineConfig {
  /// Load configuration and apply environment overrides.
  ///
  /// An explicitly given `path` must exist. Without one, the default location
  /// is tried and silently skipped if absent.
  pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
    let mut config = match path {
      Some(path) => Self::from_file(path)?,
      None => match default_config_path() {
        Some(path) if path.exists() => Self::from_file(&path)?,
        _ => {
          debug!("no config file found, using defaults");
          Self::default()
        }
      },
    };

    config.apply_env_overrides();
    Ok(config)
  }

  pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let file: ConfigFile = toml::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;

    debug!(path = %path.display(), "loaded config file");
    Self::resolve(file)
  }

  /// Parse configuration from TOML text without touching the environment.
  pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
    let file: ConfigFile = toml::from_str(content).map_err(|source| ConfigError::Parse {
      path: PathBuf::from("<inline>"),
      source,
    })?;
    Self::resolve(file)
  }

  fn apply_env_overrides(&mut self) {
    if let Some(dir) = std::env::var_os(PUBLIC_DIR_ENV) {
      self.public_dir = PathBuf::from(dir);
    }
    if let Some(dir) = std::env::var_os(WORK_DIR_ENV) {
      self.work_dir = PathBuf::from(dir);
    }
  }

  fn resolve(file: ConfigFile) -> Result<Self, ConfigError> {
    let defaults = Self::default();

    let mut systems: BTreeMap<String, String> = defaults
      .architectures
      .iter()
      .map(|a| (a.name.clone(), a.system.clone()))
      .collect();
    systems.extend(file.systems);

    let names = file
      .architectures
      .unwrap_or_else(|| defaults.architectures.iter().map(|a| a.name.clone()).collect());
    let architectures = resolve_architectures(names, &systems)?;

    let build = resolve_build(file.build)?;

    let job_retention = match file.job_retention {
      Some(s) => parse_duration("job_retention", &s)?,
      None => defaults.job_retention,
    };

    Ok(Self {
      public_dir: file.public_dir.unwrap_or(defaults.public_dir),
      work_dir: file.work_dir.unwrap_or(defaults.work_dir),
      architectures,
      build,
      clock: file.clock,
      job_retention,
    })
  }
}

fn resolve_architectures(
  names: Vec<String>,
  systems: &BTreeMap<String, String>,
) -> Result<Vec<Architecture>, ConfigError> {
  if names.is_empty() {
    return Err(ConfigError::NoArchitectures);
  }

  let mut seen = HashSet::new();
  let mut architectures = Vec::with_capacity(names.len());

  for name in names {
    if let Some(reason) = invalid_name_reason(&name) {
      return Err(ConfigError::InvalidArchitecture { name, reason });
    }
    if !seen.insert(name.clone()) {
      return Err(ConfigError::DuplicateArchitecture(name));
    }
    let system = systems
      .get(&name)
      .ok_or_else(|| ConfigError::MissingSystem(name.clone()))?;
    architectures.push(Architecture::new(name, system.clone()));
  }

  Ok(architectures)
}

fn resolve_build(section: BuildSection) -> Result<BuildConfig, ConfigError> {
  let defaults = BuildConfig::default();

  if section.args.contains_key(SYSTEM_ARG) {
    return Err(ConfigError::ReservedArg);
  }

  let attempts = section.attempts.unwrap_or(defaults.attempts);
  if attempts == 0 {
    return Err(ConfigError::ZeroAttempts);
  }

  let retry_delay = match section.retry_delay {
    Some(s) => parse_duration("build.retry_delay", &s)?,
    None => defaults.retry_delay,
  };
  let timeout = section
    .timeout
    .map(|s| parse_duration("build.timeout", &s))
    .transpose()?;

  Ok(BuildConfig {
    tool: section.tool.unwrap_or(defaults.tool),
    expression: section.expression.unwrap_or(defaults.expression),
    args: section.args,
    attempts,
    retry_delay,
    timeout,
  })
}

fn parse_duration(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
  humantime::parse_duration(value.trim()).map_err(|e| ConfigError::Duration {
    field,
    message: e.to_string(),
  })
}
