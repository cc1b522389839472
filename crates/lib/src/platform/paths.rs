use crate::consts::APP_NAME;
use std::path::PathBuf;

/// Returns the user's home directory
pub fn home_dir() -> Option<PathBuf> {
  std::env::var_os("HOME").map(PathBuf::from)
}

/// Returns the directory for configuration files for the application
///
/// `None` only when neither `XDG_CONFIG_HOME` nor `HOME` is set.
pub fn config_dir() -> Option<PathBuf> {
  let config_home = std::env::var_os("XDG_CONFIG_HOME")
    .map(PathBuf::from)
    .or_else(|| home_dir().map(|h| h.join(".config")))?;
  Some(config_home.join(APP_NAME))
}

/// Returns the directory for persistent state of the application
///
/// `None` only when neither `XDG_STATE_HOME` nor `HOME` is set.
pub fn state_dir() -> Option<PathBuf> {
  let state_home = std::env::var_os("XDG_STATE_HOME")
    .map(PathBuf::from)
    .or_else(|| home_dir().map(|h| h.join(".local").join("state")))?;
  Some(state_home.join(APP_NAME))
}

/// Default work directory for build result links and the run lock.
///
/// Falls back to the current directory when no state directory can be derived.
pub fn default_work_dir() -> PathBuf {
  state_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Default location of the pipeline configuration file.
///
/// `NETBUILD_CONFIG` wins over the XDG location.
pub fn default_config_path() -> Option<PathBuf> {
  if let Some(path) = std::env::var_os("NETBUILD_CONFIG") {
    return Some(PathBuf::from(path));
  }
  config_dir().map(|dir| dir.join("config.toml"))
}
