use std::fmt;

use serde::Serialize;

use crate::consts::LATEST_LINK;

/// A build target the pipeline produces netboot images for.
///
/// `name` is what operators see and what the published tree is keyed by
/// (`public/<name>/...`); `system` is the identifier handed to the build
/// tool (e.g. `i686-linux` for `i386`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Architecture {
  pub name: String,
  pub system: String,
}

impl Architecture {
  pub fn new(name: impl Into<String>, system: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      system: system.into(),
    }
  }

  pub fn as_str(&self) -> &str {
    &self.name
  }
}

impl fmt::Display for Architecture {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.name)
  }
}

/// The architectures built when no configuration says otherwise.
pub fn default_architectures() -> Vec<Architecture> {
  vec![
    Architecture::new("x86_64", "x86_64-linux"),
    Architecture::new("i386", "i686-linux"),
  ]
}

/// Returns why `name` cannot be used as a directory under the public root,
/// or `None` if it can.
pub fn invalid_name_reason(name: &str) -> Option<&'static str> {
  if name.is_empty() {
    Some("name is empty")
  } else if name == "." || name == ".." {
    Some("name is a relative path component")
  } else if name == LATEST_LINK {
    Some("name collides with the latest pointer")
  } else if name.contains('/') || name.contains('\\') || name.contains('\0') {
    Some("name contains a path separator")
  } else {
    None
  }
}
