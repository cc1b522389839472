//! Names and defaults shared across the crate.

pub const APP_NAME: &str = "netbuild";

/// Checksum manifest written into every snapshot directory.
pub const MANIFEST_FILENAME: &str = "sha256sum.txt";

/// Per-architecture symlink naming the most recently published date.
pub const LATEST_LINK: &str = "latest";

/// Run lock file, created inside the work directory.
pub const RUN_LOCK_FILENAME: &str = ".netbuild.lock";

/// Calendar date format used for snapshot directory names.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub const DEFAULT_BUILD_TOOL: &str = "nix-build";
pub const DEFAULT_EXPRESSION: &str = "build-netboot.nix";
pub const DEFAULT_BUILD_ATTEMPTS: u32 = 3;

/// Build-tool parameter carrying the target system identifier.
pub const SYSTEM_ARG: &str = "system";
