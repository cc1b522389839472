//! Shared test helpers for CLI integration tests.

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Stand-in for `nix-build`: honors `-o` and `--argstr system`, writes the
/// three artifacts into a fresh store path and points the result link at it.
const FAKE_NIX_BUILD: &str = r#"#!/bin/sh
state="@STATE@"
out=""
system=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift 2 ;;
    --argstr)
      if [ "$2" = "system" ]; then system="$3"; fi
      shift 3 ;;
    *) shift ;;
  esac
done

echo "$system" >> "$state/calls.log"
if [ -e "$state/broken-$system" ]; then
  echo "error: builder for '$system' failed with exit code 1" >&2
  exit 1
fi

n=$(wc -l < "$state/calls.log" | tr -d ' ')
version=$(cat "$state/version" 2>/dev/null || echo 1)
store="$state/store/$n"
mkdir -p "$store"
for name in bzImage initrd netboot.ipxe; do
  printf '%s for %s, version %s\n' "$name" "$system" "$version" > "$store/$name"
done
rm -f "$out"
ln -s "$store" "$out"
"#;

/// Isolated test environment.
///
/// Each test gets its own temporary directory holding the config file, the
/// public tree, the work directory and a fake build tool.
pub struct TestEnv {
  pub temp: TempDir,
  pub config_path: PathBuf,
}

impl TestEnv {
  /// Environment with a fake build tool and the default architectures.
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let root = dunce::canonicalize(temp.path()).unwrap();

    let state = root.join("fake-nix");
    std::fs::create_dir_all(&state).unwrap();
    let tool = state.join("nix-build");
    std::fs::write(&tool, FAKE_NIX_BUILD.replace("@STATE@", &state.to_string_lossy())).unwrap();
    std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

    let config_path = root.join("netbuild.toml");
    let config = format!(
      "public_dir = \"{}\"\nwork_dir = \"{}\"\nclock = \"utc\"\n\n[build]\ntool = \"{}\"\n",
      root.join("public").display(),
      root.join("work").display(),
      tool.display()
    );
    std::fs::write(&config_path, config).unwrap();

    Self { temp, config_path }
  }

  pub fn root(&self) -> PathBuf {
    dunce::canonicalize(self.temp.path()).unwrap()
  }

  pub fn public_path(&self) -> PathBuf {
    self.root().join("public")
  }

  pub fn work_path(&self) -> PathBuf {
    self.root().join("work")
  }

  /// Make every build for `system` fail.
  pub fn break_system(&self, system: &str) {
    std::fs::write(self.root().join("fake-nix").join(format!("broken-{system}")), "").unwrap();
  }

  /// Change the content of every artifact the fake tool produces from now on.
  pub fn set_version(&self, version: u32) {
    std::fs::write(self.root().join("fake-nix").join("version"), version.to_string()).unwrap();
  }

  /// Systems the fake tool was invoked for, in order.
  pub fn build_calls(&self) -> Vec<String> {
    std::fs::read_to_string(self.root().join("fake-nix").join("calls.log"))
      .map(|s| s.lines().map(str::to_string).collect())
      .unwrap_or_default()
  }

  /// Get a pre-configured Command for the netbuild binary.
  ///
  /// Points `NETBUILD_CONFIG` at this environment's config and isolates
  /// `XDG_CONFIG_HOME`/`HOME` so no user config leaks in.
  pub fn netbuild_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("netbuild");
    cmd.env("NETBUILD_CONFIG", &self.config_path);
    cmd.env("XDG_CONFIG_HOME", self.root().join("xdg"));
    cmd.env("HOME", self.root());
    cmd.env_remove("NETBUILD_PUBLIC_DIR");
    cmd.env_remove("NETBUILD_WORK_DIR");
    cmd.env_remove("RUST_LOG");
    cmd
  }

  /// `netbuild run --date <date>`.
  pub fn run_for(&self, date: &str) -> Command {
    let mut cmd = self.netbuild_cmd();
    cmd.args(["run", "--date", date]);
    cmd
  }
}
