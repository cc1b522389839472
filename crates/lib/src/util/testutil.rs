//! Test utilities for netbuild-lib.
//!
//! Most tests need either a build tool that behaves like `nix-build` or a
//! build output directory shaped like one. Both are produced here.

use std::fs;
use std::os::unix::fs::{PermissionsExt, symlink};
use std::path::{Path, PathBuf};

/// Write an executable `/bin/sh` script and return its path.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
  let path = dir.join(name);
  fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
  fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
  path
}

/// Build a `nix-build`-style output directory under `root/<name>`.
///
/// The returned directory holds `bzImage`, `initrd` and `netboot.ipxe` as
/// symlinks into a sibling `files` directory, the way a Nix result's entries
/// point into other store paths.
pub fn fake_build_output(root: &Path, name: &str, kernel: &str, initrd: &str, ipxe: &str) -> PathBuf {
  let files = root.join(name).join("files");
  let out = root.join(name).join("out");
  fs::create_dir_all(&files).unwrap();
  fs::create_dir_all(&out).unwrap();

  for (file, content) in [("bzImage", kernel), ("initrd", initrd), ("netboot.ipxe", ipxe)] {
    fs::write(files.join(file), content).unwrap();
    symlink(files.join(file), out.join(file)).unwrap();
  }

  out
}

const FAKE_NIX_BUILD: &str = r#"
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

calls_file="$state/calls-$system"
n=$(cat "$calls_file" 2>/dev/null || echo 0)
n=$((n + 1))
echo "$n" > "$calls_file"
echo "$system" >> "$state/calls.log"

fail_first=$(cat "$state/fail-$system" 2>/dev/null || echo 0)
if [ "$n" -le "$fail_first" ]; then
  echo "error: simulated failure $n for $system" >&2
  exit 1
fi

if [ -e "$state/no-link-$system" ]; then
  exit 0
fi

store="$state/store/$system-$n"
mkdir -p "$store/files" "$store/out"
for name in bzImage initrd netboot.ipxe; do
  version=$(cat "$state/version-$system-$name" 2>/dev/null || echo 1)
  printf '%s for %s, version %s\n' "$name" "$system" "$version" > "$store/files/$name"
  ln -s "$store/files/$name" "$store/out/$name"
done
rm -f "$out"
ln -s "$store/out" "$out"
echo "$store/out"
"#;

/// A scripted stand-in for `nix-build`.
///
/// It understands `-o <link>` and `--argstr system <value>`, writes three
/// artifacts into a fresh fake store path and points the result link at it.
/// Behavior is steered per system through files in its state directory.
#[derive(Debug, Clone)]
pub struct FakeBuildTool {
  state: PathBuf,
  script: PathBuf,
}

impl FakeBuildTool {
  pub fn install(root: &Path) -> Self {
    let state = root.join(".fake-nix");
    fs::create_dir_all(&state).unwrap();
    let state = fs::canonicalize(&state).unwrap();
    let script = write_script(
      &state,
      "nix-build",
      &FAKE_NIX_BUILD.replace("@STATE@", &state.to_string_lossy()),
    );
    Self { state, script }
  }

  pub fn path(&self) -> &Path {
    &self.script
  }

  /// Fail the first `n` invocations for `system`.
  pub fn fail_first(&self, system: &str, n: u32) {
    fs::write(self.state.join(format!("fail-{system}")), n.to_string()).unwrap();
  }

  /// Exit successfully without creating the result link.
  pub fn skip_result_link(&self, system: &str) {
    fs::write(self.state.join(format!("no-link-{system}")), "").unwrap();
  }

  /// Change the content produced for one artifact (`bzImage`, `initrd`, `netboot.ipxe`).
  pub fn set_version(&self, system: &str, artifact: &str, version: u32) {
    fs::write(
      self.state.join(format!("version-{system}-{artifact}")),
      version.to_string(),
    )
    .unwrap();
  }

  /// How many times the tool ran for `system`.
  pub fn calls(&self, system: &str) -> u32 {
    fs::read_to_string(self.state.join(format!("calls-{system}")))
      .ok()
      .and_then(|s| s.trim().parse().ok())
      .unwrap_or(0)
  }

  /// Systems in invocation order.
  pub fn call_log(&self) -> Vec<String> {
    fs::read_to_string(self.state.join("calls.log"))
      .map(|s| s.lines().map(str::to_string).collect())
      .unwrap_or_default()
  }
}
