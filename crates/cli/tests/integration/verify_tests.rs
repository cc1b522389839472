use std::fs;

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn verify_latest_passes_after_run() {
  let env = TestEnv::new();
  env.run_for("2024-01-01").assert().success();
  env.run_for("2024-01-02").assert().success();

  env
    .netbuild_cmd()
    .args(["verify", "x86_64"])
    .assert()
    .success()
    .stdout(predicate::str::contains("vmlinuz: OK"))
    .stdout(predicate::str::contains("netboot.ipxe: OK"));
}

#[test]
fn verify_detects_tampering() {
  let env = TestEnv::new();
  env.run_for("2024-01-01").assert().success();
  fs::write(env.public_path().join("x86_64/2024-01-01/initrd"), "tampered").unwrap();

  env
    .netbuild_cmd()
    .args(["verify", "x86_64", "2024-01-01"])
    .assert()
    .failure()
    .stdout(predicate::str::contains("vmlinuz: OK"))
    .stderr(predicate::str::contains("initrd: FAILED"))
    .stderr(predicate::str::contains("1 file(s) failed verification"));
}

#[test]
fn verify_json_output_is_valid() {
  let env = TestEnv::new();
  env.run_for("2024-01-01").assert().success();

  let output = env
    .netbuild_cmd()
    .args(["verify", "i386", "latest", "-o", "json"])
    .assert()
    .success()
    .get_output()
    .stdout
    .clone();

  let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
  assert_eq!(report["arch"], "i386");
  assert_eq!(report["date"], "2024-01-01");
  let statuses: Vec<_> = report["entries"]
    .as_array()
    .unwrap()
    .iter()
    .map(|e| e["status"].as_str().unwrap().to_string())
    .collect();
  assert_eq!(statuses, vec!["ok", "ok", "ok"]);
}
