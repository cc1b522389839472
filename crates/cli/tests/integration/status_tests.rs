use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn status_lists_published_snapshots() {
  let env = TestEnv::new();
  env.run_for("2024-01-01").assert().success();
  env.run_for("2024-01-02").assert().success();

  env
    .netbuild_cmd()
    .arg("status")
    .assert()
    .success()
    .stdout(predicate::str::contains("x86_64 → 2024-01-02"))
    .stdout(predicate::str::contains("Oldest: 2024-01-01"));
}

#[test]
fn status_json_reports_dates_and_latest() {
  let env = TestEnv::new();
  env.break_system("i686-linux");
  env.run_for("2024-01-01").assert().failure();

  let output = env
    .netbuild_cmd()
    .args(["status", "-o", "json"])
    .assert()
    .success()
    .get_output()
    .stdout
    .clone();

  let listings: serde_json::Value = serde_json::from_slice(&output).unwrap();
  assert_eq!(listings[0]["arch"], "x86_64");
  assert_eq!(listings[0]["dates"], serde_json::json!(["2024-01-01"]));
  assert_eq!(listings[0]["latest"], "2024-01-01");
  assert_eq!(listings[1]["arch"], "i386");
  assert_eq!(listings[1]["dates"], serde_json::json!([]));
  assert!(listings[1]["latest"].is_null());
}
