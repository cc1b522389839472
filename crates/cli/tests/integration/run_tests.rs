use std::fs;
use std::path::PathBuf;

use predicates::prelude::*;

use netbuild_lib::run_lock::RunLock;

use super::common::TestEnv;

fn is_symlink(path: &std::path::Path) -> bool {
  fs::symlink_metadata(path).unwrap().file_type().is_symlink()
}

#[test]
fn first_run_publishes_real_copies() {
  let env = TestEnv::new();

  env
    .run_for("2024-01-01")
    .assert()
    .success()
    .stdout(predicate::str::contains("x86_64: published 2024-01-01"))
    .stdout(predicate::str::contains("i386: published 2024-01-01"))
    .stderr(predicate::str::contains("successfully built 2024-01-01 images"));

  let day = env.public_path().join("x86_64/2024-01-01");
  for name in ["vmlinuz", "initrd", "netboot.ipxe", "sha256sum.txt"] {
    assert!(day.join(name).is_file(), "{name} missing");
    assert!(!is_symlink(&day.join(name)));
  }
  assert_eq!(
    fs::read_to_string(day.join("vmlinuz")).unwrap(),
    "bzImage for x86_64-linux, version 1\n"
  );
  assert_eq!(
    fs::read_link(env.public_path().join("x86_64/latest")).unwrap(),
    PathBuf::from("2024-01-01")
  );
  assert_eq!(env.build_calls(), vec!["x86_64-linux", "i686-linux"]);
}

#[test]
fn unchanged_next_day_is_linked() {
  let env = TestEnv::new();
  env.run_for("2024-01-01").assert().success();

  env
    .run_for("2024-01-02")
    .assert()
    .success()
    .stdout(predicate::str::contains("0 copied, 3 linked"));

  let day2 = env.public_path().join("i386/2024-01-02");
  for name in ["vmlinuz", "initrd", "netboot.ipxe"] {
    assert_eq!(
      fs::read_link(day2.join(name)).unwrap(),
      PathBuf::from(format!("../2024-01-01/{name}"))
    );
  }
  assert_eq!(
    fs::read_to_string(day2.join("sha256sum.txt")).unwrap(),
    fs::read_to_string(env.public_path().join("i386/2024-01-01/sha256sum.txt")).unwrap()
  );
  assert_eq!(
    fs::read_link(env.public_path().join("i386/latest")).unwrap(),
    PathBuf::from("2024-01-02")
  );
}

#[test]
fn changed_content_is_copied() {
  let env = TestEnv::new();
  env.run_for("2024-01-01").assert().success();
  env.set_version(2);

  env
    .run_for("2024-01-02")
    .assert()
    .success()
    .stdout(predicate::str::contains("3 copied, 0 linked"));

  let kernel = env.public_path().join("x86_64/2024-01-02/vmlinuz");
  assert!(!is_symlink(&kernel));
  assert_eq!(
    fs::read_to_string(kernel).unwrap(),
    "bzImage for x86_64-linux, version 2\n"
  );
}

#[test]
fn rerun_same_day_keeps_manifest() {
  let env = TestEnv::new();
  env.run_for("2024-01-01").assert().success();
  let manifest = env.public_path().join("x86_64/2024-01-01/sha256sum.txt");
  let before = fs::read(&manifest).unwrap();

  env.run_for("2024-01-01").assert().success();

  assert_eq!(fs::read(&manifest).unwrap(), before);
}

#[test]
fn failed_architecture_fails_the_run_but_not_the_others() {
  let env = TestEnv::new();
  env.break_system("x86_64-linux");

  env
    .run_for("2024-01-01")
    .assert()
    .failure()
    .stdout(predicate::str::contains("i386: published 2024-01-01"))
    .stderr(predicate::str::contains("x86_64: build failed after 3 attempt(s)"))
    .stderr(predicate::str::contains("builder for 'x86_64-linux' failed"))
    .stderr(predicate::str::contains("1 of 2 architecture(s) failed"))
    .stderr(predicate::str::contains("successfully built").not());

  assert_eq!(
    env.build_calls(),
    vec!["x86_64-linux", "x86_64-linux", "x86_64-linux", "i686-linux"]
  );
  assert!(!env.public_path().join("x86_64/latest").exists());
  assert!(env.public_path().join("i386/latest/vmlinuz").is_file());
}

#[test]
fn run_json_output_is_valid() {
  let env = TestEnv::new();

  let output = env
    .run_for("2024-01-01")
    .args(["-o", "json"])
    .assert()
    .success()
    .get_output()
    .stdout
    .clone();

  let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
  assert_eq!(report["date"], "2024-01-01");
  let results = report["results"].as_array().unwrap();
  assert_eq!(results.len(), 2);
  assert_eq!(results[0]["arch"], "x86_64");
  assert_eq!(results[0]["status"], "published");
  assert_eq!(results[0]["attempts"], 1);
  assert_eq!(results[0]["snapshot"]["files"][0]["name"], "vmlinuz");
  assert_eq!(results[0]["snapshot"]["files"][0]["placement"], "copied");
}

#[test]
fn overlapping_run_is_skipped() {
  let env = TestEnv::new();
  let _held = RunLock::acquire(&env.work_path(), "run").unwrap();

  env
    .run_for("2024-01-01")
    .assert()
    .success()
    .stderr(predicate::str::contains("Skipping run"));

  assert!(env.build_calls().is_empty());
  assert!(!env.public_path().exists());
}

#[test]
fn lock_is_released_after_run() {
  let env = TestEnv::new();
  env.run_for("2024-01-01").assert().success();

  assert!(RunLock::acquire(&env.work_path(), "after").is_ok());
}

#[test]
fn backfilling_an_older_date_leaves_newer_snapshots_alone() {
  let env = TestEnv::new();
  env.run_for("2024-01-02").assert().success();
  env.run_for("2024-01-03").assert().success();
  env.set_version(2);

  env
    .run_for("2024-01-02")
    .assert()
    .failure()
    .stderr(predicate::str::contains("x86_64: publish failed"))
    .stderr(predicate::str::contains("a newer snapshot from 2024-01-03 already exists"));

  assert_eq!(
    fs::read_to_string(env.public_path().join("x86_64/2024-01-03/vmlinuz")).unwrap(),
    "bzImage for x86_64-linux, version 1\n"
  );
  assert_eq!(
    fs::read_link(env.public_path().join("x86_64/latest")).unwrap(),
    PathBuf::from("2024-01-03")
  );
  env.netbuild_cmd().args(["verify", "x86_64", "2024-01-03"]).assert().success();
}
