//! CLI integration tests. Each test drives the `netbuild` binary against a
//! fake build tool in its own temporary tree.

mod common;
mod run_tests;
mod status_tests;
mod verify_tests;
