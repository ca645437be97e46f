//! E2E tests for the fsassets binary
//!
//! Each test points the binary at an isolated store through `--config`.

use std::path::Path;
use std::process::{Command, Output};

use fsa_config::testing::TestEnvironment;

fn fsassets(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_fsassets"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("FSASSETS_BASE_DIR")
        .env_remove("FSASSETS_SPOOL_DIR")
        .env_remove("FSASSETS_CATALOG")
        .output()
        .expect("Failed to execute fsassets")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn e2e_store_sweep_export() {
    let env = TestEnvironment::new().unwrap();
    let config = env.write_config(&env.config()).unwrap();

    let input = env.root().join("hello.txt");
    std::fs::write(&input, b"hello").unwrap();

    let output = fsassets(
        &config,
        &["store", input.to_str().unwrap(), "--id", "a1", "--type", "7"],
    );
    assert!(output.status.success(), "{:?}", output);
    assert_eq!(stdout(&output).trim(), "a1");

    let output = fsassets(&config, &["sweep"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("1 moved"));

    let exported = env.root().join("out.bin");
    let output = fsassets(&config, &["export", "a1", exported.to_str().unwrap()]);
    assert!(output.status.success());
    assert_eq!(std::fs::read(&exported).unwrap(), b"hello");
}

#[test]
fn e2e_store_generates_id() {
    let env = TestEnvironment::new().unwrap();
    let config = env.write_config(&env.config()).unwrap();

    let input = env.root().join("blob.bin");
    std::fs::write(&input, [1u8, 2, 3]).unwrap();

    let output = fsassets(&config, &["store", input.to_str().unwrap()]);
    assert!(output.status.success());
    let id = stdout(&output).trim().to_string();
    assert_eq!(id.len(), 36, "expected a UUID, got {id:?}");
}

#[test]
fn e2e_show_json_reports_counts() {
    let env = TestEnvironment::new().unwrap();
    let config = env.write_config(&env.config()).unwrap();

    let input = env.root().join("a.txt");
    std::fs::write(&input, b"same").unwrap();
    for id in ["x1", "x2"] {
        let output = fsassets(&config, &["store", input.to_str().unwrap(), "--id", id]);
        assert!(output.status.success());
    }

    let output = fsassets(&config, &["show", "--json"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("\"assets\": 2"), "{text}");
    assert!(text.contains("\"spool_backlog\": 1"), "{text}");
    assert!(text.contains("\"hash\": \"sha256\""), "{text}");
}

#[test]
fn e2e_export_missing_asset_fails() {
    let env = TestEnvironment::new().unwrap();
    let config = env.write_config(&env.config()).unwrap();

    let output = fsassets(&config, &["export", "nope", env.root().join("x").to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Asset not found"));
}
