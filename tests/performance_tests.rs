use assert_cmd::cargo_bin;
use std::process::Command;
use tempfile::tempdir;

mod common;

#[test]
fn test_large_file_streaming() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("large_test.csv");
    common::generate_csv(&input, 5_000).expect("Failed to generate large CSV");

    let output = Command::new(cargo_bin!("unipay"))
        .arg(&input)
        .arg("--merchants")
        .arg(common::merchants_fixture())
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success(), "Binary failed to process 5000 orders");

    let stdout = String::from_utf8_lossy(&output.stdout);
    // Header + one response per order
    assert_eq!(stdout.lines().count(), 5_001);
    assert_eq!(
        stdout.lines().filter(|line| line.ends_with(",0,SUCCESS,SUCCESS")).count(),
        5_000
    );
}
