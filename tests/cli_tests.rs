//! CLI integration tests
//!
//! These tests verify the CLI commands work correctly by running the binary.

#![cfg(feature = "cli")]

use std::path::PathBuf;
use std::process::{Command, Output};

fn contentmodel_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_contentmodel"))
}

fn fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path.to_string_lossy().into_owned()
}

fn run(args: &[&str]) -> Output {
    Command::new(contentmodel_bin())
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to execute command")
}

// ============================================================================
// Compile Command Tests
// ============================================================================

#[test]
fn test_cli_compile_to_stdout() {
    let output = run(&["compile", &fixture("book.json")]);
    assert!(output.status.success(), "compile should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let value: serde_json::Value = serde_json::from_str(stdout.trim()).expect("compact JSON");
    let tags = value[0].as_array().expect("tag list");
    assert_eq!(tags[0], "book");
    assert_eq!(tags.len(), 12);
    assert_eq!(value[2].as_array().map(Vec::len), Some(12));
    assert_eq!(value[3], 0);
}

#[test]
fn test_cli_compile_then_validate_compact() {
    let dir = std::env::temp_dir().join(format!("contentmodel-cli-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let compiled = dir.join("book.compact.json");

    let output = run(&[
        "compile",
        &fixture("book.json"),
        "--output",
        compiled.to_str().unwrap(),
        "--pretty",
    ]);
    assert!(output.status.success(), "compile should succeed");

    let output = run(&[
        "validate",
        "--schema",
        compiled.to_str().unwrap(),
        &fixture("book_valid.xml"),
    ]);
    assert!(output.status.success(), "compact schema should validate the document");

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_cli_compile_missing_file() {
    let output = run(&["compile", "does-not-exist.json"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error"));
}

// ============================================================================
// Validate Command Tests
// ============================================================================

#[test]
fn test_cli_validate_valid() {
    let output = run(&["validate", "-s", &fixture("book.json"), &fixture("book_valid.xml")]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "validate should succeed");
    assert!(stdout.contains("Document is valid"));
}

#[test]
fn test_cli_validate_invalid() {
    let output = run(&["validate", "-s", &fixture("book.json"), &fixture("book_invalid.xml")]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(!output.status.success(), "invalid document should fail");
    assert!(stdout.contains("Document is invalid"));
    assert_eq!(stdout.lines().filter(|l| l.starts_with("  - ")).count(), 4);
}

#[test]
fn test_cli_validate_lax_mode() {
    let output = run(&[
        "validate",
        "-s",
        &fixture("book.json"),
        "--mode",
        "lax",
        &fixture("book_invalid.xml"),
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(!output.status.success());
    assert_eq!(stdout.lines().filter(|l| l.starts_with("  - ")).count(), 3);
}

#[test]
fn test_cli_validate_bad_mode() {
    let output = run(&[
        "validate",
        "-s",
        &fixture("book.json"),
        "--mode",
        "paranoid",
        &fixture("book_valid.xml"),
    ]);
    assert!(!output.status.success());
}

// ============================================================================
// Check Command Tests
// ============================================================================

#[test]
fn test_cli_check() {
    let output = run(&["check", &fixture("book.json")]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "check should succeed");
    assert!(stdout.contains("Elements: 12"));
    assert!(stdout.contains("Start element: book"));
    assert!(stdout.contains("front (container) -> title, author"));
    assert!(stdout.contains("No design findings"));
}

// ============================================================================
// Insert-pos Command Tests
// ============================================================================

#[test]
fn test_cli_insert_pos() {
    let schema = fixture("book.json");
    let output = run(&[
        "insert-pos",
        "-s",
        &schema,
        "--parent",
        "book",
        "--children",
        "front,chapter",
        "--tag",
        "index",
    ]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "2");

    let output = run(&[
        "insert-pos",
        "-s",
        &schema,
        "--parent",
        "book",
        "--children",
        "front,chapter",
        "--tag",
        "chapter",
    ]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "1");

    let output = run(&[
        "insert-pos",
        "-s",
        &schema,
        "--parent",
        "book",
        "--children",
        "front,chapter",
        "--tag",
        "chapter",
        "--last",
    ]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "2");
}

#[test]
fn test_cli_insert_pos_rejected() {
    let output = run(&[
        "insert-pos",
        "-s",
        &fixture("book.json"),
        "--parent",
        "book",
        "--children",
        "front,chapter",
        "--tag",
        "front",
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("cannot be inserted"));
}
