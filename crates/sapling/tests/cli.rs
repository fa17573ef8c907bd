//! End-to-end runs of the `sapling` binary.
#![cfg(feature = "cli")]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const LIST: &str = r#"{
  "name": "list",
  "rules": {
    "list": {
      "type": "SEQ",
      "members": [
        { "type": "STRING", "value": "[" },
        {
          "type": "REPEAT",
          "content": { "type": "SYMBOL", "name": "item" }
        },
        { "type": "STRING", "value": "]" }
      ]
    },
    "item": { "type": "PATTERN", "value": "[a-z]+" }
  }
}"#;

fn workspace(source: &str) -> (TempDir, PathBuf, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let grammar = dir.path().join("grammar.json");
    let input = dir.path().join("input.txt");
    fs::write(&grammar, LIST).unwrap();
    fs::write(&input, source).unwrap();
    (dir, grammar, input)
}

fn sapling() -> Command {
    Command::cargo_bin("sapling").unwrap()
}

#[test]
fn test_compiles_grammar() {
    let (_dir, grammar, _) = workspace("");
    sapling()
        .arg(&grammar)
        .assert()
        .success()
        .stdout(predicate::eq("list: ok\n"));
}

#[test]
fn test_prints_tree() {
    let (_dir, grammar, input) = workspace("[a b]");
    sapling()
        .arg(&grammar)
        .arg("--source")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("(list (item) (item))"));
}

#[test]
fn test_prints_json_tree() {
    let (_dir, grammar, input) = workspace("[a]");
    sapling()
        .arg(&grammar)
        .arg("--source")
        .arg(&input)
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains("has_error").and(predicate::str::contains("item")));
}

#[test]
fn test_prints_stats() {
    let (_dir, grammar, _) = workspace("");
    sapling()
        .arg(&grammar)
        .arg("--stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("grammar: list").and(predicate::str::contains("states: ")));
}

#[test]
fn test_syntax_errors_fail() {
    let (_dir, grammar, input) = workspace("[a");
    sapling()
        .arg(&grammar)
        .arg("--source")
        .arg(&input)
        .assert()
        .failure()
        .stdout(predicate::str::contains("MISSING"))
        .stderr(predicate::str::contains("syntax errors"));
}

#[test]
fn test_verbose_logs_to_stderr() {
    let (_dir, grammar, input) = workspace("[a]");
    sapling()
        .arg(&grammar)
        .arg("--source")
        .arg(&input)
        .arg("--verbose")
        .assert()
        .success()
        .stdout(predicate::str::contains("(list (item))"))
        .stderr(predicate::str::contains("compiled grammar").and(predicate::str::contains("parsed")));
}

#[test]
fn test_quiet_by_default() {
    let (_dir, grammar, input) = workspace("[a]");
    sapling()
        .arg(&grammar)
        .arg("--source")
        .arg(&input)
        .assert()
        .success()
        .stderr(predicate::str::is_empty());
}

#[test]
fn test_missing_grammar_fails() {
    let dir = tempfile::tempdir().unwrap();
    sapling()
        .arg(dir.path().join("nope.json"))
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("error: cannot read"));
}
