// File: tests/cli.rs
//! End-to-end tests for the sniffle binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

const FIREFOX: &str = "Mozilla/5.0 (Windows NT 10.0; rv:54.0) Gecko/20100101 Firefox/54.0";

fn sniffle(store: &Path) -> Command {
    let mut cmd = Command::cargo_bin("sniffle").expect("sniffle binary should exist");
    cmd.env_remove("SNIFFLE_STORE")
        .env_remove("SNIFFLE_DICTIONARY")
        .env_remove("SNIFFLE_CONCURRENCY")
        .arg("--store")
        .arg(store);
    cmd
}

#[test]
fn train_classify_untrain_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("sniffle.db");

    sniffle(&store)
        .args(["train", FIREFOX, "name", "Firefox"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Learned 1 user agent: Name -> Firefox"));

    sniffle(&store)
        .args(["classify", FIREFOX])
        .assert()
        .success()
        .stdout(predicate::str::contains("Name: Firefox [1000]"));

    sniffle(&store)
        .args(["untrain", FIREFOX, "name", "*"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Unlearned 1 user agent"));

    sniffle(&store)
        .args(["classify", FIREFOX])
        .assert()
        .success()
        .stdout(predicate::str::contains("Unknown!"));
}

#[test]
fn unknown_attribute_fails() {
    let dir = tempfile::tempdir().unwrap();
    sniffle(&dir.path().join("sniffle.db"))
        .args(["train", FIREFOX, "color", "Red"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown attribute id: color"));
}

#[test]
fn tokenize_prints_tokens() {
    let dir = tempfile::tempdir().unwrap();
    sniffle(&dir.path().join("sniffle.db"))
        .args(["tokenize", FIREFOX])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"Windows NT 10.0\""))
        .stdout(predicate::str::contains("\"Firefox\""))
        .stdout(predicate::str::contains("\"54.0\"").not());
}

#[test]
fn import_test_and_export() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("sniffle.db");
    let data = dir.path().join("labeled.json");

    let mut dataset = serde_json::Map::new();
    for version in 50..60 {
        dataset.insert(
            format!("Mozilla/5.0 (Windows NT 10.0; rv:{version}.0) Gecko/20100101 Firefox/{version}.0"),
            serde_json::json!({ "name": "Firefox", "engine": "Gecko" }),
        );
        dataset.insert(
            format!("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_12_6) AppleWebKit/603.3.8 (KHTML, like Gecko) Version/{version}.1 Safari/603.3.8"),
            serde_json::json!({ "name": "Safari", "os": "Mac OS X" }),
        );
    }
    std::fs::write(&data, serde_json::to_string(&dataset).unwrap()).unwrap();

    sniffle(&store)
        .arg("import")
        .arg(&data)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 20 user agents."));

    sniffle(&store)
        .arg("test")
        .arg(&data)
        .assert()
        .success()
        .stdout(predicate::str::contains("Success rate: 100%"));

    let output = sniffle(&store).arg("export").assert().success().get_output().stdout.clone();
    let exported: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(exported.as_object().unwrap().len(), 20);
}

#[test]
fn scores_lists_categories() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("sniffle.db");

    sniffle(&store).args(["train", FIREFOX, "os", "Windows"]).assert().success();
    sniffle(&store)
        .args(["scores", "Mozilla/5.0 (Windows NT 10.0) Chrome/60.0", "os"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Windows: "));
}

#[test]
fn store_path_is_read_from_the_environment() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("from-env.db");

    Command::cargo_bin("sniffle")
        .unwrap()
        .env("SNIFFLE_STORE", &store)
        .args(["train", FIREFOX, "name", "Firefox"])
        .assert()
        .success();

    assert!(store.exists());
    sniffle(&store)
        .args(["classify", FIREFOX])
        .assert()
        .success()
        .stdout(predicate::str::contains("Name: Firefox [1000]"));
}

#[test]
fn help_lists_environment_variables() {
    Command::cargo_bin("sniffle")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("SNIFFLE_STORE"))
        .stdout(predicate::str::contains("SNIFFLE_CONCURRENCY"));
}
