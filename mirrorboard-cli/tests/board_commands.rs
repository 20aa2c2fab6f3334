mod common;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

use common::mirrorboard_cmd;
use mirrorboard_core::{board, config, EngineConfig};

fn init(home: &TempDir) {
    mirrorboard_cmd(home.path()).arg("init").assert().success();
}

fn status_json(home: &TempDir) -> serde_json::Value {
    let assert = mirrorboard_cmd(home.path())
        .args(["status", "--json"])
        .assert()
        .success();
    serde_json::from_slice(&assert.get_output().stdout).expect("status json")
}

#[test]
fn init_creates_config_and_board_once() {
    let home = TempDir::new().expect("home");

    mirrorboard_cmd(home.path())
        .arg("init")
        .assert()
        .success()
        .stdout(contains("Created board"));
    assert!(home.path().join(".mirrorboard/config.yaml").exists());
    assert!(home.path().join(".mirrorboard/board.yaml").exists());

    mirrorboard_cmd(home.path())
        .arg("init")
        .assert()
        .success()
        .stdout(contains("Board already present"))
        .stdout(contains("Config already present"));
}

#[test]
fn parents_are_added_with_increasing_ids_and_removed() {
    let home = TempDir::new().expect("home");
    init(&home);

    mirrorboard_cmd(home.path())
        .args(["parent", "add", "https://hosts.example/db", "--x", "40", "--y", "-10"])
        .assert()
        .success()
        .stdout(contains("Added parent 1"));
    mirrorboard_cmd(home.path())
        .args(["parent", "add", "api svc"])
        .assert()
        .success()
        .stdout(contains("Added parent 2 tracking 'svc'"));

    let doc = board::load_at(home.path()).expect("board");
    assert_eq!(doc.nodes.len(), 2);
    assert_eq!(doc.nodes[0].placement.x, 40.0);
    assert_eq!(doc.nodes[0].placement.y, -10.0);

    let status = status_json(&home);
    let parents = status["parents"].as_array().expect("parents");
    assert_eq!(parents.len(), 2);
    assert_eq!(parents[0]["identity"], "https://hosts.example/db");
    assert_eq!(parents[0]["status"], "unknown");
    assert_eq!(status["daemon_running"], false);

    mirrorboard_cmd(home.path())
        .args(["parent", "remove", "1"])
        .assert()
        .success();
    assert_eq!(board::load_at(home.path()).expect("board").nodes.len(), 1);

    mirrorboard_cmd(home.path())
        .args(["parent", "remove", "99"])
        .assert()
        .failure()
        .stderr(contains("node not found"));
}

#[test]
fn blank_label_is_rejected() {
    let home = TempDir::new().expect("home");
    init(&home);
    mirrorboard_cmd(home.path())
        .args(["parent", "add", "   "])
        .assert()
        .failure()
        .stderr(contains("does not name anything"));
}

#[test]
fn selection_must_name_existing_nodes_and_can_be_cleared() {
    let home = TempDir::new().expect("home");
    init(&home);
    mirrorboard_cmd(home.path())
        .args(["parent", "add", "db"])
        .assert()
        .success();

    mirrorboard_cmd(home.path())
        .args(["select", "42"])
        .assert()
        .failure()
        .stderr(contains("node not found: 42"));

    mirrorboard_cmd(home.path())
        .args(["select", "1"])
        .assert()
        .success()
        .stdout(contains("passes paused"));
    assert_eq!(status_json(&home)["selection"], serde_json::json!(["1"]));

    mirrorboard_cmd(home.path())
        .args(["select", "--clear"])
        .assert()
        .success()
        .stdout(contains("Selection cleared"));
    assert!(board::load_at(home.path()).expect("board").selection.is_empty());
}

#[test]
fn status_on_empty_board_suggests_adding_a_parent() {
    let home = TempDir::new().expect("home");
    init(&home);
    mirrorboard_cmd(home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(contains("No parents on the board."));
}

#[test]
fn daemon_status_reports_not_running() {
    let home = TempDir::new().expect("home");
    let assert = mirrorboard_cmd(home.path())
        .args(["daemon", "status"])
        .assert()
        .success();
    let value: serde_json::Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("json");
    assert_eq!(value["running"], false);

    mirrorboard_cmd(home.path())
        .args(["daemon", "stop"])
        .assert()
        .success()
        .stdout(contains("daemon is not running"));
}

#[test]
fn parent_add_strips_the_configured_decoration() {
    let home = TempDir::new().expect("home");
    init(&home);
    let custom = EngineConfig {
        decoration: "ERROR".to_string(),
        ..EngineConfig::default()
    };
    config::save_at(home.path(), &custom).expect("config");

    mirrorboard_cmd(home.path())
        .args(["parent", "add", "ERROR db"])
        .assert()
        .success()
        .stdout(contains("tracking 'db'"));
}
