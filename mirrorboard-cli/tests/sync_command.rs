mod common;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

use common::{children_of, label_of, mirrorboard_cmd, serve, Route};

fn board_with_parent(home: &TempDir, label: &str) {
    mirrorboard_cmd(home.path()).arg("init").assert().success();
    mirrorboard_cmd(home.path())
        .args(["parent", "add", label])
        .assert()
        .success();
}

#[test]
fn sync_mirrors_remote_instances_and_then_settles() {
    let base = serve(vec![Route::instances(
        "/db",
        &[("i1", "db-1"), ("i2", "db-2")],
    )]);
    let home = TempDir::new().expect("home");
    board_with_parent(&home, &format!("{base}/db"));

    mirrorboard_cmd(home.path())
        .arg("sync")
        .assert()
        .success()
        .stdout(contains("2 created"));

    let mut texts: Vec<String> = children_of(home.path(), "1")
        .into_iter()
        .map(|n| n.label)
        .collect();
    texts.sort();
    assert_eq!(texts, vec!["db-1", "db-2"]);
    assert_eq!(label_of(home.path(), "1"), format!("{base}/db"));

    mirrorboard_cmd(home.path())
        .arg("sync")
        .assert()
        .success()
        .stdout(contains("nothing to do"));
    assert_eq!(children_of(home.path(), "1").len(), 2);
}

#[test]
fn dry_run_reports_changes_and_writes_nothing() {
    let base = serve(vec![Route::instances("/db", &[("i1", "db-1")])]);
    let home = TempDir::new().expect("home");
    board_with_parent(&home, &format!("{base}/db"));
    let board_path = home.path().join(".mirrorboard/board.yaml");
    let before = std::fs::read_to_string(&board_path).expect("read board");

    mirrorboard_cmd(home.path())
        .args(["sync", "--dry-run"])
        .assert()
        .success()
        .stdout(contains("[dry-run]"))
        .stdout(contains("1 created"));

    let after = std::fs::read_to_string(&board_path).expect("read board");
    assert_eq!(before, after, "dry-run must not touch the board");
}

#[test]
fn failing_directory_decorates_parent_and_keeps_others_going() {
    let base = serve(vec![
        Route::failing("/down"),
        Route::instances("/up", &[("u1", "up-1")]),
    ]);
    let home = TempDir::new().expect("home");
    board_with_parent(&home, &format!("{base}/down"));
    mirrorboard_cmd(home.path())
        .args(["parent", "add", &format!("{base}/up")])
        .assert()
        .success();

    mirrorboard_cmd(home.path())
        .arg("sync")
        .assert()
        .success()
        .stdout(contains("fetch failed"));

    assert_eq!(label_of(home.path(), "1"), format!("🔴 {base}/down"));
    assert!(children_of(home.path(), "1").is_empty());
    assert_eq!(children_of(home.path(), "2").len(), 1);

    // The decorated label still names the same directory.
    mirrorboard_cmd(home.path())
        .args(["status", "--json"])
        .assert()
        .success()
        .stdout(contains(r#""status": "error""#));
}

#[test]
fn selection_skips_the_pass() {
    let base = serve(vec![Route::instances("/db", &[("i1", "db-1")])]);
    let home = TempDir::new().expect("home");
    board_with_parent(&home, &format!("{base}/db"));
    mirrorboard_cmd(home.path())
        .args(["select", "1"])
        .assert()
        .success();

    mirrorboard_cmd(home.path())
        .arg("sync")
        .assert()
        .success()
        .stdout(contains("pass skipped"));
    assert!(children_of(home.path(), "1").is_empty());
}

#[test]
fn json_output_carries_the_pass_report() {
    let base = serve(vec![Route::instances("/db", &[("i1", "db-1")])]);
    let home = TempDir::new().expect("home");
    board_with_parent(&home, &format!("{base}/db"));

    let assert = mirrorboard_cmd(home.path())
        .args(["sync", "--json"])
        .assert()
        .success();
    let report: serde_json::Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("json");
    assert_eq!(report["outcome"], "completed");
    assert_eq!(report["trigger"], "request");
    assert_eq!(report["children_created"], 1);
    assert_eq!(report["parents_started"], serde_json::json!([format!("{base}/db")]));
}
