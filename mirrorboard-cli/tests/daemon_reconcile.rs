mod common;

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

use assert_cmd::prelude::*;
use tempfile::TempDir;

use common::{children_of, mirrorboard_cmd, serve, Route};
use mirrorboard_core::config::{self, EngineConfig};

struct DaemonProcess {
    child: Child,
    home: PathBuf,
}

impl DaemonProcess {
    fn start(home: PathBuf) -> Self {
        let child = mirrorboard_cmd(&home)
            .args(["daemon", "start"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn daemon");
        Self { child, home }
    }

    fn stop(&mut self) {
        let _ = mirrorboard_cmd(&self.home).args(["daemon", "stop"]).status();

        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if let Ok(Some(_)) = self.child.try_wait() {
                return;
            }
            sleep(Duration::from_millis(50));
        }

        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for DaemonProcess {
    fn drop(&mut self) {
        self.stop();
    }
}

fn daemon_status(home: &Path) -> Option<serde_json::Value> {
    let output = mirrorboard_cmd(home).args(["daemon", "status"]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    serde_json::from_slice(&output.stdout).ok()
}

fn daemon_running(home: &Path) -> bool {
    daemon_status(home)
        .and_then(|v| v.get("running").and_then(|r| r.as_bool()))
        .unwrap_or(false)
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(100));
    }
    false
}

#[test]
fn board_edit_is_reconciled_by_running_daemon() {
    let base = serve(vec![Route::instances("/db", &[("i1", "db-1")])]);
    let home = TempDir::new().expect("home");
    mirrorboard_cmd(home.path()).arg("init").assert().success();
    config::save_at(
        home.path(),
        &EngineConfig {
            tick_interval_ms: 200,
            ..EngineConfig::default()
        },
    )
    .expect("fast config");

    let mut daemon = DaemonProcess::start(home.path().to_path_buf());
    assert!(
        wait_until(Duration::from_secs(5), || daemon_running(home.path())),
        "daemon did not report running state in time",
    );

    mirrorboard_cmd(home.path())
        .args(["parent", "add", &format!("{base}/db")])
        .assert()
        .success();

    let mirrored = wait_until(Duration::from_secs(10), || {
        children_of(home.path(), "1").len() == 1
    });
    assert!(mirrored, "daemon did not create the child within timeout");

    let output = mirrorboard_cmd(home.path())
        .args(["daemon", "sync"])
        .output()
        .expect("daemon sync");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let outcome: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(outcome["outcome"], "completed");
    assert_eq!(outcome["children_created"], 0, "second pass is a no-op");

    let status = daemon_status(home.path()).expect("status");
    assert_eq!(status["tracked"][0]["identity"], format!("{base}/db"));
    assert_eq!(status["tracked"][0]["status"], "ok");
    assert_eq!(status["tracked"][0]["children"], 1);

    daemon.stop();
    assert!(!home.path().join(".mirrorboard/daemon.sock").exists());
}
