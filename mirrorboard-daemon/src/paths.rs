use std::path::{Path, PathBuf};

use mirrorboard_core::{board, config};

pub const DAEMON_SOCKET: &str = "daemon.sock";

/// Set to `json` to emit newline-delimited JSON logs.
pub const LOG_FORMAT_ENV: &str = "MIRRORBOARD_LOG_FORMAT";

pub fn mirrorboard_root(home: &Path) -> PathBuf {
    board::root_at(home)
}

pub fn socket_path(home: &Path) -> PathBuf {
    mirrorboard_root(home).join(DAEMON_SOCKET)
}

pub fn board_path(home: &Path) -> PathBuf {
    board::board_path_at(home)
}

pub fn config_path(home: &Path) -> PathBuf {
    config::config_path_at(home)
}
