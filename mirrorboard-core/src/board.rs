//! On-disk board document.
//!
//! # Storage layout
//!
//! ```text
//! ~/.mirrorboard/
//!   board.yaml      (nodes + selection, mode 0600)
//!   config.yaml     (optional engine configuration)
//! ```
//!
//! # API pattern
//!
//! Every function has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{io_err, BoardError};
use crate::types::{Node, NodeId};

pub const BOARD_VERSION: u32 = 1;
pub const BOARD_FILE: &str = "board.yaml";

/// Root of the board YAML document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub version: u32,
    #[serde(default)]
    pub nodes: Vec<Node>,
    /// Ids the user currently has selected or is editing.
    #[serde(default)]
    pub selection: Vec<NodeId>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Board {
    fn default() -> Self {
        Self {
            version: BOARD_VERSION,
            nodes: vec![],
            selection: vec![],
            updated_at: Utc::now(),
        }
    }
}

impl Board {
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    /// One past the largest numeric id on the board, so hand-added nodes
    /// sort after everything already present.
    pub fn next_node_id(&self) -> NodeId {
        let next = self
            .nodes
            .iter()
            .filter_map(|n| n.id.0.parse::<u64>().ok())
            .max()
            .map_or(1, |max| max + 1);
        NodeId::from(next.to_string())
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<home>/.mirrorboard/`
pub fn root_at(home: &Path) -> PathBuf {
    home.join(".mirrorboard")
}

/// `<home>/.mirrorboard/board.yaml`. Pure, no I/O.
pub fn board_path_at(home: &Path) -> PathBuf {
    root_at(home).join(BOARD_FILE)
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load the board. A missing file yields an empty board.
pub fn load_at(home: &Path) -> Result<Board, BoardError> {
    load_file(&board_path_at(home))
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Board, BoardError> {
    load_at(&home()?)
}

/// Load a board from an explicit file path.
pub fn load_file(path: &Path) -> Result<Board, BoardError> {
    if !path.exists() {
        return Ok(Board::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    parse(path, &contents)
}

/// Parse board YAML, attributing errors to `path`.
pub fn parse(path: &Path, contents: &str) -> Result<Board, BoardError> {
    serde_yaml::from_str(contents).map_err(|e| BoardError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Render a board to the exact bytes [`save_file`] writes.
pub fn render(board: &Board) -> Result<String, BoardError> {
    Ok(serde_yaml::to_string(board)?)
}

/// Atomically save the board to `<home>/.mirrorboard/board.yaml`.
pub fn save_at(home: &Path, board: &Board) -> Result<String, BoardError> {
    save_file(&board_path_at(home), board)
}

/// `save_at` convenience wrapper.
pub fn save(board: &Board) -> Result<String, BoardError> {
    save_at(&home()?, board)
}

/// Atomically save to `path` and return the rendered contents.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
/// The tmp file lives next to the target so the rename never crosses a
/// filesystem boundary.
pub fn save_file(path: &Path, board: &Board) -> Result<String, BoardError> {
    if let Some(dir) = path.parent() {
        if !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
            set_dir_permissions(dir)?;
        }
    }
    let tmp = tmp_path(path);
    let yaml = render(board)?;
    std::fs::write(&tmp, &yaml).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(yaml)
}

fn tmp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| BOARD_FILE.to_string());
    path.with_file_name(format!("{name}.tmp"))
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

pub(crate) fn home() -> Result<PathBuf, BoardError> {
    dirs::home_dir().ok_or(BoardError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), BoardError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), BoardError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), BoardError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), BoardError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn board_path_is_correct() {
        let home = TempDir::new().expect("tempdir");
        assert!(board_path_at(home.path()).ends_with(".mirrorboard/board.yaml"));
    }

    #[test]
    fn missing_board_loads_empty() {
        let home = TempDir::new().expect("tempdir");
        let board = load_at(home.path()).expect("load");
        assert_eq!(board.version, BOARD_VERSION);
        assert!(board.nodes.is_empty());
        assert!(board.selection.is_empty());
    }

    #[test]
    fn save_and_load_roundtrip_keeps_nodes() {
        let home = TempDir::new().expect("tempdir");
        let mut board = Board::default();
        board.nodes.push(Node::parent("1", "https://hosts.example/apps"));
        board.nodes.push(Node::child("2", "1", "i1", "app-1"));
        save_at(home.path(), &board).expect("save");

        let loaded = load_at(home.path()).expect("load");
        assert_eq!(loaded.nodes, board.nodes);
    }

    #[test]
    fn save_cleans_up_tmp_and_sets_mode() {
        let home = TempDir::new().expect("tempdir");
        save_at(home.path(), &Board::default()).expect("save");
        let path = board_path_at(home.path());
        assert!(!path.with_file_name("board.yaml.tmp").exists());
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).expect("meta").permissions().mode() & 0o777;
            assert_eq!(mode, 0o600);
        }
    }

    #[test]
    fn save_returns_written_contents() {
        let home = TempDir::new().expect("tempdir");
        let written = save_at(home.path(), &Board::default()).expect("save");
        let on_disk = std::fs::read_to_string(board_path_at(home.path())).expect("read");
        assert_eq!(written, on_disk);
    }

    #[test]
    fn next_node_id_follows_largest_numeric_id() {
        let mut board = Board::default();
        assert_eq!(board.next_node_id(), NodeId::from("1"));
        board.nodes.push(Node::parent("9", "a"));
        board.nodes.push(Node::parent("10", "b"));
        board.nodes.push(Node::child("3f2a-uuid", "9", "i1", "x"));
        assert_eq!(board.next_node_id(), NodeId::from("11"));
    }

    #[test]
    fn home_not_found_error_message() {
        assert!(BoardError::HomeNotFound.to_string().contains("home directory"));
    }
}
