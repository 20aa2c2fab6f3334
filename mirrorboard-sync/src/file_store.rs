//! `FileBoard`: a [`NodeStore`] backed by `~/.mirrorboard/board.yaml`.
//!
//! Every mutation is load → modify → atomic save. The SHA-256 of the bytes
//! this process last wrote (or last observed) is remembered so that file
//! watcher events caused by our own writes are not reported as external
//! changes.

use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tokio::sync::broadcast;

use mirrorboard_core::{
    board::{self, Board},
    store::CHANGE_CHANNEL_CAPACITY,
    BoardError, ChildFields, ExternalChange, InstanceId, Node, NodeId, NodePatch, NodeStore,
    StoreError,
};

pub struct FileBoard {
    path: PathBuf,
    /// Digest of the last contents written or observed by this process.
    last_known: Mutex<String>,
    changes: broadcast::Sender<ExternalChange>,
}

impl FileBoard {
    /// Open the board under `<home>/.mirrorboard/`.
    pub fn open_at(home: &Path) -> Result<Self, StoreError> {
        Self::open_file(board::board_path_at(home))
    }

    /// Open a board at an explicit path. The file need not exist yet.
    pub fn open_file(path: PathBuf) -> Result<Self, StoreError> {
        let digest = digest(&read_or_empty(&path)?);
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self {
            path,
            last_known: Mutex::new(digest),
            changes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current board document.
    pub fn load(&self) -> Result<Board, StoreError> {
        Ok(board::load_file(&self.path)?)
    }

    /// Re-hash the file and publish an [`ExternalChange`] if it differs from
    /// what this process last wrote or saw. Returns whether a change was
    /// published.
    pub fn notice_file_change(&self) -> Result<bool, StoreError> {
        let current = digest(&read_or_empty(&self.path)?);
        {
            let mut last = self.last_known.lock();
            if *last == current {
                return Ok(false);
            }
            *last = current;
        }
        tracing::debug!(path = %self.path.display(), "board file changed externally");
        let _ = self
            .changes
            .send(ExternalChange::new(format!("{} modified", self.path.display())));
        Ok(true)
    }

    /// Host-side edit: mutate the board and announce it as an external change.
    pub fn edit<T>(
        &self,
        reason: &str,
        f: impl FnOnce(&mut Board) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let out = self.mutate(f)?;
        let _ = self.changes.send(ExternalChange::new(reason));
        Ok(out)
    }

    /// Core-side mutation: load, apply, save, remember the written digest.
    fn mutate<T>(&self, f: impl FnOnce(&mut Board) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let mut last = self.last_known.lock();
        let mut doc = board::load_file(&self.path)?;
        let out = f(&mut doc)?;
        doc.updated_at = Utc::now();
        let written = board::save_file(&self.path, &doc)?;
        *last = digest(&written);
        Ok(out)
    }
}

impl NodeStore for FileBoard {
    fn list_nodes(&self) -> Result<Vec<Node>, StoreError> {
        Ok(self.load()?.nodes)
    }

    fn create_child_node(
        &self,
        parent: &NodeId,
        instance: &InstanceId,
        fields: ChildFields,
    ) -> Result<NodeId, StoreError> {
        self.mutate(|doc| {
            if doc.node(parent).is_none() {
                return Err(StoreError::NodeNotFound(parent.clone()));
            }
            let id = NodeId::from(uuid::Uuid::new_v4().to_string());
            let mut node = Node::child(id.clone(), parent.clone(), instance.clone(), fields.label);
            node.placement = fields.placement;
            doc.nodes.push(node);
            Ok(id)
        })
    }

    fn update_nodes(&self, patches: &[NodePatch]) -> Result<(), StoreError> {
        self.mutate(|doc| {
            for patch in patches {
                let node = doc
                    .nodes
                    .iter_mut()
                    .find(|n| n.id == patch.id)
                    .ok_or_else(|| StoreError::NodeNotFound(patch.id.clone()))?;
                node.label = patch.label.clone();
            }
            Ok(())
        })
    }

    fn delete_nodes(&self, ids: &[NodeId]) -> Result<(), StoreError> {
        self.mutate(|doc| {
            doc.nodes.retain(|n| !ids.contains(&n.id));
            doc.selection.retain(|id| !ids.contains(id));
            Ok(())
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<ExternalChange> {
        self.changes.subscribe()
    }

    fn is_interacting(&self) -> Result<bool, StoreError> {
        Ok(!self.load()?.selection.is_empty())
    }
}

fn read_or_empty(path: &Path) -> Result<String, StoreError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(contents),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(StoreError::Board(BoardError::Io {
            path: path.to_path_buf(),
            source: err,
        })),
    }
}

fn digest(contents: &str) -> String {
    let mut h = Sha256::new();
    h.update(contents.as_bytes());
    hex::encode(h.finalize())
}

#[cfg(test)]
mod tests {
    use mirrorboard_core::Placement;
    use tempfile::TempDir;

    use super::*;

    fn seeded(home: &TempDir) -> FileBoard {
        let mut doc = Board::default();
        doc.nodes.push(Node::parent("1", "db"));
        board::save_at(home.path(), &doc).expect("seed");
        FileBoard::open_at(home.path()).expect("open")
    }

    #[test]
    fn own_writes_are_not_external_changes() {
        let home = TempDir::new().expect("home");
        let store = seeded(&home);
        let mut rx = store.subscribe();

        store
            .create_child_node(
                &NodeId::from("1"),
                &InstanceId::from("i1"),
                ChildFields {
                    label: "db-1".into(),
                    placement: Placement::default(),
                },
            )
            .expect("create");

        assert!(!store.notice_file_change().expect("notice"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn foreign_writes_are_reported_once() {
        let home = TempDir::new().expect("home");
        let store = seeded(&home);
        let mut rx = store.subscribe();

        let mut doc = board::load_at(home.path()).expect("load");
        doc.nodes.push(Node::parent("2", "web"));
        board::save_at(home.path(), &doc).expect("foreign save");

        assert!(store.notice_file_change().expect("notice"));
        assert!(!store.notice_file_change().expect("second notice"));
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn create_under_missing_parent_fails() {
        let home = TempDir::new().expect("home");
        let store = seeded(&home);
        let err = store
            .create_child_node(
                &NodeId::from("ghost"),
                &InstanceId::from("i1"),
                ChildFields {
                    label: "x".into(),
                    placement: Placement::default(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::NodeNotFound(_)));
    }

    #[test]
    fn delete_drops_selection_of_removed_nodes() {
        let home = TempDir::new().expect("home");
        let store = seeded(&home);
        store
            .edit("select", |doc| {
                doc.selection = vec![NodeId::from("1")];
                Ok(())
            })
            .expect("select");
        assert!(store.is_interacting().expect("interacting"));

        store.delete_nodes(&[NodeId::from("1")]).expect("delete");
        assert!(!store.is_interacting().expect("interacting"));
        assert!(store.list_nodes().expect("list").is_empty());
    }

    #[test]
    fn edits_publish_changes() {
        let home = TempDir::new().expect("home");
        let store = seeded(&home);
        let mut rx = store.subscribe();
        store
            .edit("add parent", |doc| {
                doc.nodes.push(Node::parent("2", "web"));
                Ok(())
            })
            .expect("edit");
        assert_eq!(rx.try_recv().expect("change").reason, "add parent");
        assert!(!store.notice_file_change().expect("notice"));
    }
}
