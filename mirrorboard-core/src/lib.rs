//! Mirrorboard core library: board data model, collaborator contracts,
//! identity strategy, board persistence and engine configuration.
//!
//! - [`types`]: newtypes, nodes, instance records
//! - [`store`]: [`NodeStore`] / [`RemoteDirectory`] contracts and [`MemoryBoard`]
//! - [`identity`]: [`IdentityStrategy`] and the default [`LabelIdentity`]
//! - [`board`]: YAML board document, atomic load / save
//! - [`config`]: [`EngineConfig`]

pub mod board;
pub mod config;
pub mod error;
pub mod identity;
pub mod store;
pub mod types;

pub use board::Board;
pub use config::EngineConfig;
pub use error::{BoardError, FetchError, StoreError};
pub use identity::{IdentityStrategy, LabelIdentity};
pub use store::{ExternalChange, MemoryBoard, NodeStore, RemoteDirectory, StoreCounters};
pub use types::{
    ChildFields, ChildLayout, Identity, InstanceId, InstanceRecord, Node, NodeId, NodeKind,
    NodePatch, ParentStatus, Placement,
};
