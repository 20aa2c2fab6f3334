//! # mirrorboard-sync
//!
//! The reconciliation pipeline and the production collaborators it runs
//! against.
//!
//! Call [`Reconciler::run_pass`] to bring the board in line with the remote
//! directory once. The daemon calls it from its debounced worker; `mirrorboard
//! sync` calls it directly.

pub mod children;
pub mod diff;
pub mod error;
pub mod fetch;
pub mod file_store;
pub mod http;
pub mod pass;
pub mod registry;
pub mod sanitize;
pub mod status;

pub use diff::{diff, Changes};
pub use error::SyncError;
pub use file_store::FileBoard;
pub use http::HttpDirectory;
pub use pass::{PassOutcome, PassReport, ReconcileOptions, Reconciler, TriggerSource};
pub use registry::{ParentRegistry, ParentSummary, TrackedParent};
