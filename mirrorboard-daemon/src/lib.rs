//! Reconciliation daemon: debounced pass worker, timer, board watcher and
//! socket server.

mod error;
pub mod paths;
pub mod protocol;
mod runtime;
pub mod scheduler;

pub use error::DaemonError;
pub use protocol::{
    request_status, request_stop, request_sync, send_request, DaemonCommand, DaemonRequest,
    DaemonResponse,
};
pub use runtime::{init_tracing, run, start_blocking, DaemonState, PassResult, PassScheduler};
pub use scheduler::{Batch, Scheduler, SchedulerWorker};
