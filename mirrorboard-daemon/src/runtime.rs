use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, RwLock};

use mirrorboard_core::{board::BOARD_FILE, config, ExternalChange, NodeStore};
use mirrorboard_sync::{
    FileBoard, HttpDirectory, ParentSummary, PassOutcome, Reconciler, TriggerSource,
};

use crate::error::{io_err, DaemonError};
use crate::paths::{board_path, mirrorboard_root, socket_path, LOG_FORMAT_ENV};
use crate::protocol::{DaemonCommand, DaemonRequest, DaemonResponse};
use crate::scheduler::{Scheduler, SchedulerWorker};

/// Result handed to every caller served by one pass. Errors are rendered to
/// strings so the result can be shared between callers.
pub type PassResult = Result<PassOutcome, String>;

pub type PassScheduler = Scheduler<TriggerSource, PassResult>;

/// What the socket `status` command reports.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DaemonState {
    pub started_at_unix: u64,
    pub passes: u64,
    pub last_pass_at_unix: Option<u64>,
    pub last_outcome: Option<PassOutcome>,
    pub last_error: Option<String>,
    pub tracked: Vec<ParentSummary>,
}

pub type SharedState = Arc<RwLock<DaemonState>>;

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf()))
}

/// Run the daemon runtime against `<home>/.mirrorboard/`.
pub async fn run(home: PathBuf) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&home)?;

    let config = config::load_at(&home)?;
    let store = Arc::new(FileBoard::open_at(&home)?);
    let directory = Arc::new(HttpDirectory::new(config.fetch_timeout()));
    let reconciler = Reconciler::from_config(store.clone(), directory, &config);
    tracing::info!(
        board = %store.path().display(),
        tick_ms = config.tick_interval_ms,
        fetch_timeout_ms = config.fetch_timeout_ms,
        "daemon starting"
    );

    let state: SharedState = Arc::new(RwLock::new(DaemonState {
        started_at_unix: unix_seconds_now(),
        ..DaemonState::default()
    }));
    let (scheduler, worker) = PassScheduler::new();
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    // Subscribe before the first pass so no edit slips between them.
    let changes = store.subscribe();
    drop(scheduler.enqueue(TriggerSource::Startup));

    let worker_handle = {
        let shutdown = shutdown_tx.clone();
        let state = state.clone();
        tokio::spawn(async move {
            let result = pass_worker_task(reconciler, worker, state, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let ticker_handle = {
        let shutdown = shutdown_tx.clone();
        let scheduler = scheduler.clone();
        let period = config.tick_interval();
        tokio::spawn(async move {
            let result = ticker_task(scheduler, period, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let change_handle = {
        let shutdown = shutdown_tx.clone();
        let scheduler = scheduler.clone();
        tokio::spawn(async move {
            let result = change_listener_task(changes, scheduler, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let watcher_handle = {
        let shutdown = shutdown_tx.clone();
        let store = store.clone();
        tokio::spawn(async move {
            let result = watcher_task(store, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let home = home.clone();
        let scheduler = scheduler.clone();
        let state = state.clone();
        tokio::spawn(async move {
            let result = socket_server_task(
                home,
                scheduler,
                state,
                shutdown.clone(),
                shutdown.subscribe(),
            )
            .await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (
        worker_result,
        ticker_result,
        change_result,
        watcher_result,
        socket_result,
        signal_result,
    ) = tokio::join!(
        worker_handle,
        ticker_handle,
        change_handle,
        watcher_handle,
        socket_handle,
        signal_handle
    );

    handle_join("pass_worker", worker_result)?;
    handle_join("ticker", ticker_result)?;
    handle_join("change_listener", change_result)?;
    handle_join("watcher", watcher_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("daemon stopped");
    Ok(())
}

/// Drain the scheduler one batch at a time. A pass in flight always runs to
/// completion; shutdown is only observed between passes.
async fn pass_worker_task(
    mut reconciler: Reconciler,
    mut worker: SchedulerWorker<TriggerSource, PassResult>,
    state: SharedState,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        let batch = tokio::select! {
            _ = shutdown_rx.recv() => break,
            batch = worker.next() => match batch {
                Some(batch) => batch,
                None => break,
            },
        };

        let trigger = batch.args;
        let result = reconciler
            .run_pass(trigger)
            .await
            .map_err(|err| err.to_string());
        if let Err(err) = &result {
            tracing::error!(%trigger, error = %err, waiters = batch.waiters(), "reconciliation pass aborted");
        }
        record_pass(&state, &result, reconciler.tracked()).await;
        batch.complete(result);
    }
    Ok(())
}

async fn record_pass(state: &SharedState, result: &PassResult, tracked: Vec<ParentSummary>) {
    let mut state = state.write().await;
    state.passes += 1;
    state.last_pass_at_unix = Some(unix_seconds_now());
    state.tracked = tracked;
    match result {
        Ok(outcome) => {
            state.last_outcome = Some(outcome.clone());
            state.last_error = None;
        }
        Err(err) => state.last_error = Some(err.clone()),
    }
}

async fn ticker_task(
    scheduler: PassScheduler,
    period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick is immediate; startup already queued a pass.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                drop(scheduler.enqueue(TriggerSource::Tick));
            }
        }
    }
    Ok(())
}

async fn change_listener_task(
    mut changes: broadcast::Receiver<ExternalChange>,
    scheduler: PassScheduler,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            change = changes.recv() => match change {
                Ok(change) => {
                    tracing::debug!(reason = %change.reason, "external change");
                    drop(scheduler.enqueue(TriggerSource::ExternalChange));
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::debug!(missed, "change listener lagged");
                    drop(scheduler.enqueue(TriggerSource::ExternalChange));
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    Ok(())
}

/// Watch the board directory and turn foreign writes to the board file into
/// external changes. Writes made by the reconciler itself are filtered by
/// [`FileBoard::notice_file_change`].
async fn watcher_task(
    store: Arc<FileBoard>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let Some(dir) = store.path().parent().map(Path::to_path_buf) else {
        return Err(DaemonError::Protocol(format!(
            "board path has no parent directory: {}",
            store.path().display()
        )));
    };
    if !dir.exists() {
        fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
    }
    // Canonicalize so that FSEvents paths (real paths such as /private/var/...
    // on macOS) still match.
    let dir = fs::canonicalize(&dir).unwrap_or(dir);

    let (event_tx, mut event_rx) =
        tokio::sync::mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher: RecommendedWatcher = recommended_watcher(move |event| {
        let _ = event_tx.send(event);
    })?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    tracing::debug!(path = %dir.display(), "watching board directory");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(error = %err, "watcher event error");
                        continue;
                    }
                };
                if !is_relevant_event_kind(&event.kind) || !touches_board_file(&event.paths) {
                    continue;
                }
                if let Err(err) = store.notice_file_change() {
                    tracing::warn!(error = %err, "failed to inspect board file");
                }
            }
        }
    }

    Ok(())
}

async fn socket_server_task(
    home: PathBuf,
    scheduler: PassScheduler,
    state: SharedState,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let root = mirrorboard_root(&home);
    if !root.exists() {
        fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
    }

    let socket = socket_path(&home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;
    tracing::info!(socket = %socket.display(), "listening");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let home = home.clone();
                let scheduler = scheduler.clone();
                let state = state.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) =
                        handle_socket_client(stream, home, scheduler, state, shutdown_tx).await
                    {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    home: PathBuf,
    scheduler: PassScheduler,
    state: SharedState,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: DaemonRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error(format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };

        let response = match request.cmd {
            DaemonCommand::Status => DaemonResponse::ok(build_status_payload(&home, &state).await),
            DaemonCommand::Sync => match scheduler.trigger(TriggerSource::Request).await {
                Ok(Ok(outcome)) => DaemonResponse::ok(json!(outcome)),
                Ok(Err(err)) => DaemonResponse::error(err),
                Err(err) => DaemonResponse::error(err.to_string()),
            },
            DaemonCommand::Stop => {
                let _ = shutdown_tx.send(());
                DaemonResponse::ok(json!({ "stopping": true }))
            }
        };

        write_response(&mut writer, &response).await?;
        if request.cmd == DaemonCommand::Stop {
            break;
        }
    }

    Ok(())
}

async fn build_status_payload(home: &Path, state: &SharedState) -> Value {
    let snapshot = state.read().await.clone();
    json!({
        "running": true,
        "pid": std::process::id(),
        "started_at_unix": snapshot.started_at_unix,
        "passes": snapshot.passes,
        "last_pass_at_unix": snapshot.last_pass_at_unix,
        "last_outcome": snapshot.last_outcome,
        "last_error": snapshot.last_error,
        "tracked": snapshot.tracked,
        "socket": socket_path(home).display().to_string(),
        "board": board_path(home).display().to_string(),
    })
}

fn is_relevant_event_kind(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

fn touches_board_file(paths: &[PathBuf]) -> bool {
    paths
        .iter()
        .any(|path| path.file_name().and_then(|name| name.to_str()) == Some(BOARD_FILE))
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    let root = mirrorboard_root(home);
    if !root.exists() {
        fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
    }
    Ok(())
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Install the global subscriber. `RUST_LOG` filters (default `info`);
/// `MIRRORBOARD_LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json {
        let _ = fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    } else {
        let _ = fmt().with_env_filter(filter).with_target(false).try_init();
    }
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}
