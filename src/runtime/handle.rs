use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tracing::debug;

use crate::{
    batch::{BacklogItem, BatchRecord},
    engine::{
        backlog::select_backlog,
        outcome::{BulkReport, ReconcileSuccess},
        reconciler::{ReconcileError, Reconciler},
    },
    persist::StoreError,
    types::BatchId,
};

use super::events::ReconcileEvent;

/// Errors surfaced through [`ReconcilerHandle`].
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Single-batch reconciliation failed.
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    /// The store could not be queried (backlog selection or listing).
    #[error("store unavailable: {0}")]
    Store(#[from] StoreError),
    /// The blocking task running the engine panicked or was cancelled.
    #[error("reconciler task failed: {0}")]
    Join(String),
    /// The runtime loop has stopped.
    #[error("reconciler runtime is closed")]
    ChannelClosed,
}

/// Handle to the single-writer reconciler loop.
pub struct ReconcilerHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<ReconcileEvent>,
}

impl Clone for ReconcilerHandle {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
            events_tx: self.events_tx.clone(),
        }
    }
}

enum Command {
    ReconcileOne {
        id: BatchId,
        resp: oneshot::Sender<Result<ReconcileSuccess, RuntimeError>>,
    },
    ReconcileBacklog {
        resp: oneshot::Sender<Result<BulkReport, RuntimeError>>,
    },
    ReconcileItems {
        items: Vec<BacklogItem>,
        resp: oneshot::Sender<Result<BulkReport, RuntimeError>>,
    },
    Inspect {
        resp: oneshot::Sender<Result<Vec<BatchRecord>, RuntimeError>>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

/// Spawns the command loop that owns `reconciler`.
///
/// Commands run one at a time, so no two reconciliations ever overlap.
/// Engine work runs on the blocking pool.
pub fn spawn_reconciler(reconciler: Reconciler) -> ReconcilerHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(64);
    let (events_tx, _) = broadcast::channel::<ReconcileEvent>(1024);

    let events_tx_loop = events_tx.clone();
    let reconciler = Arc::new(Mutex::new(reconciler));

    tokio::spawn(async move {
        while let Some(cmd) = cmd_rx.recv().await {
            let done = handle_command(cmd, &reconciler, &events_tx_loop).await;
            if done {
                break;
            }
        }
        debug!("reconciler loop stopped");
    });

    ReconcilerHandle { cmd_tx, events_tx }
}

impl ReconcilerHandle {
    /// Subscribes to progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<ReconcileEvent> {
        self.events_tx.subscribe()
    }

    /// Reconciles one batch; any failure is returned as an error.
    pub async fn reconcile_one(&self, id: BatchId) -> Result<ReconcileSuccess, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::ReconcileOne { id, resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Selects the backlog and reconciles every item.
    pub async fn reconcile_backlog(&self) -> Result<BulkReport, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::ReconcileBacklog { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Reconciles an explicit list of items, in the given order.
    pub async fn reconcile_items(&self, items: Vec<BacklogItem>) -> Result<BulkReport, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::ReconcileItems { items, resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Reconciles the given ids, in the given order.
    pub async fn reconcile_ids(&self, ids: &[BatchId]) -> Result<BulkReport, RuntimeError> {
        let items = ids.iter().copied().map(BacklogItem::from_id).collect();
        self.reconcile_items(items).await
    }

    /// Lists every batch record.
    pub async fn inspect(&self) -> Result<Vec<BatchRecord>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Inspect { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Stops the loop after in-flight commands finish.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Shutdown { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }
}

async fn handle_command(
    cmd: Command,
    reconciler: &Arc<Mutex<Reconciler>>,
    events_tx: &broadcast::Sender<ReconcileEvent>,
) -> bool {
    match cmd {
        Command::ReconcileOne { id, resp } => {
            let events = events_tx.clone();
            let res = run_blocking(reconciler, move |r| {
                let res = r.reconcile_one(id);
                let event = match &res {
                    Ok(s) => ReconcileEvent::Reconciled {
                        id: s.id,
                        batch_number: s.batch_number.clone(),
                        status: s.status,
                    },
                    Err(e) => ReconcileEvent::Failed {
                        id: e.id(),
                        stage: e.stage(),
                        cause: e.cause(),
                        message: e.to_string(),
                    },
                };
                let _ = events.send(event);
                res
            })
            .await
            .and_then(|r| r.map_err(RuntimeError::from));
            let _ = resp.send(res);
        }
        Command::ReconcileBacklog { resp } => {
            let res = match run_blocking(reconciler, |r| select_backlog(r.store())).await {
                Ok(Ok(items)) => run_items(reconciler, events_tx, items).await,
                Ok(Err(err)) => Err(RuntimeError::Store(err)),
                Err(err) => Err(err),
            };
            let _ = resp.send(res);
        }
        Command::ReconcileItems { items, resp } => {
            let _ = resp.send(run_items(reconciler, events_tx, items).await);
        }
        Command::Inspect { resp } => {
            let res = run_blocking(reconciler, |r| r.store().list_batches())
                .await
                .and_then(|r| r.map_err(RuntimeError::from));
            let _ = resp.send(res);
        }
        Command::Shutdown { resp } => {
            let _ = resp.send(());
            return true;
        }
    }

    false
}

async fn run_items(
    reconciler: &Arc<Mutex<Reconciler>>,
    events_tx: &broadcast::Sender<ReconcileEvent>,
    items: Vec<BacklogItem>,
) -> Result<BulkReport, RuntimeError> {
    let _ = events_tx.send(ReconcileEvent::RunStarted { total: items.len() });

    let events = events_tx.clone();
    let report = run_blocking(reconciler, move |r| {
        r.reconcile_items(&items, |outcome| {
            let _ = events.send(ReconcileEvent::from(outcome));
        })
    })
    .await?;

    let _ = events_tx.send(ReconcileEvent::RunFinished {
        attempted: report.attempted,
        succeeded: report.succeeded,
        failed: report.failed,
    });
    Ok(report)
}

async fn run_blocking<T, F>(reconciler: &Arc<Mutex<Reconciler>>, f: F) -> Result<T, RuntimeError>
where
    F: FnOnce(&mut Reconciler) -> T + Send + 'static,
    T: Send + 'static,
{
    let reconciler = Arc::clone(reconciler);
    tokio::task::spawn_blocking(move || {
        let mut guard = reconciler.blocking_lock();
        f(&mut *guard)
    })
    .await
    .map_err(|e| RuntimeError::Join(e.to_string()))
}
