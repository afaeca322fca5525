use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::domain::{TerminalStatus, TransferError, TransferRequest, TransferState};

use super::StreamingDownloader;

/// Events emitted by the active transfer, consumed by the shell.
/// `Finished` is sent exactly once per transfer.
#[derive(Debug, Clone)]
pub enum TransferEvent {
    Progress(crate::domain::ProgressSnapshot),
    Finished(TerminalStatus),
}

/// Outcome of a stop request. Stopping with nothing active is a notice,
/// not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NotRunning,
}

struct ControllerInner {
    state: TransferState,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

/// Owns the lifecycle of the single active transfer: spawns the download
/// loop on a background task, holds the cancellation token, and enforces
/// that at most one transfer runs at a time.
#[derive(Clone)]
pub struct TransferController {
    downloader: StreamingDownloader,
    inner: Arc<Mutex<ControllerInner>>,
}

impl Default for TransferController {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferController {
    pub fn new() -> Self {
        Self {
            downloader: StreamingDownloader::new(),
            inner: Arc::new(Mutex::new(ControllerInner {
                state: TransferState::Idle,
                cancel: CancellationToken::new(),
                handle: None,
            })),
        }
    }

    pub async fn state(&self) -> TransferState {
        self.inner.lock().await.state
    }

    /// Starts a transfer on a background task and returns immediately with
    /// the event receiver. Rejected with `AlreadyRunning` while a transfer
    /// is active; the in-progress transfer is left untouched.
    pub async fn start(
        &self,
        request: TransferRequest,
    ) -> Result<mpsc::UnboundedReceiver<TransferEvent>, TransferError> {
        let mut inner = self.inner.lock().await;
        if inner.state != TransferState::Idle {
            return Err(TransferError::AlreadyRunning);
        }

        // Fresh token per run so a previous stop cannot leak into this one.
        inner.cancel = CancellationToken::new();
        inner.state = TransferState::Running;

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = inner.cancel.clone();
        let downloader = self.downloader.clone();
        let shared = Arc::clone(&self.inner);

        info!(url = %request.url, "transfer accepted");

        inner.handle = Some(tokio::spawn(async move {
            let progress_tx = tx.clone();
            let run = downloader.run(&request, cancel, move |snapshot| {
                let _ = progress_tx.send(TransferEvent::Progress(snapshot));
            });

            // A panicking loop must still release the active-transfer slot,
            // so it is downgraded to a Failed outcome.
            let status = match std::panic::AssertUnwindSafe(run).catch_unwind().await {
                Ok(status) => status,
                Err(_) => {
                    error!("download task panicked");
                    TerminalStatus::Failed(TransferError::Io(
                        "Download task panicked".to_string(),
                    ))
                }
            };

            let mut inner = shared.lock().await;
            inner.state = match &status {
                TerminalStatus::Completed => TransferState::Completed,
                TerminalStatus::Cancelled => TransferState::Cancelled,
                TerminalStatus::Failed(_) => TransferState::Failed,
            };
            let _ = tx.send(TransferEvent::Finished(status));

            // Terminal notification delivered; ready for the next start.
            inner.state = TransferState::Idle;
            inner.handle = None;
        }));

        Ok(rx)
    }

    /// Signals cancellation and waits for the background task to observe it
    /// and fully terminate before returning. No timeout is applied; an
    /// unresponsive network read can hold this up until it yields.
    pub async fn stop(&self) -> StopOutcome {
        let handle = {
            let mut inner = self.inner.lock().await;
            if inner.state != TransferState::Running {
                return StopOutcome::NotRunning;
            }
            inner.state = TransferState::Stopping;
            inner.cancel.cancel();
            inner.handle.take()
        };

        match handle {
            Some(handle) => {
                let _ = handle.await;
                StopOutcome::Stopped
            }
            // The task finished on its own between the state check and the
            // handle take; nothing left to join.
            None => StopOutcome::NotRunning,
        }
    }
}
