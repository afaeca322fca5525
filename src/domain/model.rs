use std::path::PathBuf;

use super::TransferError;

/// One end-to-end attempt to fetch a URL to a destination path.
/// Immutable once the transfer starts.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub url: String,
    pub destination: PathBuf,
}

/// Lifecycle of the single active transfer, owned by the controller.
/// Terminal states transition back to `Idle` once the terminal
/// notification has been delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    Running,
    Stopping,
    Completed,
    Failed,
    Cancelled,
}

/// How a transfer ended. `Cancelled` is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum TerminalStatus {
    Completed,
    Cancelled,
    Failed(TransferError),
}

/// Recomputed after every chunk; only the latest one matters.
///
/// `percentage` is `None` when the server sent no `Content-Length`
/// (never computed as `x / 0`). `bandwidth_bps` is the running average
/// since transfer start, `None` until the clock has advanced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub bytes_downloaded: u64,
    pub total_bytes: Option<u64>,
    pub percentage: Option<f64>,
    pub bandwidth_bps: Option<f64>,
    pub elapsed_secs: f64,
}

impl ProgressSnapshot {
    pub fn new(bytes_downloaded: u64, total_bytes: Option<u64>, elapsed_secs: f64) -> Self {
        let percentage = match total_bytes {
            Some(total) if total > 0 => Some(100.0 * bytes_downloaded as f64 / total as f64),
            _ => None,
        };

        let bandwidth_bps = if elapsed_secs > 0.0 {
            Some(bytes_downloaded as f64 / elapsed_secs)
        } else {
            None
        };

        Self {
            bytes_downloaded,
            total_bytes,
            percentage,
            bandwidth_bps,
            elapsed_secs,
        }
    }
}
