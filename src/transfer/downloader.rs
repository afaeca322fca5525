use std::time::Instant;

use futures::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{ProgressSnapshot, TerminalStatus, TransferError, TransferRequest};

/// Performs the network read / disk write loop for one transfer.
///
/// Runs off the UI thread; the caller is responsible for marshaling
/// progress back onto its own event loop.
#[derive(Clone)]
pub struct StreamingDownloader {
    client: Client,
}

impl Default for StreamingDownloader {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamingDownloader {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Streams `request.url` into `request.destination`, invoking
    /// `on_progress` synchronously once per chunk. The cancellation token
    /// is checked before each chunk is processed; bytes already written
    /// stay on disk whatever the outcome.
    pub async fn run(
        &self,
        request: &TransferRequest,
        cancel: CancellationToken,
        mut on_progress: impl FnMut(ProgressSnapshot),
    ) -> TerminalStatus {
        match self.run_inner(request, cancel, &mut on_progress).await {
            Ok(status) => status,
            Err(e) => {
                warn!(url = %request.url, error = %e, "download failed");
                TerminalStatus::Failed(e)
            }
        }
    }

    async fn run_inner(
        &self,
        request: &TransferRequest,
        cancel: CancellationToken,
        on_progress: &mut impl FnMut(ProgressSnapshot),
    ) -> Result<TerminalStatus, TransferError> {
        let response = self
            .client
            .get(&request.url)
            .send()
            .await
            .map_err(|e| TransferError::Network(e.to_string()))?
            .error_for_status()
            .map_err(|e| TransferError::Network(e.to_string()))?;

        let total_bytes = response.content_length();
        let mut stream = response.bytes_stream();

        // Append mode: a pre-existing destination keeps its bytes and new
        // chunks land after them. Each chunk is written immediately so
        // partial progress survives a hard crash.
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&request.destination)
            .await
            .map_err(|e| TransferError::Io(format!("Failed to open file: {}", e)))?;

        info!(
            url = %request.url,
            destination = %request.destination.display(),
            total_bytes,
            "transfer started"
        );

        let start_time = Instant::now();
        let mut bytes_downloaded: u64 = 0;

        loop {
            if cancel.is_cancelled() {
                // write_all hands the bytes to a background blocking task;
                // flush before returning so the join in stop() really means
                // no write to the destination is still in flight.
                if let Err(e) = file.flush().await {
                    warn!(error = %e, "flush after cancellation failed");
                }
                info!(bytes_downloaded, "transfer cancelled");
                return Ok(TerminalStatus::Cancelled);
            }

            match stream.next().await {
                Some(Ok(chunk)) => {
                    if let Err(e) = file.write_all(&chunk).await {
                        let _ = file.flush().await;
                        return Err(TransferError::Io(format!("Write error: {}", e)));
                    }

                    bytes_downloaded += chunk.len() as u64;
                    on_progress(ProgressSnapshot::new(
                        bytes_downloaded,
                        total_bytes,
                        start_time.elapsed().as_secs_f64(),
                    ));
                }
                Some(Err(e)) => {
                    let _ = file.flush().await;
                    return Err(TransferError::Network(e.to_string()));
                }
                None => {
                    file.flush()
                        .await
                        .map_err(|e| TransferError::Io(format!("Flush error: {}", e)))?;

                    debug!(bytes_downloaded, "stream exhausted");
                    return Ok(TerminalStatus::Completed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn request_for(server: &mockito::Server, path: &str, dir: &tempfile::TempDir) -> TransferRequest {
        TransferRequest {
            url: format!("{}{}", server.url(), path),
            destination: dir.path().join("out.bin"),
        }
    }

    #[tokio::test]
    async fn completes_and_reports_full_progress() {
        let mut server = mockito::Server::new_async().await;
        let body = vec![0xABu8; 1000];
        let _mock = server
            .mock("GET", "/file.bin")
            .with_status(200)
            .with_body(&body)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let request = request_for(&server, "/file.bin", &dir);

        let mut snapshots = Vec::new();
        let status = StreamingDownloader::new()
            .run(&request, CancellationToken::new(), |s| snapshots.push(s))
            .await;

        assert_eq!(status, TerminalStatus::Completed);

        let last = snapshots.last().expect("at least one snapshot");
        assert_eq!(last.bytes_downloaded, 1000);
        assert_eq!(last.total_bytes, Some(1000));
        assert_eq!(last.percentage, Some(100.0));

        // Percentage never decreases across the chunk sequence.
        let percentages: Vec<f64> = snapshots.iter().filter_map(|s| s.percentage).collect();
        assert!(percentages.windows(2).all(|w| w[0] <= w[1]));

        assert_eq!(std::fs::read(&request.destination).unwrap(), body);
    }

    #[tokio::test]
    async fn missing_content_length_leaves_percentage_unknown() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/chunked.bin")
            .with_status(200)
            .with_chunked_body(|w| {
                for _ in 0..4 {
                    w.write_all(&[0x55u8; 256])?;
                }
                Ok(())
            })
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let request = request_for(&server, "/chunked.bin", &dir);

        let mut snapshots = Vec::new();
        let status = StreamingDownloader::new()
            .run(&request, CancellationToken::new(), |s| snapshots.push(s))
            .await;

        assert_eq!(status, TerminalStatus::Completed);
        assert!(!snapshots.is_empty());
        assert!(snapshots.iter().all(|s| s.percentage.is_none()));
        assert!(snapshots.iter().all(|s| s.total_bytes.is_none()));
        assert_eq!(
            std::fs::metadata(&request.destination).unwrap().len(),
            1024
        );
    }

    #[tokio::test]
    async fn http_404_fails_with_status_detail() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing.bin")
            .with_status(404)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let request = request_for(&server, "/missing.bin", &dir);

        let status = StreamingDownloader::new()
            .run(&request, CancellationToken::new(), |_| {})
            .await;

        match status {
            TerminalStatus::Failed(TransferError::Network(msg)) => {
                assert!(msg.contains("404"), "expected status in message: {}", msg);
            }
            other => panic!("expected network failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn connection_refused_fails_with_network_error() {
        // Port 1 is never listening.
        let request = TransferRequest {
            url: "http://127.0.0.1:1/file.bin".to_string(),
            destination: tempfile::tempdir().unwrap().path().join("out.bin"),
        };

        let status = StreamingDownloader::new()
            .run(&request, CancellationToken::new(), |_| {})
            .await;

        assert!(matches!(
            status,
            TerminalStatus::Failed(TransferError::Network(_))
        ));
    }

    #[tokio::test]
    async fn cancellation_keeps_only_processed_bytes() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/slow.bin")
            .with_status(200)
            .with_chunked_body(|w| {
                for _ in 0..10 {
                    w.write_all(&[0x11u8; 8192])?;
                    w.flush()?;
                    std::thread::sleep(std::time::Duration::from_millis(20));
                }
                Ok(())
            })
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let request = request_for(&server, "/slow.bin", &dir);

        let cancel = CancellationToken::new();
        let observer = cancel.clone();
        let mut last_seen: u64 = 0;
        let status = StreamingDownloader::new()
            .run(&request, cancel, |s| {
                last_seen = s.bytes_downloaded;
                if s.bytes_downloaded >= 8192 {
                    observer.cancel();
                }
            })
            .await;

        assert_eq!(status, TerminalStatus::Cancelled);

        // Exactly the chunks processed before the signal was observed.
        let on_disk = std::fs::metadata(&request.destination).unwrap().len();
        assert_eq!(on_disk, last_seen);
        assert!(on_disk < 81920);
    }

    #[tokio::test]
    async fn cancelled_bytes_are_settled_before_run_returns() {
        let mut server = mockito::Server::new_async().await;
        let _slow = server
            .mock("GET", "/slow.bin")
            .with_status(200)
            .with_chunked_body(|w| {
                for _ in 0..10 {
                    w.write_all(&[0x33u8; 4096])?;
                    w.flush()?;
                    std::thread::sleep(std::time::Duration::from_millis(20));
                }
                Ok(())
            })
            .create_async()
            .await;
        let _tail = server
            .mock("GET", "/tail.bin")
            .with_status(200)
            .with_body(b"tail")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let request = request_for(&server, "/slow.bin", &dir);

        let cancel = CancellationToken::new();
        let observer = cancel.clone();
        let mut cancelled_at: u64 = 0;
        let downloader = StreamingDownloader::new();
        let status = downloader
            .run(&request, cancel, |s| {
                cancelled_at = s.bytes_downloaded;
                observer.cancel();
            })
            .await;
        assert_eq!(status, TerminalStatus::Cancelled);

        // The moment run() returns, every written byte is settled on disk;
        // an immediate re-run to the same path appends cleanly with no
        // stale write landing afterwards.
        let second = TransferRequest {
            url: format!("{}/tail.bin", server.url()),
            destination: request.destination.clone(),
        };
        let status = downloader
            .run(&second, CancellationToken::new(), |_| {})
            .await;
        assert_eq!(status, TerminalStatus::Completed);

        let contents = std::fs::read(&request.destination).unwrap();
        assert_eq!(contents.len() as u64, cancelled_at + 4);
        assert!(contents.ends_with(b"tail"));
    }

    #[tokio::test]
    async fn existing_destination_is_appended_not_truncated() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/file.bin")
            .with_status(200)
            .with_body(b"new-bytes")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let request = request_for(&server, "/file.bin", &dir);
        std::fs::write(&request.destination, b"old-bytes").unwrap();

        let status = StreamingDownloader::new()
            .run(&request, CancellationToken::new(), |_| {})
            .await;

        assert_eq!(status, TerminalStatus::Completed);
        assert_eq!(
            std::fs::read(&request.destination).unwrap(),
            b"old-bytesnew-bytes"
        );
    }
}
