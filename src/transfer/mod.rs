pub mod controller;
pub mod downloader;

pub use controller::{StopOutcome, TransferController, TransferEvent};
pub use downloader::StreamingDownloader;
