pub mod error;
pub mod model;

pub use error::TransferError;
pub use model::{ProgressSnapshot, TerminalStatus, TransferRequest, TransferState};
