mod emulator;
mod environment;
mod input;
mod pane;

pub use emulator::{TerminalScreen, TerminalSnapshot};
pub use environment::{sanitize_environment, sanitized_environment, VENDOR_PREFIXES};
pub use input::encode_key;
pub use pane::{Pane, PaneEvent, PaneEventSink};

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("spawn failure: {0}")]
    Spawn(String),
    #[error("pane process error: {0}")]
    Process(String),
    #[error("pane is not running: {0}")]
    NotRunning(String),
    #[error("runtime internal error: {0}")]
    Internal(String),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
