use std::path::PathBuf;

use crate::signal::Signal;

/// Errors that can occur while launching or signalling a child process.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The executable could not be started.
    #[error("failed to spawn {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },

    /// A signal could not be delivered.
    #[error("failed to deliver {signal} to pid {pid}: {source}")]
    Signal {
        pid: u32,
        signal: Signal,
        source: std::io::Error,
    },

    /// The signal name is not recognized.
    #[error("unknown signal name: {0}")]
    UnknownSignal(String),

    /// An I/O error occurred while waiting on the child.
    #[error("process I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProcessError {
    /// Raw OS error code of the underlying failure, if any (e.g. `ENOENT`).
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            ProcessError::Spawn { source, .. }
            | ProcessError::Signal { source, .. }
            | ProcessError::Io(source) => source.raw_os_error(),
            ProcessError::UnknownSignal(_) => None,
        }
    }

    /// I/O error kind of the underlying failure, if any.
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            ProcessError::Spawn { source, .. }
            | ProcessError::Signal { source, .. }
            | ProcessError::Io(source) => Some(source.kind()),
            ProcessError::UnknownSignal(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProcessError>;
