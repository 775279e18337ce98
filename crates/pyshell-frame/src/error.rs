/// Errors that can occur while splitting a stream into frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A frame grew past the configured limit without a terminator.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// Delimited framing was configured with an empty terminator.
    #[error("frame terminator must not be empty")]
    EmptyTerminator,

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
