use crate::mode::Mode;

/// Errors that can occur while encoding or decoding messages.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The frame or message is not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The message kind cannot be sent in this mode.
    #[error("{mode} mode cannot send a {kind} message")]
    Unsupported { mode: Mode, kind: &'static str },

    /// The mode name is not recognized.
    #[error("unknown mode: {0} (expected text, json or binary)")]
    UnknownMode(String),

    /// Failure reported by a caller-supplied serializer or deserializer.
    #[error("{0}")]
    Custom(String),
}

impl CodecError {
    /// Wrap a failure from a caller-supplied strategy.
    pub fn custom(message: impl std::fmt::Display) -> Self {
        Self::Custom(message.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
