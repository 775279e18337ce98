use std::fmt;
use std::path::PathBuf;

use pyshell_codec::CodecError;
use pyshell_frame::FrameError;
use pyshell_process::ProcessError;

use crate::script_error::ScriptError;

/// Which of the child's standard streams an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdin,
    Stdout,
    Stderr,
}

impl StreamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamKind::Stdin => "stdin",
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur on a process channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The interpreter could not be started.
    #[error("failed to spawn {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },

    /// A frame could not be turned into a message.
    #[error("failed to decode {stream} frame: {source}")]
    Decode {
        stream: StreamKind,
        source: CodecError,
    },

    /// The byte stream could not be split into frames.
    #[error("{stream} framing error: {source}")]
    Frame {
        stream: StreamKind,
        source: FrameError,
    },

    /// An outgoing message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(#[source] CodecError),

    /// Pipe or wait failure.
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        source: std::io::Error,
    },

    /// The script failed; carries the translated traceback.
    #[error(transparent)]
    Script(Box<ScriptError>),

    /// The channel was killed or the child has exited.
    #[error("channel is terminated")]
    Terminated,

    /// `end` or `end_input` already closed stdin.
    #[error("stdin has been closed")]
    StdinClosed,

    /// Stdin is not piped to the parent.
    #[error("stdin is not open for writing")]
    StdinUnavailable,

    /// An options file could not be read or parsed.
    #[error("failed to load options from {}: {message}", path.display())]
    Config { path: PathBuf, message: String },
}

impl ChannelError {
    /// Underlying OS error code (e.g. `ENOENT` for a missing interpreter).
    pub fn os_code(&self) -> Option<i32> {
        match self {
            ChannelError::Spawn { source, .. } | ChannelError::Io { source, .. } => {
                source.raw_os_error()
            }
            ChannelError::Frame {
                source: FrameError::Io(source),
                ..
            } => source.raw_os_error(),
            _ => None,
        }
    }

    /// I/O error kind of the underlying failure (e.g. `NotFound` for a
    /// missing interpreter).
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            ChannelError::Spawn { source, .. } | ChannelError::Io { source, .. } => {
                Some(source.kind())
            }
            ChannelError::Frame {
                source: FrameError::Io(source),
                ..
            } => Some(source.kind()),
            _ => None,
        }
    }

    /// The translated script failure, if this is one.
    pub fn script_error(&self) -> Option<&ScriptError> {
        match self {
            ChannelError::Script(err) => Some(err),
            _ => None,
        }
    }

    pub(crate) fn from_frame(stream: StreamKind, err: FrameError) -> Self {
        match err {
            FrameError::Io(source) => ChannelError::Io {
                context: match stream {
                    StreamKind::Stdin => "failed to write to stdin",
                    StreamKind::Stdout => "failed to read stdout",
                    StreamKind::Stderr => "failed to read stderr",
                },
                source,
            },
            source => ChannelError::Frame { stream, source },
        }
    }
}

impl From<ProcessError> for ChannelError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::Spawn { program, source } => ChannelError::Spawn { program, source },
            ProcessError::Signal { source, .. } | ProcessError::Io(source) => ChannelError::Io {
                context: "process error",
                source,
            },
            ProcessError::UnknownSignal(name) => ChannelError::Io {
                context: "process error",
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("unknown signal name: {name}"),
                ),
            },
        }
    }
}

impl From<ScriptError> for ChannelError {
    fn from(err: ScriptError) -> Self {
        ChannelError::Script(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, ChannelError>;

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn spawn_error_exposes_os_code() {
        let err = ChannelError::from(ProcessError::Spawn {
            program: PathBuf::from("bad_python"),
            source: io::Error::from_raw_os_error(2),
        });
        assert!(matches!(err, ChannelError::Spawn { .. }));
        assert_eq!(err.os_code(), Some(2));
        assert_eq!(err.io_kind(), Some(io::ErrorKind::NotFound));
        assert!(err.to_string().starts_with("failed to spawn bad_python"));
    }

    #[test]
    fn frame_io_errors_become_io_errors() {
        let err = ChannelError::from_frame(
            StreamKind::Stdin,
            FrameError::Io(io::Error::from(io::ErrorKind::BrokenPipe)),
        );
        assert!(matches!(
            err,
            ChannelError::Io {
                context: "failed to write to stdin",
                ..
            }
        ));

        let err = ChannelError::from_frame(
            StreamKind::Stdout,
            FrameError::FrameTooLarge { size: 10, max: 4 },
        );
        assert_eq!(
            err.to_string(),
            "stdout framing error: frame too large (10 bytes, max 4)"
        );
    }
}
