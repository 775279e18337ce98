use std::fmt;
use std::io;

use pyshell_channel::{ChannelError, SyntaxCheckError};

// Exit code constants; a failed script passes its own exit code through.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;
pub const NOT_FOUND: i32 = 127;
pub const INTERRUPTED: i32 = 130;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::NotFound => NOT_FOUND,
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::BrokenPipe => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn channel_error(context: &str, err: ChannelError) -> CliError {
    match err {
        ChannelError::Spawn { source, program } => {
            io_error(&format!("{context}: cannot start {}", program.display()), source)
        }
        ChannelError::Io { source, .. } => io_error(context, source),
        ChannelError::Script(script) => CliError::new(
            script.exit_code().filter(|code| *code != 0).unwrap_or(FAILURE),
            script.to_string(),
        ),
        ChannelError::Decode { .. } | ChannelError::Frame { .. } | ChannelError::Encode(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        ChannelError::Config { .. } => CliError::new(USAGE, err.to_string()),
        ChannelError::Terminated | ChannelError::StdinClosed => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn syntax_error(context: &str, err: SyntaxCheckError) -> CliError {
    match err {
        SyntaxCheckError::Invalid { diagnostics, .. } => CliError::new(DATA_INVALID, diagnostics),
        SyntaxCheckError::Channel(err) => channel_error(context, err),
    }
}
