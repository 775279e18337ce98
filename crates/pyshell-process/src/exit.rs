use std::fmt;
use std::process::ExitStatus;

use crate::signal::Signal;

/// How a child process ended.
///
/// Exactly one of `code` / `signal` is set for a reaped process. Both are
/// `None` when the child never started or could not be waited on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExitInfo {
    /// Exit code, when the process exited normally.
    pub code: Option<i32>,
    /// Terminating signal, when the process was killed.
    pub signal: Option<Signal>,
}

impl ExitInfo {
    /// Exit info for a normal exit with `code`.
    pub fn with_code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    /// Exit info for a process terminated by `signal`.
    pub fn with_signal(signal: Signal) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    /// True for a normal exit with code zero.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for ExitInfo {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(raw) = status.signal() {
                return Self::with_signal(Signal::from_raw(raw));
            }
        }
        Self {
            code: status.code(),
            signal: None,
        }
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {code}"),
            (None, Some(signal)) => write!(f, "terminated by {signal}"),
            (None, None) => f.write_str("no exit status"),
        }
    }
}
