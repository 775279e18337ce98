//! Named signals.
//!
//! Names follow the POSIX spelling (`SIGTERM`, `SIGKILL`, ...). Parsing is
//! case-insensitive and accepts the name with or without the `SIG` prefix.

use std::fmt;
use std::str::FromStr;

use crate::error::{ProcessError, Result};

/// A signal that can terminate or be sent to a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Hup,
    Int,
    Quit,
    Kill,
    Usr1,
    Usr2,
    Pipe,
    Alrm,
    Term,
    /// A signal number without a name in this table.
    Other(i32),
}

const NAMED: [Signal; 9] = [
    Signal::Hup,
    Signal::Int,
    Signal::Quit,
    Signal::Kill,
    Signal::Usr1,
    Signal::Usr2,
    Signal::Pipe,
    Signal::Alrm,
    Signal::Term,
];

impl Signal {
    /// Signal used by `kill` when the caller does not pick one.
    pub const DEFAULT_KILL: Signal = Signal::Term;

    /// POSIX name, e.g. `SIGTERM`.
    pub fn name(self) -> Option<&'static str> {
        match self {
            Signal::Hup => Some("SIGHUP"),
            Signal::Int => Some("SIGINT"),
            Signal::Quit => Some("SIGQUIT"),
            Signal::Kill => Some("SIGKILL"),
            Signal::Usr1 => Some("SIGUSR1"),
            Signal::Usr2 => Some("SIGUSR2"),
            Signal::Pipe => Some("SIGPIPE"),
            Signal::Alrm => Some("SIGALRM"),
            Signal::Term => Some("SIGTERM"),
            Signal::Other(_) => None,
        }
    }

    /// Platform signal number.
    #[cfg(unix)]
    pub fn as_raw(self) -> i32 {
        match self {
            Signal::Hup => libc::SIGHUP,
            Signal::Int => libc::SIGINT,
            Signal::Quit => libc::SIGQUIT,
            Signal::Kill => libc::SIGKILL,
            Signal::Usr1 => libc::SIGUSR1,
            Signal::Usr2 => libc::SIGUSR2,
            Signal::Pipe => libc::SIGPIPE,
            Signal::Alrm => libc::SIGALRM,
            Signal::Term => libc::SIGTERM,
            Signal::Other(raw) => raw,
        }
    }

    /// Map a platform signal number back to a [`Signal`].
    #[cfg(unix)]
    pub fn from_raw(raw: i32) -> Self {
        NAMED
            .into_iter()
            .find(|signal| signal.as_raw() == raw)
            .unwrap_or(Signal::Other(raw))
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.name(), self) {
            (Some(name), _) => f.write_str(name),
            (None, Signal::Other(raw)) => write!(f, "signal {raw}"),
            (None, _) => f.write_str("signal ?"),
        }
    }
}

impl FromStr for Signal {
    type Err = ProcessError;

    fn from_str(input: &str) -> Result<Self> {
        let upper = input.trim().to_ascii_uppercase();
        let bare = upper.strip_prefix("SIG").unwrap_or(&upper);
        NAMED
            .into_iter()
            .find(|signal| signal.name().map(|n| &n[3..]) == Some(bare))
            .ok_or_else(|| ProcessError::UnknownSignal(input.to_string()))
    }
}

/// Deliver `signal` to the process `pid`.
#[cfg(unix)]
pub fn send_signal(pid: u32, signal: Signal) -> Result<()> {
    let raw_pid = libc::pid_t::try_from(pid).map_err(|_| ProcessError::Signal {
        pid,
        signal,
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "pid out of range"),
    })?;

    // SAFETY: `kill(2)` has no memory-safety preconditions; it only takes a pid
    // and a signal number and reports failure through errno.
    let rc = unsafe { libc::kill(raw_pid, signal.as_raw()) };
    if rc == 0 {
        tracing::debug!(pid, %signal, "signal delivered");
        Ok(())
    } else {
        Err(ProcessError::Signal {
            pid,
            signal,
            source: std::io::Error::last_os_error(),
        })
    }
}

/// Deliver `signal` to the process `pid`.
///
/// Named signals are a POSIX concept; callers on other platforms fall back to
/// forced termination through the child handle.
#[cfg(not(unix))]
pub fn send_signal(pid: u32, signal: Signal) -> Result<()> {
    Err(ProcessError::Signal {
        pid,
        signal,
        source: std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "named signals require a unix platform",
        ),
    })
}
