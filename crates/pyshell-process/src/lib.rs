//! Child interpreter launch contract.
//!
//! Turns "an executable, a command line and a working directory" into a
//! spawned child with the requested stdio wiring, and reports how that child
//! ended:
//! - [`LaunchSpec`]: program, arguments, cwd, environment, stdio
//! - [`Signal`]: named POSIX signals and delivery to a pid
//! - [`ExitInfo`]: exit code or terminating signal
//!
//! This is the lowest layer of pyshell. No interpreter discovery happens
//! here; the program path is used as given.

pub mod error;
pub mod exit;
pub mod launch;
pub mod signal;

pub use error::{ProcessError, Result};
pub use exit::ExitInfo;
pub use launch::{LaunchSpec, StdioConfig, StdioMode};
pub use signal::{send_signal, Signal};
