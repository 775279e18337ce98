//! Run Python scripts as child processes and talk to them over stdio.
//!
//! pyshell spawns an interpreter, frames its stdin/stdout/stderr into
//! messages (text lines, JSON documents or raw bytes), and turns a failed run
//! into a structured error carrying the remote traceback.
//!
//! # Crate Structure
//!
//! - [`process`]: Interpreter launch contract, signals, exit status
//! - [`frame`]: Terminator framing over byte streams
//! - [`codec`]: Text / JSON / binary message codecs
//! - [`channel`]: Process channel, error translation and one-shot helpers (behind `channel` feature)

/// Re-export process types.
pub mod process {
    pub use pyshell_process::*;
}

/// Re-export frame types.
pub mod frame {
    pub use pyshell_frame::*;
}

/// Re-export codec types.
pub mod codec {
    pub use pyshell_codec::*;
}

/// Re-export channel types (requires `channel` feature).
#[cfg(feature = "channel")]
pub mod channel {
    pub use pyshell_channel::*;
}
