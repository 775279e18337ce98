//! Message channel over a child interpreter's standard streams.
//!
//! This is the "just works" layer. Spawn a script, send it messages, receive
//! its output as decoded messages, and get a structured [`ScriptError`] with
//! the remote traceback when it fails.
//!
//! ```no_run
//! use pyshell_channel::{ChannelOptions, Mode, ProcessChannel};
//!
//! # async fn demo() -> pyshell_channel::Result<()> {
//! let mut channel = ProcessChannel::spawn(
//!     "echo_json.py",
//!     ChannelOptions::new().with_mode(Mode::Json),
//! );
//! channel.on_message(|message| println!("{message}"));
//! channel.send(serde_json::json!({"a": "b"}))?;
//! let exit = channel.end().await?;
//! println!("finished with {exit}");
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod error;
pub mod event;
pub mod helpers;
pub mod options;
pub mod script_error;
pub mod translate;

mod supervisor;

pub use channel::{ChannelCodecs, ChannelState, KillHandle, ProcessChannel};
pub use error::{ChannelError, Result, StreamKind};
pub use event::ChannelEvent;
pub use helpers::{
    check_syntax, check_syntax_file, interpreter_version, interpreter_version_blocking, run,
    run_string, run_with_codecs, RunOutput, SyntaxCheckError,
};
pub use options::{ChannelOptions, DEFAULT_PYTHON};
pub use script_error::{ScriptError, TRACEBACK_HEADER, TRACEBACK_SEPARATOR};
pub use translate::{translate, ScriptContext};

pub use pyshell_codec::{Codec, CodecError, Deserializer, Message, Mode, Serializer};
pub use pyshell_process::{ExitInfo, Signal, StdioConfig, StdioMode};
