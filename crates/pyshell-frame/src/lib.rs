//! Terminator-delimited message framing over child process streams.
//!
//! A child's stdout arrives as arbitrary chunks. This crate turns those
//! chunks back into the logical messages the child wrote:
//! - Delimited framing splits on a terminator (a line ending by default)
//!   and buffers partial fragments across chunk boundaries.
//! - Passthrough framing hands every chunk on untouched (binary mode).
//!
//! [`Framer`] is the push-style API; [`FrameCodec`] (feature `async`) plugs
//! the same splitting rules into `tokio_util::codec`.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod error;
pub mod framer;

#[cfg(feature = "async")]
pub use async_codec::FrameCodec;
pub use codec::{
    decode_eof_frame, decode_frame, encode_frame, FrameConfig, Framing, ScanState,
    DEFAULT_MAX_FRAME, PLATFORM_TERMINATOR, SEND_TERMINATOR,
};
pub use error::{FrameError, Result};
pub use framer::{Frames, Framer};
