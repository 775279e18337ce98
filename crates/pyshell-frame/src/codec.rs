use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::error::{FrameError, Result};

/// Default maximum size of a single delimited frame: 16 MiB.
pub const DEFAULT_MAX_FRAME: usize = 16 * 1024 * 1024;

/// Line ending a child writes on this platform.
#[cfg(windows)]
pub const PLATFORM_TERMINATOR: &[u8] = b"\r\n";
/// Line ending a child writes on this platform.
#[cfg(not(windows))]
pub const PLATFORM_TERMINATOR: &[u8] = b"\n";

/// Terminator appended to outgoing messages under line framing.
pub const SEND_TERMINATOR: &[u8] = b"\n";

/// How a stream is cut into frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Framing {
    /// Frames end at a terminator. Incoming and outgoing terminators may differ.
    Delimited { incoming: Bytes, outgoing: Bytes },
    /// Every chunk is a frame; nothing is appended on send.
    Passthrough,
}

impl Framing {
    /// Platform line endings in, `\n` out.
    pub fn lines() -> Self {
        Self::Delimited {
            incoming: Bytes::from_static(PLATFORM_TERMINATOR),
            outgoing: Bytes::from_static(SEND_TERMINATOR),
        }
    }

    /// The same custom terminator in both directions.
    pub fn delimited(terminator: impl Into<Bytes>) -> Self {
        let terminator = terminator.into();
        Self::Delimited {
            incoming: terminator.clone(),
            outgoing: terminator,
        }
    }

    /// No framing: chunks pass through untouched.
    pub fn passthrough() -> Self {
        Self::Passthrough
    }

    /// Terminator searched for in incoming data.
    pub fn incoming_terminator(&self) -> Option<&[u8]> {
        match self {
            Framing::Delimited { incoming, .. } => Some(incoming.as_ref()),
            Framing::Passthrough => None,
        }
    }

    /// Terminator appended to outgoing payloads.
    pub fn outgoing_terminator(&self) -> Option<&[u8]> {
        match self {
            Framing::Delimited { outgoing, .. } => Some(outgoing.as_ref()),
            Framing::Passthrough => None,
        }
    }
}

impl Default for Framing {
    fn default() -> Self {
        Self::lines()
    }
}

/// Configuration for frame splitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameConfig {
    /// Terminator convention.
    pub framing: Framing,
    /// Maximum size of one delimited frame in bytes. Default: 16 MiB.
    pub max_frame_size: usize,
}

impl FrameConfig {
    /// Default limits with the given framing.
    pub fn new(framing: Framing) -> Self {
        Self {
            framing,
            max_frame_size: DEFAULT_MAX_FRAME,
        }
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self::new(Framing::default())
    }
}

/// Search progress carried between calls on the same buffer.
///
/// `scanned` bytes at the front of the buffer are known not to contain a
/// complete terminator, so the next search only revisits the last
/// `terminator.len() - 1` of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanState {
    scanned: usize,
    discarding: bool,
}

impl ScanState {
    /// True while the remainder of an oversized frame is being skipped.
    pub fn is_discarding(&self) -> bool {
        self.discarding
    }
}

/// Split the next complete frame off the front of `src`.
///
/// Returns `Ok(None)` when `src` holds no complete frame yet. On success the
/// frame and its terminator are consumed from `src`; the terminator is not
/// part of the returned frame. Under passthrough framing the whole buffer is
/// the frame.
///
/// A delimited frame longer than `config.max_frame_size` yields
/// `FrameError::FrameTooLarge` once; its bytes are dropped up to the next
/// terminator and splitting continues after it.
pub fn decode_frame(
    src: &mut BytesMut,
    config: &FrameConfig,
    state: &mut ScanState,
) -> Result<Option<Bytes>> {
    let terminator = match config.framing.incoming_terminator() {
        None if src.is_empty() => return Ok(None),
        None => return Ok(Some(src.split().freeze())),
        Some([]) => return Err(FrameError::EmptyTerminator),
        Some(terminator) => terminator,
    };

    // Trailing bytes that may be the start of a terminator split across chunks.
    let held = terminator.len() - 1;

    loop {
        let start = state.scanned.saturating_sub(held);
        let found = find(&src[start..], terminator).map(|pos| start + pos);

        match (state.discarding, found) {
            (true, Some(end)) => {
                debug!(skipped = end, "oversized frame discarded");
                src.advance(end + terminator.len());
                *state = ScanState::default();
            }
            (true, None) => {
                let keep = held.min(src.len());
                src.advance(src.len() - keep);
                state.scanned = src.len();
                return Ok(None);
            }
            (false, Some(end)) if end > config.max_frame_size => {
                src.advance(end + terminator.len());
                *state = ScanState::default();
                return Err(FrameError::FrameTooLarge {
                    size: end,
                    max: config.max_frame_size,
                });
            }
            (false, Some(end)) => {
                let frame = src.split_to(end).freeze();
                src.advance(terminator.len());
                *state = ScanState::default();
                return Ok(Some(frame));
            }
            (false, None) if src.len().saturating_sub(held) > config.max_frame_size => {
                let size = src.len() - held;
                src.advance(size);
                *state = ScanState {
                    scanned: src.len(),
                    discarding: true,
                };
                return Err(FrameError::FrameTooLarge {
                    size,
                    max: config.max_frame_size,
                });
            }
            (false, None) => {
                state.scanned = src.len();
                return Ok(None);
            }
        }
    }
}

/// Split the next frame once the stream has ended.
///
/// Complete frames come first; after them, any unterminated remainder is
/// returned as the final frame. A remainder belonging to an oversized frame
/// is dropped.
pub fn decode_eof_frame(
    src: &mut BytesMut,
    config: &FrameConfig,
    state: &mut ScanState,
) -> Result<Option<Bytes>> {
    if let Some(frame) = decode_frame(src, config, state)? {
        return Ok(Some(frame));
    }
    if state.discarding {
        debug!(skipped = src.len(), "oversized frame discarded at end of stream");
        src.clear();
        *state = ScanState::default();
        return Ok(None);
    }
    if src.is_empty() {
        return Ok(None);
    }
    *state = ScanState::default();
    Ok(Some(src.split().freeze()))
}

/// Append `payload` followed by the outgoing terminator to `dst`.
pub fn encode_frame(payload: &[u8], framing: &Framing, dst: &mut BytesMut) {
    let terminator = framing.outgoing_terminator().unwrap_or_default();
    dst.reserve(payload.len() + terminator.len());
    dst.put_slice(payload);
    dst.put_slice(terminator);
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    match needle {
        [byte] => haystack.iter().position(|b| b == byte),
        _ => haystack
            .windows(needle.len())
            .position(|window| window == needle),
    }
}
