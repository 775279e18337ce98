use bytes::{Bytes, BytesMut};

use crate::codec::{decode_eof_frame, decode_frame, FrameConfig, Framing, ScanState};
use crate::error::Result;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Push-style frame splitter for one stream.
///
/// Feed chunks in arrival order with [`Framer::push`]; each call yields the
/// frames that chunk completed. Incomplete trailing data stays buffered until
/// a later chunk completes it or [`Framer::finish`] flushes it.
#[derive(Debug)]
pub struct Framer {
    buf: BytesMut,
    state: ScanState,
    config: FrameConfig,
}

impl Framer {
    /// Create a framer with default limits.
    pub fn new(framing: Framing) -> Self {
        Self::with_config(FrameConfig::new(framing))
    }

    /// Create a framer with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            state: ScanState::default(),
            config,
        }
    }

    /// Append a chunk and iterate the frames it completes.
    ///
    /// The iterator is lazy: frames are split off the buffer as it is
    /// advanced. Dropping it early leaves the rest buffered for the next
    /// `push` or `finish`.
    pub fn push(&mut self, chunk: &[u8]) -> Frames<'_> {
        let passthrough = match self.config.framing {
            Framing::Passthrough if !chunk.is_empty() => Some(Bytes::copy_from_slice(chunk)),
            Framing::Passthrough => None,
            Framing::Delimited { .. } => {
                self.buf.extend_from_slice(chunk);
                None
            }
        };
        Frames {
            framer: self,
            passthrough,
        }
    }

    /// Close the stream and return every frame still buffered.
    ///
    /// The unterminated remainder, if any, comes last.
    pub fn finish(mut self) -> Result<Vec<Bytes>> {
        let mut frames = Vec::new();
        while let Some(frame) = decode_eof_frame(&mut self.buf, &self.config, &mut self.state)? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Number of bytes waiting for a terminator.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Current framer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

/// Frames completed by one [`Framer::push`].
#[derive(Debug)]
pub struct Frames<'a> {
    framer: &'a mut Framer,
    passthrough: Option<Bytes>,
}

impl Iterator for Frames<'_> {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Framing::Passthrough = self.framer.config.framing {
            return self.passthrough.take().map(Ok);
        }
        let framer = &mut *self.framer;
        decode_frame(&mut framer.buf, &framer.config, &mut framer.state).transpose()
    }
}
