use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_eof_frame, decode_frame, encode_frame, FrameConfig, ScanState};
use crate::error::FrameError;

/// `tokio_util` codec applying [`FrameConfig`] to an async stream.
///
/// Decoding yields frames without their terminator and flushes the trailing
/// remainder at end of stream. Encoding appends the outgoing terminator.
#[derive(Debug, Clone, Default)]
pub struct FrameCodec {
    config: FrameConfig,
    state: ScanState,
}

impl FrameCodec {
    /// Create a codec for the given configuration.
    pub fn new(config: FrameConfig) -> Self {
        Self {
            config,
            state: ScanState::default(),
        }
    }

    /// Current codec configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        decode_frame(src, &self.config, &mut self.state)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        decode_eof_frame(src, &self.config, &mut self.state)
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(&item, &self.config.framing, dst);
        Ok(())
    }
}
