use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use pyshell_frame::Framing;
use tracing::debug;

use crate::error::{CodecError, Result};
use crate::message::Message;
use crate::mode::Mode;

/// Renders an outgoing message as payload bytes.
///
/// The framing layer appends the terminator afterwards, so implementations
/// produce the payload only.
pub trait Serializer: Send + Sync {
    fn serialize(&self, message: &Message) -> Result<Bytes>;
}

/// Turns one incoming frame into a message.
pub trait Deserializer: Send + Sync {
    fn deserialize(&self, frame: Bytes) -> Result<Message>;
}

impl<F> Serializer for F
where
    F: Fn(&Message) -> Result<Bytes> + Send + Sync,
{
    fn serialize(&self, message: &Message) -> Result<Bytes> {
        self(message)
    }
}

impl<F> Deserializer for F
where
    F: Fn(Bytes) -> Result<Message> + Send + Sync,
{
    fn deserialize(&self, frame: Bytes) -> Result<Message> {
        self(frame)
    }
}

/// Text mode: the message rendered as text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextSerializer;

impl Serializer for TextSerializer {
    fn serialize(&self, message: &Message) -> Result<Bytes> {
        Ok(match message {
            Message::Text(text) => Bytes::copy_from_slice(text.as_bytes()),
            Message::Json(value) => Bytes::from(serde_json::to_vec(value)?),
            Message::Binary(bytes) => bytes.clone(),
        })
    }
}

/// Text mode: the frame as (lossy) UTF-8 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextDeserializer;

impl Deserializer for TextDeserializer {
    fn deserialize(&self, frame: Bytes) -> Result<Message> {
        Ok(Message::Text(String::from_utf8_lossy(&frame).into_owned()))
    }
}

/// JSON mode: compact single-line JSON. Text messages become JSON strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize(&self, message: &Message) -> Result<Bytes> {
        let encoded = match message {
            Message::Json(value) => serde_json::to_vec(value)?,
            Message::Text(text) => serde_json::to_vec(text)?,
            Message::Binary(_) => {
                return Err(CodecError::Unsupported {
                    mode: Mode::Json,
                    kind: message.kind(),
                })
            }
        };
        Ok(Bytes::from(encoded))
    }
}

/// JSON mode: the frame parsed as one JSON document.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDeserializer;

impl Deserializer for JsonDeserializer {
    fn deserialize(&self, frame: Bytes) -> Result<Message> {
        Ok(Message::Json(serde_json::from_slice(&frame)?))
    }
}

/// Binary mode: bytes unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinarySerializer;

impl Serializer for BinarySerializer {
    fn serialize(&self, message: &Message) -> Result<Bytes> {
        match message {
            Message::Binary(bytes) => Ok(bytes.clone()),
            Message::Text(text) => Ok(Bytes::copy_from_slice(text.as_bytes())),
            Message::Json(_) => Err(CodecError::Unsupported {
                mode: Mode::Binary,
                kind: message.kind(),
            }),
        }
    }
}

/// Binary mode: the raw chunk is the message.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryDeserializer;

impl Deserializer for BinaryDeserializer {
    fn deserialize(&self, frame: Bytes) -> Result<Message> {
        Ok(Message::Binary(frame))
    }
}

/// Serializer, deserializer and framing for one stream.
#[derive(Clone)]
pub struct Codec {
    mode: Mode,
    framing: Framing,
    serializer: Arc<dyn Serializer>,
    deserializer: Arc<dyn Deserializer>,
}

impl Codec {
    /// The default strategy pair and framing for `mode`.
    pub fn new(mode: Mode) -> Self {
        let serializer: Arc<dyn Serializer> = match mode {
            Mode::Text => Arc::new(TextSerializer),
            Mode::Json => Arc::new(JsonSerializer),
            Mode::Binary => Arc::new(BinarySerializer),
        };
        let deserializer: Arc<dyn Deserializer> = match mode {
            Mode::Text => Arc::new(TextDeserializer),
            Mode::Json => Arc::new(JsonDeserializer),
            Mode::Binary => Arc::new(BinaryDeserializer),
        };
        Self {
            mode,
            framing: mode.framing(),
            serializer,
            deserializer,
        }
    }

    /// Replace the framing (e.g. a custom terminator).
    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    /// Replace the outgoing direction only.
    pub fn with_serializer(mut self, serializer: impl Serializer + 'static) -> Self {
        self.serializer = Arc::new(serializer);
        self
    }

    /// Replace the incoming direction only.
    pub fn with_deserializer(mut self, deserializer: impl Deserializer + 'static) -> Self {
        self.deserializer = Arc::new(deserializer);
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn framing(&self) -> &Framing {
        &self.framing
    }

    /// Render an outgoing message as payload bytes (no terminator).
    pub fn serialize(&self, message: &Message) -> Result<Bytes> {
        self.serializer.serialize(message).inspect_err(|err| {
            debug!(mode = %self.mode, kind = message.kind(), error = %err, "serialize failed");
        })
    }

    /// Decode one incoming frame.
    pub fn deserialize(&self, frame: Bytes) -> Result<Message> {
        let len = frame.len();
        self.deserializer.deserialize(frame).inspect_err(|err| {
            debug!(mode = %self.mode, len, error = %err, "deserialize failed");
        })
    }

    /// Shared handle to the deserializer, for use on another task.
    pub fn deserializer(&self) -> Arc<dyn Deserializer> {
        Arc::clone(&self.deserializer)
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(Mode::default())
    }
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec")
            .field("mode", &self.mode)
            .field("framing", &self.framing)
            .finish_non_exhaustive()
    }
}
