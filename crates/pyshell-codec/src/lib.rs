//! Per-mode message serializers and deserializers.
//!
//! A [`Codec`] pairs a [`Serializer`] (outgoing messages to payload bytes)
//! with a [`Deserializer`] (incoming frames to messages) and the framing the
//! mode implies. Either direction can be replaced with a closure without
//! touching the other.

pub mod codec;
pub mod error;
pub mod message;
pub mod mode;

pub use codec::{
    BinaryDeserializer, BinarySerializer, Codec, Deserializer, JsonDeserializer, JsonSerializer,
    Serializer, TextDeserializer, TextSerializer,
};
pub use error::{CodecError, Result};
pub use message::Message;
pub use mode::Mode;
