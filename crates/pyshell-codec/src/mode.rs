use std::fmt;
use std::str::FromStr;

use pyshell_frame::Framing;
use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Encoding and framing strategy for one stream direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// One line of text per message.
    #[default]
    Text,
    /// One compact JSON document per line.
    Json,
    /// Raw bytes, one message per chunk read.
    Binary,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Text => "text",
            Mode::Json => "json",
            Mode::Binary => "binary",
        }
    }

    /// Framing implied by the mode: line framing for text and json,
    /// passthrough for binary.
    pub fn framing(self) -> Framing {
        match self {
            Mode::Text | Mode::Json => Framing::lines(),
            Mode::Binary => Framing::passthrough(),
        }
    }

    /// Framing with `terminator` in place of the line ending. Binary mode
    /// ignores the terminator.
    pub fn framing_with_terminator(self, terminator: &str) -> Framing {
        match self {
            Mode::Text | Mode::Json => Framing::delimited(terminator.as_bytes().to_vec()),
            Mode::Binary => Framing::passthrough(),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Mode::Text),
            "json" => Ok(Mode::Json),
            "binary" => Ok(Mode::Binary),
            _ => Err(CodecError::UnknownMode(s.to_string())),
        }
    }
}
