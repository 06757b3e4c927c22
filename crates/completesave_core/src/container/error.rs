use std::fmt;
use std::io;

use thiserror::Error;

/// Where in the container a failure was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Header,
    Frame(usize),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Header => f.write_str("header"),
            Self::Frame(index) => write!(f, "frame {index}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error(
        "truncated input in {location}: need {needed} bytes at offset {offset}, {available} available"
    )]
    TruncatedInput {
        location: Location,
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("corrupt deflate stream in frame {frame} at offset {offset}: {source}")]
    Decompression {
        frame: usize,
        offset: usize,
        #[source]
        source: io::Error,
    },
    #[error("cannot encode {location}: {reason}")]
    Encode { location: Location, reason: String },
}

impl ContainerError {
    pub(crate) fn truncated(location: Location, oob: crate::reader::OutOfBounds) -> Self {
        Self::TruncatedInput {
            location,
            offset: oob.offset,
            needed: oob.needed,
            available: oob.available,
        }
    }

    pub(crate) fn encode(location: Location, reason: impl Into<String>) -> Self {
        Self::Encode {
            location,
            reason: reason.into(),
        }
    }

    /// Index of the frame the error was raised in, if any.
    pub fn frame_index(&self) -> Option<usize> {
        match self {
            Self::TruncatedInput {
                location: Location::Frame(i),
                ..
            }
            | Self::Encode {
                location: Location::Frame(i),
                ..
            } => Some(*i),
            Self::Decompression { frame, .. } => Some(*frame),
            _ => None,
        }
    }

    /// Byte offset into the container the error refers to, if known.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::TruncatedInput { offset, .. } | Self::Decompression { offset, .. } => {
                Some(*offset)
            }
            _ => None,
        }
    }
}
