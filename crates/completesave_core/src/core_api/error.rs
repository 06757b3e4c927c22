use std::error::Error;
use std::fmt;

use crate::container::ContainerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreErrorCode {
    /// The bytes are not a well-formed container, or could not be encoded as one.
    Container,
    /// The container decoded but its payload is not UTF-8 JSON.
    Payload,
    UnsupportedOperation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreError {
    pub code: CoreErrorCode,
    pub message: String,
    pub frame: Option<usize>,
    pub offset: Option<usize>,
}

impl CoreError {
    pub fn new(code: CoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            frame: None,
            offset: None,
        }
    }

    pub fn container(context: &str, err: &ContainerError) -> Self {
        Self {
            code: CoreErrorCode::Container,
            message: format!("{context}: {err}"),
            frame: err.frame_index(),
            offset: err.offset(),
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl Error for CoreError {}
