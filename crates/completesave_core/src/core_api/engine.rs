use serde::Serialize;
use serde_json::Value as JsonValue;
use serde_json::ser::PrettyFormatter;

use crate::container::{self, DecodedContainer, Encoder, FrameInfo};

use super::error::{CoreError, CoreErrorCode};
use super::types::Snapshot;

const PAYLOAD_INDENT: &[u8] = b"   ";

#[derive(Debug, Default, Clone, Copy)]
pub struct Engine {
    encoder: Encoder,
}

/// An opened save: the original header bytes plus the editable JSON document.
#[derive(Debug)]
pub struct Session {
    header_bytes: Vec<u8>,
    snapshot: Snapshot,
    frames: Vec<FrameInfo>,
    document: JsonValue,
    encoder: Encoder,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_encoder(encoder: Encoder) -> Self {
        Self { encoder }
    }

    pub fn open_bytes<B: AsRef<[u8]>>(&self, bytes: B) -> Result<Session, CoreError> {
        let decoded = container::decode_with_layout(bytes.as_ref())
            .map_err(|e| CoreError::container("not a valid CompleteSave container", &e))?;
        let document = parse_payload(&decoded.payload)?;
        Ok(session_from_container(decoded, document, self.encoder))
    }
}

impl Session {
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn frames(&self) -> &[FrameInfo] {
        &self.frames
    }

    pub fn header_bytes(&self) -> &[u8] {
        &self.header_bytes
    }

    pub fn document(&self) -> &JsonValue {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut JsonValue {
        &mut self.document
    }

    pub fn replace_document(&mut self, document: JsonValue) {
        self.document = document;
    }

    /// Looks up a value by JSON pointer (RFC 6901).
    pub fn value_at(&self, pointer: &str) -> Option<&JsonValue> {
        self.document.pointer(pointer)
    }

    /// Sets the value at `pointer`. The parent must already exist; a missing
    /// object member is inserted, and `-` or `len` appends to an array.
    pub fn set_value(&mut self, pointer: &str, value: JsonValue) -> Result<(), CoreError> {
        if pointer.is_empty() {
            self.document = value;
            return Ok(());
        }
        let Some(split) = pointer.rfind('/') else {
            return Err(CoreError::new(
                CoreErrorCode::UnsupportedOperation,
                format!("JSON pointer {pointer:?} must start with '/'"),
            ));
        };
        let (parent_pointer, token) = (&pointer[..split], unescape_token(&pointer[split + 1..]));

        let Some(parent) = self.document.pointer_mut(parent_pointer) else {
            return Err(CoreError::new(
                CoreErrorCode::UnsupportedOperation,
                format!("no value at {parent_pointer:?} to hold {pointer:?}"),
            ));
        };

        match parent {
            JsonValue::Object(map) => {
                map.insert(token, value);
                Ok(())
            }
            JsonValue::Array(items) => {
                let index = if token == "-" {
                    items.len()
                } else {
                    token.parse::<usize>().map_err(|_| {
                        CoreError::new(
                            CoreErrorCode::UnsupportedOperation,
                            format!("{token:?} is not an array index in {pointer:?}"),
                        )
                    })?
                };
                match index.cmp(&items.len()) {
                    std::cmp::Ordering::Less => items[index] = value,
                    std::cmp::Ordering::Equal => items.push(value),
                    std::cmp::Ordering::Greater => {
                        return Err(CoreError::new(
                            CoreErrorCode::UnsupportedOperation,
                            format!(
                                "index {index} out of range for array of {} at {parent_pointer:?}",
                                items.len()
                            ),
                        ));
                    }
                }
                Ok(())
            }
            _ => Err(CoreError::new(
                CoreErrorCode::UnsupportedOperation,
                format!("value at {parent_pointer:?} is neither an object nor an array"),
            )),
        }
    }

    /// Serializes the document in the game's layout: three-space indent,
    /// non-ASCII written as UTF-8. Numbers parsed from the save keep their
    /// original text; numbers inserted by edits use serde_json's formatting,
    /// which can differ from the game's for floats (`1e-5` vs `1e-05`).
    pub fn payload_bytes(&self) -> Result<Vec<u8>, CoreError> {
        let mut out = Vec::new();
        let formatter = PrettyFormatter::with_indent(PAYLOAD_INDENT);
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.document.serialize(&mut serializer).map_err(|e| {
            CoreError::new(
                CoreErrorCode::Payload,
                format!("failed to serialize document: {e}"),
            )
        })?;
        Ok(out)
    }

    /// Encodes the current document behind the original file type.
    pub fn to_bytes_modified(&self) -> Result<Vec<u8>, CoreError> {
        let payload = self.payload_bytes()?;
        self.encoder
            .encode(&self.header_bytes, &payload)
            .map_err(|e| CoreError::container("failed to encode container", &e))
    }
}

fn parse_payload(payload: &[u8]) -> Result<JsonValue, CoreError> {
    let text = std::str::from_utf8(payload).map_err(|e| CoreError {
        code: CoreErrorCode::Payload,
        message: format!("payload is not UTF-8: {e}"),
        frame: None,
        offset: Some(e.valid_up_to()),
    })?;
    serde_json::from_str(text).map_err(|e| {
        CoreError::new(
            CoreErrorCode::Payload,
            format!(
                "payload is not valid JSON at line {}, column {}: {e}",
                e.line(),
                e.column()
            ),
        )
    })
}

fn session_from_container(
    decoded: DecodedContainer,
    document: JsonValue,
    encoder: Encoder,
) -> Session {
    let header = &decoded.header;
    let snapshot = Snapshot {
        file_type: header.file_type_lossy(),
        file_len: decoded.layout.file_len,
        frame_count: decoded.frames.len(),
        payload_len: decoded.payload.len(),
        header_compressed_size: header.compressed_size,
        header_uncompressed_size: header.uncompressed_size,
        stored_hash: String::from_utf8_lossy(&header.content_hash).into_owned(),
        computed_hash: String::from_utf8_lossy(&decoded.computed_hash).into_owned(),
        hash_matches: decoded.hash_matches(),
        sizes_match: decoded.sizes_match(),
        frames_with_warnings: decoded.frames.iter().filter(|f| !f.is_clean()).count(),
    };

    Session {
        header_bytes: decoded.header_bytes,
        snapshot,
        frames: decoded.frames,
        document,
        encoder,
    }
}

fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}
