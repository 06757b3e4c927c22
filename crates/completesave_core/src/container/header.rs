use md5::{Digest, Md5};
use serde::Serialize;

use super::error::{ContainerError, Location};
use crate::reader::SliceReader;

pub const HEADER_LENGTH: usize = 53;
pub const FILE_TYPE_LENGTH: usize = 4;
pub const CONTENT_HASH_LENGTH: usize = 32;
pub const HEADER_MARKER: u8 = 3;

const PADDING: [u8; 4] = [0; 4];

/// Fixed 53-byte prefix of a container.
///
/// Layout: file type (4), compressed size LE (4), zero pad (4), uncompressed
/// size LE (4), zero pad (4), lowercase hex MD5 of the frame bytes (32),
/// marker (1). The decoder never trusts these fields; they are rebuilt on
/// every encode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerHeader {
    pub file_type: [u8; FILE_TYPE_LENGTH],
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    #[serde(serialize_with = "serialize_hash")]
    pub content_hash: [u8; CONTENT_HASH_LENGTH],
    pub marker: u8,
}

impl ContainerHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self, ContainerError> {
        let mut r = SliceReader::new(bytes);
        let truncated = |oob| ContainerError::truncated(Location::Header, oob);

        let file_type = r.read_array().map_err(truncated)?;
        let compressed_size = r.read_u32_le().map_err(truncated)?;
        r.skip(PADDING.len()).map_err(truncated)?;
        let uncompressed_size = r.read_u32_le().map_err(truncated)?;
        r.skip(PADDING.len()).map_err(truncated)?;
        let content_hash = r.read_array().map_err(truncated)?;
        let marker = r.read_u8().map_err(truncated)?;

        Ok(Self {
            file_type,
            compressed_size,
            uncompressed_size,
            content_hash,
            marker,
        })
    }

    /// Builds a header describing `frames`, which encode `payload_len` bytes.
    pub fn build(
        file_type: [u8; FILE_TYPE_LENGTH],
        frames: &[u8],
        payload_len: usize,
    ) -> Result<Self, ContainerError> {
        let compressed_size = u32::try_from(frames.len()).map_err(|_| {
            ContainerError::encode(
                Location::Header,
                format!("frame sequence of {} bytes exceeds u32 size field", frames.len()),
            )
        })?;
        let uncompressed_size = u32::try_from(payload_len).map_err(|_| {
            ContainerError::encode(
                Location::Header,
                format!("payload of {payload_len} bytes exceeds u32 size field"),
            )
        })?;

        Ok(Self {
            file_type,
            compressed_size,
            uncompressed_size,
            content_hash: content_hash(frames),
            marker: HEADER_MARKER,
        })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LENGTH] {
        let mut out = [0u8; HEADER_LENGTH];
        let fields: [&[u8]; 7] = [
            &self.file_type,
            &self.compressed_size.to_le_bytes(),
            &PADDING,
            &self.uncompressed_size.to_le_bytes(),
            &PADDING,
            &self.content_hash,
            &[self.marker],
        ];
        let mut pos = 0;
        for field in fields {
            out[pos..pos + field.len()].copy_from_slice(field);
            pos += field.len();
        }
        out
    }

    pub fn file_type_lossy(&self) -> String {
        String::from_utf8_lossy(&self.file_type).into_owned()
    }

    pub fn content_hash_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.content_hash).ok()
    }
}

/// MD5 of the frame sequence as lowercase hex text, the form stored in the header.
pub fn content_hash(frames: &[u8]) -> [u8; CONTENT_HASH_LENGTH] {
    let digest = Md5::digest(frames);
    let mut out = [0u8; CONTENT_HASH_LENGTH];
    // 16 digest bytes always encode to exactly 32 hex characters.
    out.copy_from_slice(hex::encode(digest).as_bytes());
    out
}

fn serialize_hash<S: serde::Serializer>(
    hash: &[u8; CONTENT_HASH_LENGTH],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_lowercase_hex_of_md5() {
        // md5("") is a well-known constant.
        assert_eq!(&content_hash(b""), b"d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn field_offsets_match_fixed_layout() {
        let header = ContainerHeader::build(*b"SAVE", &[1, 2, 3], 7).unwrap();
        let bytes = header.to_bytes();

        assert_eq!(&bytes[0..4], b"SAVE");
        assert_eq!(&bytes[4..8], &3u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &[0; 4]);
        assert_eq!(&bytes[12..16], &7u32.to_le_bytes());
        assert_eq!(&bytes[16..20], &[0; 4]);
        assert_eq!(&bytes[20..52], &content_hash(&[1, 2, 3]));
        assert_eq!(bytes[52], HEADER_MARKER);
        assert_eq!(ContainerHeader::parse(&bytes).unwrap(), header);
    }

    #[test]
    fn parse_rejects_short_header() {
        let err = ContainerHeader::parse(&[0u8; 52]).unwrap_err();
        assert!(matches!(
            err,
            ContainerError::TruncatedInput {
                location: Location::Header,
                offset: 52,
                needed: 1,
                available: 0,
            }
        ));
    }
}
