//! CompleteSave container codec.
//!
//! A container is a 53-byte [`ContainerHeader`] followed by frames running
//! to end of file. Each frame is
//!
//! ```text
//! uncompressed_size: u32 LE
//! compressed_size:   u32 LE   (marker + stream + checksum)
//! marker:            78 9c
//! stream:            raw deflate, compressed_size - 6 bytes
//! checksum:          adler32 of the inflated bytes, u32 BE
//! ```
//!
//! Concatenating the inflated frames yields the payload, a UTF-8 JSON document.

mod error;
pub mod frame;
pub mod header;

pub use error::{ContainerError, Location};
pub use flate2::Compression;
pub use frame::{CHUNK_SIZE, FRAME_OVERHEAD, FRAME_SIZE_FIELDS_LENGTH, FrameInfo, STREAM_MARKER};
pub use header::{
    CONTENT_HASH_LENGTH, ContainerHeader, FILE_TYPE_LENGTH, HEADER_LENGTH, HEADER_MARKER,
    content_hash,
};

use tracing::debug;

use crate::layout::{FileLayout, SectionId};
use crate::reader::SliceReader;

/// Everything learned while walking a container.
#[derive(Debug, Clone)]
pub struct DecodedContainer {
    /// The raw 53 header bytes, returned untouched.
    pub header_bytes: Vec<u8>,
    pub header: ContainerHeader,
    pub payload: Vec<u8>,
    pub frames: Vec<FrameInfo>,
    pub layout: FileLayout,
    pub computed_hash: [u8; CONTENT_HASH_LENGTH],
}

impl DecodedContainer {
    pub fn hash_matches(&self) -> bool {
        self.header.content_hash == self.computed_hash
    }

    /// Whether the header size fields agree with the frames actually present.
    pub fn sizes_match(&self) -> bool {
        self.header.compressed_size as usize == self.layout.frames_len()
            && self.header.uncompressed_size as usize == self.payload.len()
    }
}

struct Walk {
    header_bytes: Vec<u8>,
    payload: Vec<u8>,
    frames: Vec<FrameInfo>,
    layout: FileLayout,
}

fn walk(raw: &[u8]) -> Result<Walk, ContainerError> {
    let mut r = SliceReader::new(raw);
    let header_bytes = r
        .read_bytes(HEADER_LENGTH)
        .map_err(|oob| ContainerError::truncated(Location::Header, oob))?
        .to_vec();

    let mut layout = FileLayout {
        file_len: raw.len(),
        sections: Vec::new(),
    };
    layout.push(SectionId::Header, 0, HEADER_LENGTH);

    let mut payload = Vec::new();
    let mut frames = Vec::new();
    while !r.is_at_end() {
        let index = frames.len();
        let start = r.position();
        let (info, bytes) = frame::read_frame(&mut r, index)?;
        layout.push(SectionId::Frame(index), start, r.position());
        payload.extend_from_slice(&bytes);
        frames.push(info);
    }

    debug!(
        frames = frames.len(),
        payload = payload.len(),
        "decoded container"
    );
    Ok(Walk {
        header_bytes,
        payload,
        frames,
        layout,
    })
}

/// Splits a container into its opaque header bytes and inflated payload.
pub fn decode(raw: &[u8]) -> Result<(Vec<u8>, Vec<u8>), ContainerError> {
    let walk = walk(raw)?;
    Ok((walk.header_bytes, walk.payload))
}

/// Like [`decode`], additionally reporting per-frame diagnostics, the byte
/// layout, and the header as parsed fields.
pub fn decode_with_layout(raw: &[u8]) -> Result<DecodedContainer, ContainerError> {
    let walk = walk(raw)?;
    let header = ContainerHeader::parse(&walk.header_bytes)?;
    let computed_hash = content_hash(&raw[HEADER_LENGTH..]);

    Ok(DecodedContainer {
        header_bytes: walk.header_bytes,
        header,
        payload: walk.payload,
        frames: walk.frames,
        layout: walk.layout,
        computed_hash,
    })
}

/// Builds containers from payload bytes.
#[derive(Debug, Clone, Copy)]
pub struct Encoder {
    chunk_size: usize,
    level: Compression,
}

impl Default for Encoder {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            level: Compression::default(),
        }
    }
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_level(mut self, level: Compression) -> Self {
        self.level = level;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Encodes `payload` behind a fresh header. Only the first four bytes of
    /// `header_prefix` (the file type) are used; every other header field is
    /// recomputed. Nothing is returned unless every frame encoded.
    pub fn encode(&self, header_prefix: &[u8], payload: &[u8]) -> Result<Vec<u8>, ContainerError> {
        let file_type: [u8; FILE_TYPE_LENGTH] = SliceReader::new(header_prefix)
            .read_array()
            .map_err(|oob| ContainerError::truncated(Location::Header, oob))?;

        if self.chunk_size == 0 {
            return Err(ContainerError::encode(
                Location::Header,
                "chunk size must be non-zero",
            ));
        }
        if u32::try_from(payload.len()).is_err() {
            return Err(ContainerError::encode(
                Location::Header,
                format!("payload of {} bytes exceeds u32 size field", payload.len()),
            ));
        }

        let mut frames = Vec::new();
        for (index, chunk) in payload.chunks(self.chunk_size).enumerate() {
            frame::write_frame(chunk, index, self.level, &mut frames)?;
        }

        let header = ContainerHeader::build(file_type, &frames, payload.len())?;
        debug!(
            payload = payload.len(),
            frames_len = frames.len(),
            hash = header.content_hash_str().unwrap_or_default(),
            "encoded container"
        );

        let mut out = Vec::with_capacity(HEADER_LENGTH + frames.len());
        out.extend_from_slice(&header.to_bytes());
        out.extend_from_slice(&frames);
        Ok(out)
    }
}

/// Encodes with the default 1 MiB chunking and compression level.
pub fn encode(header_prefix: &[u8], payload: &[u8]) -> Result<Vec<u8>, ContainerError> {
    Encoder::default().encode(header_prefix, payload)
}
