use std::io::{self, Write};

use flate2::write::DeflateEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use serde::Serialize;
use tracing::{debug, trace, warn};

use super::error::{ContainerError, Location};
use crate::reader::SliceReader;

/// The two little-endian size fields that open every frame.
pub const FRAME_SIZE_FIELDS_LENGTH: usize = 8;
/// zlib-style tag written before each stream. The stream itself is raw deflate.
pub const STREAM_MARKER: [u8; 2] = [0x78, 0x9c];
/// Marker plus trailing checksum, counted in `compressed_size`.
pub const FRAME_OVERHEAD: usize = STREAM_MARKER.len() + CHECKSUM_LENGTH;
/// Payload bytes per frame on encode.
pub const CHUNK_SIZE: usize = 1024 * 1024;

const CHECKSUM_LENGTH: usize = 4;
const INFLATE_STEP: usize = 64 * 1024;

/// Diagnostics for one decoded frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameInfo {
    pub index: usize,
    pub offset: usize,
    pub uncompressed_size: u32,
    pub compressed_size: u32,
    pub stream_marker: [u8; 2],
    pub checksum: u32,
    pub computed_checksum: u32,
    pub decompressed_len: usize,
}

impl FrameInfo {
    pub fn stream_marker_ok(&self) -> bool {
        self.stream_marker == STREAM_MARKER
    }

    pub fn checksum_ok(&self) -> bool {
        self.checksum == self.computed_checksum
    }

    pub fn size_ok(&self) -> bool {
        self.decompressed_len == self.uncompressed_size as usize
    }

    pub fn is_clean(&self) -> bool {
        self.stream_marker_ok() && self.checksum_ok() && self.size_ok()
    }

    /// Bytes the frame occupies in the container, size fields included.
    pub fn total_len(&self) -> usize {
        FRAME_SIZE_FIELDS_LENGTH + self.compressed_size as usize
    }
}

/// Reads the frame at the reader's cursor and inflates its stream.
///
/// Only framing and the deflate stream itself can fail the read. A wrong
/// marker, checksum or declared size is logged and recorded in the returned
/// [`FrameInfo`].
pub fn read_frame(
    r: &mut SliceReader<'_>,
    index: usize,
) -> Result<(FrameInfo, Vec<u8>), ContainerError> {
    let offset = r.position();
    let truncated = |oob| ContainerError::truncated(Location::Frame(index), oob);

    let uncompressed_size = r.read_u32_le().map_err(truncated)?;
    let compressed_size = r.read_u32_le().map_err(truncated)?;
    trace!(index, offset, uncompressed_size, compressed_size, "frame sizes");

    let body_len = compressed_size as usize;
    if body_len < FRAME_OVERHEAD {
        return Err(ContainerError::TruncatedInput {
            location: Location::Frame(index),
            offset: offset + FRAME_SIZE_FIELDS_LENGTH,
            needed: FRAME_OVERHEAD,
            available: body_len,
        });
    }
    let body = r.read_bytes(body_len).map_err(truncated)?;

    let (marker, rest) = body.split_at(STREAM_MARKER.len());
    let (stream, checksum) = rest.split_at(rest.len() - CHECKSUM_LENGTH);
    let stream_marker = [marker[0], marker[1]];
    let checksum = u32::from_be_bytes([checksum[0], checksum[1], checksum[2], checksum[3]]);

    if stream_marker != STREAM_MARKER {
        warn!(
            index,
            offset,
            "unexpected stream marker {:02x}{:02x}, decoding as raw deflate anyway",
            stream_marker[0],
            stream_marker[1]
        );
    }

    let stream_offset = offset + FRAME_SIZE_FIELDS_LENGTH + STREAM_MARKER.len();
    let decompressed = inflate_raw(stream, uncompressed_size as usize).map_err(|source| {
        ContainerError::Decompression {
            frame: index,
            offset: stream_offset,
            source,
        }
    })?;

    let info = FrameInfo {
        index,
        offset,
        uncompressed_size,
        compressed_size,
        stream_marker,
        checksum,
        computed_checksum: adler::adler32_slice(&decompressed),
        decompressed_len: decompressed.len(),
    };

    if !info.size_ok() {
        warn!(
            index,
            declared = uncompressed_size,
            actual = decompressed.len(),
            "frame inflated to a different size than declared"
        );
    }
    if !info.checksum_ok() {
        warn!(
            index,
            stored = info.checksum,
            computed = info.computed_checksum,
            "frame checksum mismatch"
        );
    }
    debug!(
        index,
        offset,
        compressed = body_len,
        inflated = decompressed.len(),
        "decoded frame"
    );

    Ok((info, decompressed))
}

/// Inflates a headerless deflate stream, requiring it to reach its final block.
fn inflate_raw(stream: &[u8], size_hint: usize) -> io::Result<Vec<u8>> {
    let mut inflater = Decompress::new(false);
    let mut out = Vec::with_capacity(size_hint.min(4 * CHUNK_SIZE));

    loop {
        if out.len() == out.capacity() {
            out.reserve(INFLATE_STEP);
        }
        let in_before = inflater.total_in();
        let out_before = inflater.total_out();
        let input = &stream[in_before as usize..];

        let status = inflater
            .decompress_vec(input, &mut out, FlushDecompress::None)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        if status == Status::StreamEnd {
            break;
        }
        if inflater.total_in() == in_before && inflater.total_out() == out_before {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "deflate stream ended before its final block",
            ));
        }
    }

    let unused = stream.len() - inflater.total_in() as usize;
    if unused > 0 {
        warn!(unused, "ignoring bytes after end of deflate stream");
    }
    Ok(out)
}

/// Compresses `chunk` into one frame appended to `out`. Returns the frame length.
pub fn write_frame(
    chunk: &[u8],
    index: usize,
    level: Compression,
    out: &mut Vec<u8>,
) -> Result<usize, ContainerError> {
    let location = Location::Frame(index);
    let uncompressed_size = u32::try_from(chunk.len()).map_err(|_| {
        ContainerError::encode(
            location,
            format!("chunk of {} bytes exceeds u32 size field", chunk.len()),
        )
    })?;

    let mut encoder = DeflateEncoder::new(Vec::new(), level);
    encoder
        .write_all(chunk)
        .map_err(|e| ContainerError::encode(location, format!("deflate failed: {e}")))?;
    let stream = encoder
        .finish()
        .map_err(|e| ContainerError::encode(location, format!("deflate failed: {e}")))?;

    let compressed_size = stream
        .len()
        .checked_add(FRAME_OVERHEAD)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| {
            ContainerError::encode(
                location,
                format!("compressed stream of {} bytes exceeds u32 size field", stream.len()),
            )
        })?;

    let start = out.len();
    out.extend_from_slice(&uncompressed_size.to_le_bytes());
    out.extend_from_slice(&compressed_size.to_le_bytes());
    out.extend_from_slice(&STREAM_MARKER);
    out.extend_from_slice(&stream);
    out.extend_from_slice(&adler::adler32_slice(chunk).to_be_bytes());

    debug!(
        index,
        uncompressed = chunk.len(),
        compressed = compressed_size,
        "encoded frame"
    );
    Ok(out.len() - start)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_frame(chunk: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        write_frame(chunk, 0, Compression::default(), &mut out).unwrap();
        out
    }

    #[test]
    fn frame_fields_describe_body() {
        let chunk = br#"{"a":1}"#;
        let frame = single_frame(chunk);

        let uncompressed = u32::from_le_bytes(frame[0..4].try_into().unwrap());
        let compressed = u32::from_le_bytes(frame[4..8].try_into().unwrap());
        assert_eq!(uncompressed as usize, chunk.len());
        assert_eq!(compressed as usize, frame.len() - FRAME_SIZE_FIELDS_LENGTH);
        assert_eq!(&frame[8..10], &STREAM_MARKER);

        let tail: [u8; 4] = frame[frame.len() - 4..].try_into().unwrap();
        assert_eq!(u32::from_be_bytes(tail), adler::adler32_slice(chunk));
    }

    #[test]
    fn read_frame_inflates_and_verifies() {
        let chunk = b"hello hello hello hello";
        let frame = single_frame(chunk);
        let mut r = SliceReader::new(&frame);

        let (info, bytes) = read_frame(&mut r, 0).unwrap();
        assert_eq!(bytes, chunk);
        assert!(info.is_clean());
        assert_eq!(info.total_len(), frame.len());
        assert!(r.is_at_end());
    }

    #[test]
    fn bad_marker_and_checksum_are_not_fatal() {
        let chunk = b"payload";
        let mut frame = single_frame(chunk);
        frame[8] = 0x00;
        let last = frame.len() - 1;
        frame[last] ^= 0xff;

        let (info, bytes) = read_frame(&mut SliceReader::new(&frame), 3).unwrap();
        assert_eq!(bytes, chunk);
        assert!(!info.stream_marker_ok());
        assert!(!info.checksum_ok());
        assert_eq!(info.index, 3);
    }

    #[test]
    fn body_shorter_than_overhead_is_truncation() {
        let mut frame = vec![0u8; 8];
        frame[4..8].copy_from_slice(&5u32.to_le_bytes());
        frame.extend_from_slice(&[0; 5]);

        let err = read_frame(&mut SliceReader::new(&frame), 0).unwrap_err();
        assert!(matches!(
            err,
            ContainerError::TruncatedInput {
                location: Location::Frame(0),
                needed: FRAME_OVERHEAD,
                available: 5,
                ..
            }
        ));
    }

    #[test]
    fn truncated_deflate_stream_is_a_decompression_error() {
        let chunk: Vec<u8> = (0..4096u32).flat_map(|v| v.to_le_bytes()).collect();
        let frame = single_frame(&chunk);

        // Keep the framing consistent but cut the deflate stream in half.
        let stream_len = frame.len() - FRAME_SIZE_FIELDS_LENGTH - FRAME_OVERHEAD;
        let keep = stream_len / 2;
        let mut cut = Vec::new();
        cut.extend_from_slice(&frame[0..4]);
        cut.extend_from_slice(&((keep + FRAME_OVERHEAD) as u32).to_le_bytes());
        cut.extend_from_slice(&frame[8..10 + keep]);
        cut.extend_from_slice(&frame[frame.len() - 4..]);

        let err = read_frame(&mut SliceReader::new(&cut), 0).unwrap_err();
        assert!(matches!(err, ContainerError::Decompression { frame: 0, offset: 10, .. }));
    }
}
