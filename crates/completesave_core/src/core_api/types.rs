use serde::{Deserialize, Serialize};

/// Container facts captured when a session is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub file_type: String,
    pub file_len: usize,
    pub frame_count: usize,
    pub payload_len: usize,
    pub header_compressed_size: u32,
    pub header_uncompressed_size: u32,
    pub stored_hash: String,
    pub computed_hash: String,
    pub hash_matches: bool,
    pub sizes_match: bool,
    /// Frames with a wrong marker, checksum, or declared size.
    pub frames_with_warnings: usize,
}
