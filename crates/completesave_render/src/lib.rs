use std::fmt::Write as _;

use completesave_core::container::FrameInfo;
use completesave_core::core_api::Session;
use serde_json::{Map as JsonMap, Value as JsonValue};

const LABEL_WIDTH: usize = 22;
const TOP_LEVEL_KEY_LIMIT: usize = 16;

pub fn render_summary_text(session: &Session) -> String {
    let snapshot = session.snapshot();
    let mut out = String::new();

    let _ = writeln!(out, " ::: CompleteSave :::");
    push_row(&mut out, "File type", &snapshot.file_type);
    push_row(&mut out, "File size", &format_bytes(snapshot.file_len));
    push_row(&mut out, "Frames", &snapshot.frame_count.to_string());
    push_row(&mut out, "Payload size", &format_bytes(snapshot.payload_len));
    push_row(
        &mut out,
        "Header sizes",
        &format!(
            "{} compressed / {} uncompressed{}",
            snapshot.header_compressed_size,
            snapshot.header_uncompressed_size,
            if snapshot.sizes_match { "" } else { " (stale)" }
        ),
    );
    push_row(&mut out, "Content hash", &snapshot.stored_hash);
    push_row(
        &mut out,
        "Hash check",
        if snapshot.hash_matches {
            "ok"
        } else {
            "MISMATCH"
        },
    );
    if snapshot.frames_with_warnings > 0 {
        push_row(
            &mut out,
            "Frame warnings",
            &snapshot.frames_with_warnings.to_string(),
        );
    }

    let keys = top_level_keys(session.document());
    if !keys.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, " ::: Document :::");
        for key in keys.iter().take(TOP_LEVEL_KEY_LIMIT) {
            let _ = writeln!(out, "  {key}");
        }
        if keys.len() > TOP_LEVEL_KEY_LIMIT {
            let _ = writeln!(out, "  ... {} more", keys.len() - TOP_LEVEL_KEY_LIMIT);
        }
    }

    out
}

pub fn render_summary_json(session: &Session) -> JsonValue {
    let snapshot = session.snapshot();
    let mut out = JsonMap::new();

    out.insert(
        "file_type".to_string(),
        JsonValue::String(snapshot.file_type.clone()),
    );
    out.insert("file_len".to_string(), JsonValue::from(snapshot.file_len));
    out.insert(
        "frame_count".to_string(),
        JsonValue::from(snapshot.frame_count),
    );
    out.insert(
        "payload_len".to_string(),
        JsonValue::from(snapshot.payload_len),
    );
    out.insert(
        "header_compressed_size".to_string(),
        JsonValue::from(snapshot.header_compressed_size),
    );
    out.insert(
        "header_uncompressed_size".to_string(),
        JsonValue::from(snapshot.header_uncompressed_size),
    );
    out.insert("sizes_match".to_string(), JsonValue::Bool(snapshot.sizes_match));
    out.insert(
        "stored_hash".to_string(),
        JsonValue::String(snapshot.stored_hash.clone()),
    );
    out.insert(
        "computed_hash".to_string(),
        JsonValue::String(snapshot.computed_hash.clone()),
    );
    out.insert(
        "hash_matches".to_string(),
        JsonValue::Bool(snapshot.hash_matches),
    );
    out.insert(
        "frames_with_warnings".to_string(),
        JsonValue::from(snapshot.frames_with_warnings),
    );
    out.insert(
        "top_level_keys".to_string(),
        JsonValue::Array(
            top_level_keys(session.document())
                .into_iter()
                .map(JsonValue::String)
                .collect(),
        ),
    );

    JsonValue::Object(out)
}

pub fn render_frame_table(frames: &[FrameInfo]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>5}  {:>10}  {:>12}  {:>10}  {:>10}  {}",
        "frame", "offset", "uncompressed", "compressed", "adler32", "status"
    );
    for frame in frames {
        let _ = writeln!(
            out,
            "{:>5}  {:>10}  {:>12}  {:>10}  {:>10}  {}",
            frame.index,
            format!("0x{:08x}", frame.offset),
            frame.uncompressed_size,
            frame.compressed_size,
            format!("{:08x}", frame.checksum),
            frame_status(frame),
        );
    }
    out
}

pub fn render_frames_json(frames: &[FrameInfo]) -> JsonValue {
    JsonValue::Array(frames.iter().map(frame_to_json).collect())
}

fn frame_to_json(frame: &FrameInfo) -> JsonValue {
    let mut out = JsonMap::new();
    out.insert("index".to_string(), JsonValue::from(frame.index));
    out.insert("offset".to_string(), JsonValue::from(frame.offset));
    out.insert(
        "uncompressed_size".to_string(),
        JsonValue::from(frame.uncompressed_size),
    );
    out.insert(
        "compressed_size".to_string(),
        JsonValue::from(frame.compressed_size),
    );
    out.insert("checksum".to_string(), JsonValue::from(frame.checksum));
    out.insert(
        "stream_marker_ok".to_string(),
        JsonValue::Bool(frame.stream_marker_ok()),
    );
    out.insert(
        "checksum_ok".to_string(),
        JsonValue::Bool(frame.checksum_ok()),
    );
    out.insert("size_ok".to_string(), JsonValue::Bool(frame.size_ok()));
    JsonValue::Object(out)
}

fn frame_status(frame: &FrameInfo) -> String {
    if frame.is_clean() {
        return "ok".to_string();
    }
    let mut issues = Vec::new();
    if !frame.stream_marker_ok() {
        issues.push("marker");
    }
    if !frame.checksum_ok() {
        issues.push("checksum");
    }
    if !frame.size_ok() {
        issues.push("size");
    }
    format!("bad {}", issues.join(","))
}

fn top_level_keys(document: &JsonValue) -> Vec<String> {
    match document {
        JsonValue::Object(map) => match map.get("SslValue") {
            // Saves nest the interesting state one level down.
            Some(JsonValue::Object(inner)) if map.len() <= 2 => inner.keys().cloned().collect(),
            _ => map.keys().cloned().collect(),
        },
        _ => Vec::new(),
    }
}

fn push_row(out: &mut String, label: &str, value: &str) {
    let _ = writeln!(out, "  {:<width$} {}", format!("{label}:"), value, width = LABEL_WIDTH);
}

fn format_bytes(n: usize) -> String {
    let digits = n.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{grouped} bytes")
}
