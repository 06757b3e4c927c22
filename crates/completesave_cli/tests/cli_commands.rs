use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use completesave_core::container::{HEADER_LENGTH, decode, encode};
use serde_json::{Value, json};

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..")
}

fn fixture_path() -> String {
    workspace_root()
        .join("tests/fixtures/CompleteSave")
        .to_string_lossy()
        .to_string()
}

fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_completesave-se"))
        .args(args)
        .output()
        .expect("failed to run completesave-se CLI")
}

fn temp_output_path(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("{prefix}_{}_{}", std::process::id(), nanos))
}

fn decoded_json(path: &Path) -> Value {
    let bytes = fs::read(path).expect("output should exist");
    let (_, payload) = decode(&bytes).expect("output should be a valid container");
    serde_json::from_slice(&payload).expect("payload should be JSON")
}

#[test]
fn cli_prints_text_summary_by_default() {
    let output = run_cli(&[&fixture_path()]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("::: CompleteSave :::"));
    assert!(stdout.contains("CSAV"));
    assert!(stdout.contains("Frames:"));
    assert!(stdout.contains("Hash check:"));
}

#[test]
fn cli_json_summary_is_parseable() {
    let output = run_cli(&["--json", &fixture_path()]);
    assert!(output.status.success());

    let json: Value = serde_json::from_slice(&output.stdout).expect("stdout should be valid JSON");
    assert_eq!(json["file_type"], "CSAV");
    assert_eq!(json["frame_count"], 3);
    assert_eq!(json["payload_len"], 3_115_071);
    assert_eq!(json["hash_matches"], true);
}

#[test]
fn cli_lists_frames() {
    let output = run_cli(&["--frames", &fixture_path()]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 4);

    let output = run_cli(&["--frames", "--json", &fixture_path()]);
    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).expect("stdout should be valid JSON");
    assert_eq!(json.as_array().map(Vec::len), Some(3));
}

#[test]
fn cli_exports_document_json() {
    let out = temp_output_path("completesave_export");
    let out_str = out.to_string_lossy().to_string();
    let output = run_cli(&["--export-json", &out_str, &fixture_path()]);
    assert!(output.status.success());

    let exported: Value =
        serde_json::from_slice(&fs::read(&out).expect("export should exist")).expect("valid JSON");
    assert_eq!(exported["SslValue"]["money"], 48210);
    let _ = fs::remove_file(out);
}

#[test]
fn cli_export_reflects_edits() {
    let export = temp_output_path("completesave_export_edited");
    let out = temp_output_path("completesave_export_save");
    let export_str = export.to_string_lossy().to_string();
    let out_str = out.to_string_lossy().to_string();
    let output = run_cli(&[
        "--export-json",
        &export_str,
        "--set",
        "/SslValue/money=7",
        "--output",
        &out_str,
        &fixture_path(),
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let exported: Value = serde_json::from_slice(&fs::read(&export).expect("export should exist"))
        .expect("valid JSON");
    assert_eq!(exported["SslValue"]["money"], 7);
    assert_eq!(decoded_json(&out)["SslValue"]["money"], 7);
    let _ = fs::remove_file(export);
    let _ = fs::remove_file(out);
}

#[test]
fn cli_set_writes_edited_save() {
    let out = temp_output_path("completesave_set");
    let out_str = out.to_string_lossy().to_string();
    let output = run_cli(&[
        "--set",
        "/SslValue/money=1000000",
        "--set",
        "/SslValue/companyName=Acme Roads",
        "--output",
        &out_str,
        &fixture_path(),
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let json = decoded_json(&out);
    assert_eq!(json["SslValue"]["money"], 1_000_000);
    assert_eq!(json["SslValue"]["companyName"], "Acme Roads");
    assert_eq!(json["SslValue"]["xp"], 12500);

    let bytes = fs::read(&out).expect("output should exist");
    assert_eq!(&bytes[..4], b"CSAV");
    let _ = fs::remove_file(out);
}

#[test]
fn cli_import_json_replaces_document() {
    let input = temp_output_path("completesave_import_in");
    let out = temp_output_path("completesave_import_out");
    fs::write(&input, r#"{"SslType":"CompleteSave","SslValue":{"xp":1}}"#)
        .expect("failed to write import file");

    let input_str = input.to_string_lossy().to_string();
    let out_str = out.to_string_lossy().to_string();
    let output = run_cli(&[
        "--import-json",
        &input_str,
        "--output",
        &out_str,
        &fixture_path(),
    ]);
    assert!(output.status.success());
    assert_eq!(
        decoded_json(&out),
        json!({"SslType": "CompleteSave", "SslValue": {"xp": 1}})
    );

    let _ = fs::remove_file(input);
    let _ = fs::remove_file(out);
}

#[test]
fn cli_rebuild_preserves_payload() {
    let out = temp_output_path("completesave_rebuild");
    let out_str = out.to_string_lossy().to_string();
    let output = run_cli(&["--rebuild", "--output", &out_str, &fixture_path()]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Wrote edited save to"));

    let original = fs::read(fixture_path()).expect("fixture should exist");
    let rebuilt = fs::read(&out).expect("output should exist");
    let (_, original_payload) = decode(&original).expect("fixture decodes");
    let (rebuilt_header, rebuilt_payload) = decode(&rebuilt).expect("rebuilt decodes");
    assert_eq!(rebuilt_payload, original_payload);
    assert_eq!(rebuilt_header[..4], original[..4]);
    let _ = fs::remove_file(out);
}

#[test]
fn cli_requires_output_for_edits() {
    let output = run_cli(&["--set", "/SslValue/xp=5", &fixture_path()]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("require --output"));
}

#[test]
fn cli_rejects_output_without_edits() {
    let out = temp_output_path("completesave_unused");
    let out_str = out.to_string_lossy().to_string();
    let output = run_cli(&["--output", &out_str, &fixture_path()]);
    assert_eq!(output.status.code(), Some(2));
    assert!(!out.exists());
}

#[test]
fn cli_reports_container_errors_with_frame_context() {
    let mut bytes = encode(b"CSAV", br#"{"a":1}"#).expect("encode should succeed");
    bytes[HEADER_LENGTH + 4..HEADER_LENGTH + 8].copy_from_slice(&u32::MAX.to_le_bytes());
    let path = temp_output_path("completesave_corrupt");
    fs::write(&path, &bytes).expect("failed to write corrupt save");

    let path_str = path.to_string_lossy().to_string();
    let output = run_cli(&[&path_str]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error decoding save file"));
    assert!(stderr.contains("Container"));
    assert!(stderr.contains("at frame 0"));
    let _ = fs::remove_file(path);
}

#[test]
fn cli_reports_payload_errors_separately() {
    let bytes = encode(b"CSAV", b"not json").expect("encode should succeed");
    let path = temp_output_path("completesave_badjson");
    fs::write(&path, &bytes).expect("failed to write save");

    let path_str = path.to_string_lossy().to_string();
    let output = run_cli(&[&path_str]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Payload"));
    let _ = fs::remove_file(path);
}

#[test]
fn cli_rejects_bad_pointer_syntax() {
    let output = run_cli(&["--set", "money=5", "--output", "unused", &fixture_path()]);
    assert_eq!(output.status.code(), Some(2));
}
