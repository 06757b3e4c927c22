use completesave_core::core_api::{CoreError, CoreErrorCode, Engine, Session};
use completesave_render::{
    render_frame_table, render_frames_json, render_summary_json, render_summary_text,
};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct WebInspectOptions {
    pub json_output: bool,
    pub include_frames: bool,
}

#[derive(Debug, Clone)]
struct WebError {
    code: &'static str,
    message: String,
}

#[derive(Debug, Clone, Serialize)]
struct WebErrorPayload {
    code: String,
    message: String,
}

impl WebError {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn from_core(err: CoreError) -> Self {
        let code = match err.code {
            CoreErrorCode::Container => "invalid_container",
            CoreErrorCode::Payload => "invalid_payload",
            CoreErrorCode::UnsupportedOperation => "encode_failed",
        };
        Self::new(code, err.message)
    }

    fn to_js_value(&self) -> JsValue {
        let payload = WebErrorPayload {
            code: self.code.to_string(),
            message: self.message.clone(),
        };
        serde_wasm_bindgen::to_value(&payload).unwrap_or_else(|_| {
            JsValue::from_str(&format!("{}: {}", payload.code, payload.message))
        })
    }
}

#[wasm_bindgen]
pub fn inspect_save(save_bytes: &[u8], options: JsValue) -> Result<String, JsValue> {
    let parsed_options = parse_options(options).map_err(|err| err.to_js_value())?;
    inspect_save_impl(save_bytes, &parsed_options).map_err(|err| err.to_js_value())
}

/// Decodes an uploaded save and returns its JSON document as text.
#[wasm_bindgen]
pub fn extract_payload(save_bytes: &[u8]) -> Result<String, JsValue> {
    extract_payload_impl(save_bytes).map_err(|err| err.to_js_value())
}

/// Re-encodes `document_json` using the file type of `original_bytes`,
/// producing the bytes offered for download.
#[wasm_bindgen]
pub fn rebuild_save(original_bytes: &[u8], document_json: &str) -> Result<Vec<u8>, JsValue> {
    rebuild_save_impl(original_bytes, document_json).map_err(|err| err.to_js_value())
}

fn open_session(save_bytes: &[u8]) -> Result<Session, WebError> {
    if save_bytes.is_empty() {
        return Err(WebError::new(
            "empty_file",
            "The uploaded file is empty. Please provide a CompleteSave file.",
        ));
    }
    Engine::new()
        .open_bytes(save_bytes)
        .map_err(WebError::from_core)
}

fn inspect_save_impl(save_bytes: &[u8], options: &WebInspectOptions) -> Result<String, WebError> {
    let session = open_session(save_bytes)?;

    if options.json_output {
        let value = if options.include_frames {
            serde_json::json!({
                "summary": render_summary_json(&session),
                "frames": render_frames_json(session.frames()),
            })
        } else {
            render_summary_json(&session)
        };
        return serde_json::to_string_pretty(&value).map_err(|err| {
            WebError::new(
                "render_failed",
                format!("failed to serialize rendered JSON output: {err}"),
            )
        });
    }

    let mut text = render_summary_text(&session);
    if options.include_frames {
        text.push('\n');
        text.push_str(&render_frame_table(session.frames()));
    }
    Ok(text)
}

fn extract_payload_impl(save_bytes: &[u8]) -> Result<String, WebError> {
    let session = open_session(save_bytes)?;
    let payload = session.payload_bytes().map_err(WebError::from_core)?;
    String::from_utf8(payload)
        .map_err(|err| WebError::new("invalid_payload", format!("payload is not UTF-8: {err}")))
}

fn rebuild_save_impl(original_bytes: &[u8], document_json: &str) -> Result<Vec<u8>, WebError> {
    let mut session = open_session(original_bytes)?;
    let document = serde_json::from_str(document_json).map_err(|err| {
        WebError::new(
            "invalid_payload",
            format!("edited document is not valid JSON: {err}"),
        )
    })?;
    session.replace_document(document);
    session.to_bytes_modified().map_err(|err| WebError {
        code: "encode_failed",
        message: err.message,
    })
}

fn parse_options(options: JsValue) -> Result<WebInspectOptions, WebError> {
    if options.is_null() || options.is_undefined() {
        return Ok(WebInspectOptions::default());
    }

    serde_wasm_bindgen::from_value(options).map_err(|err| {
        WebError::new(
            "invalid_options",
            format!("Failed to parse inspect options: {err}"),
        )
    })
}
