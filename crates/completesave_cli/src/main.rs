use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use completesave_core::core_api::{CoreError, Engine, Session};
use completesave_render::{
    render_frame_table, render_frames_json, render_summary_json, render_summary_text,
};
use serde_json::Value as JsonValue;
use tracing::{debug, info, metadata::LevelFilter};
use tracing_subscriber::{EnvFilter, prelude::*};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// RoadCraft CompleteSave file to read.
    #[arg(value_name = "COMPLETESAVE")]
    path: PathBuf,
    /// Print machine-readable JSON instead of text.
    #[arg(long)]
    json: bool,
    /// List the compressed frames.
    #[arg(long)]
    frames: bool,
    /// Write the JSON document to PATH, after any --import-json and --set edits.
    #[arg(long = "export-json", value_name = "PATH")]
    export_json: Option<PathBuf>,
    /// Replace the document with the JSON in PATH.
    #[arg(long = "import-json", value_name = "PATH")]
    import_json: Option<PathBuf>,
    /// Set a value by JSON pointer, e.g. `/SslValue/money=50000`.
    #[arg(long = "set", value_name = "POINTER=JSON", value_parser = parse_assignment)]
    set: Vec<Assignment>,
    /// Re-encode the save without edits.
    #[arg(long)]
    rebuild: bool,
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
struct Assignment {
    pointer: String,
    value: JsonValue,
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let has_edits = cli.import_json.is_some() || !cli.set.is_empty() || cli.rebuild;

    if has_edits && cli.output.is_none() {
        eprintln!("--import-json, --set and --rebuild require --output <PATH>");
        process::exit(2);
    }
    if !has_edits && cli.output.is_some() {
        eprintln!("--output requires --import-json, --set or --rebuild");
        process::exit(2);
    }

    let bytes = fs::read(&cli.path).unwrap_or_else(|e| {
        eprintln!("Error reading {}: {e}", cli.path.display());
        process::exit(1);
    });

    let mut session = Engine::new().open_bytes(bytes).unwrap_or_else(|e| {
        eprintln!("Error decoding save file: {}", cli.path.display());
        report_core_error(&e);
        process::exit(1);
    });
    debug!(frames = session.snapshot().frame_count, "opened save");

    if let Some(path) = &cli.import_json {
        let document = read_json_document(path);
        session.replace_document(document);
    }
    for assignment in &cli.set {
        session
            .set_value(&assignment.pointer, assignment.value.clone())
            .unwrap_or_else(|e| {
                eprintln!("Error applying --set {}: {e}", assignment.pointer);
                process::exit(1);
            });
    }

    if let Some(path) = &cli.export_json {
        let payload = session.payload_bytes().unwrap_or_else(|e| {
            eprintln!("Error serializing document: {e}");
            process::exit(1);
        });
        write_file(path, &payload);
        info!(path = %path.display(), "exported document");
    }

    if has_edits {
        let out_path = cli.output.as_ref().expect("checked above");
        let edited_bytes = session.to_bytes_modified().unwrap_or_else(|e| {
            eprintln!("Error creating modified save bytes");
            report_core_error(&e);
            process::exit(1);
        });
        write_file(out_path, &edited_bytes);
        info!(path = %out_path.display(), bytes = edited_bytes.len(), "wrote save");
    }

    if cli.json {
        let json = if cli.frames {
            render_frames_json(session.frames())
        } else {
            render_summary_json(&session)
        };
        let rendered = serde_json::to_string_pretty(&json).unwrap_or_else(|e| {
            eprintln!("Error rendering JSON output: {e}");
            process::exit(1);
        });
        println!("{rendered}");
        return;
    }

    if cli.frames {
        print!("{}", render_frame_table(session.frames()));
        return;
    }

    if let Some(out_path) = &cli.output {
        println!("Wrote edited save to {}", out_path.display());
        return;
    }
    if let Some(path) = &cli.export_json {
        println!("Wrote document to {}", path.display());
        return;
    }

    print_summary(&session);
}

fn init_tracing() {
    let subscriber = tracing_subscriber::registry()
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        );
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("warning: tracing subscriber already installed");
    }
}

fn print_summary(session: &Session) {
    print!("{}", render_summary_text(session));
}

fn report_core_error(err: &CoreError) {
    eprintln!("  {err}");
    match (err.frame, err.offset) {
        (Some(frame), Some(offset)) => eprintln!("  at frame {frame}, offset {offset:#x}"),
        (Some(frame), None) => eprintln!("  at frame {frame}"),
        (None, Some(offset)) => eprintln!("  at offset {offset:#x}"),
        (None, None) => {}
    }
}

fn read_json_document(path: &Path) -> JsonValue {
    let text = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading {}: {e}", path.display());
        process::exit(1);
    });
    serde_json::from_str(&text).unwrap_or_else(|e| {
        eprintln!("Error parsing JSON in {}: {e}", path.display());
        process::exit(1);
    })
}

fn write_file(path: &Path, bytes: &[u8]) {
    fs::write(path, bytes).unwrap_or_else(|e| {
        eprintln!("Error writing {}: {e}", path.display());
        process::exit(1);
    });
}

fn parse_assignment(raw: &str) -> Result<Assignment, String> {
    let Some((pointer, value)) = raw.split_once('=') else {
        return Err(format!("expected POINTER=JSON, got {raw:?}"));
    };
    if !pointer.is_empty() && !pointer.starts_with('/') {
        return Err(format!("JSON pointer {pointer:?} must start with '/'"));
    }
    // Bare words are taken as strings so `--set /SslValue/companyName=Acme` works.
    let value =
        serde_json::from_str(value).unwrap_or_else(|_| JsonValue::String(value.to_string()));
    Ok(Assignment {
        pointer: pointer.to_string(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_parses_json_values() {
        let a = parse_assignment("/SslValue/money=50000").unwrap();
        assert_eq!(a.pointer, "/SslValue/money");
        assert_eq!(a.value, JsonValue::from(50000));

        let a = parse_assignment("/list=[1,2]").unwrap();
        assert_eq!(a.value, serde_json::json!([1, 2]));
    }

    #[test]
    fn assignment_falls_back_to_string() {
        let a = parse_assignment("/SslValue/companyName=Acme Roads").unwrap();
        assert_eq!(a.value, JsonValue::String("Acme Roads".to_string()));
    }

    #[test]
    fn assignment_splits_on_first_equals() {
        let a = parse_assignment("/note=a=b").unwrap();
        assert_eq!(a.pointer, "/note");
        assert_eq!(a.value, JsonValue::String("a=b".to_string()));
    }

    #[test]
    fn assignment_requires_pointer_syntax() {
        assert!(parse_assignment("money=5").is_err());
        assert!(parse_assignment("/money").is_err());
    }
}
