//! Syntax stage: every file must parse on its own.
//!
//! JSON and JSON-LD files are checked with a plain JSON parse, Turtle files
//! with the RDF parser. Failures are isolated per file; the stage visits
//! everything in scope and reports the worst code (101 for JSON, 102 for
//! Turtle).

use std::path::{Path, PathBuf};

use oxigraph::io::RdfFormat;
use oxigraph::store::Store;
use serde_json::Value;

use crate::checks::StageReport;
use crate::error::{ReturnCode, SuiteResult};
use crate::report::display_path;

pub fn check_files(root: &Path, files: &[PathBuf]) -> SuiteResult<StageReport> {
    let mut report = StageReport::new("check-syntax");
    if files.is_empty() {
        report.record(ReturnCode::Skipped);
        report.push_line("check-syntax: nothing to check");
        return Ok(report);
    }
    for file in files {
        match check_file(file)? {
            Ok(()) => {
                tracing::debug!(file = %file.display(), "syntax ok");
            }
            Err((code, detail)) => {
                report.record(code);
                report.push_line(format!(
                    "Syntax error in {}: {detail}",
                    display_path(file, root)
                ));
            }
        }
    }
    Ok(report)
}

/// Inner result: `Err` carries the per-file failure without aborting the
/// stage. Outer `Err` is reserved for I/O trouble reading the file.
fn check_file(path: &Path) -> SuiteResult<Result<(), (ReturnCode, String)>> {
    let content = std::fs::read_to_string(path)?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") | Some("jsonld") => {
            if let Err(err) = serde_json::from_str::<Value>(&content) {
                return Ok(Err((ReturnCode::JsonSyntaxError, err.to_string())));
            }
        }
        _ => {
            let store = Store::new()?;
            if let Err(err) = store.load_from_reader(RdfFormat::Turtle, content.as_bytes()) {
                return Ok(Err((ReturnCode::TurtleSyntaxError, err.to_string())));
            }
        }
    }
    Ok(Ok(()))
}
