//! Data file collection and hierarchy discovery.
//!
//! `--data-paths` mode receives loose files and directories instead of a
//! cataloged repository. Collection walks the given paths for RDF payloads;
//! hierarchy discovery then decides which JSON-LD files are top-level
//! documents and which are fixtures referenced from other files, by
//! matching root `@id` values against references found elsewhere.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_json::Value;
use walkdir::WalkDir;

use crate::error::SuiteResult;

const DATA_EXTENSIONS: &[&str] = &["json", "jsonld", "ttl"];

/// Files found under `paths`, sorted and deduplicated. Directories are
/// walked recursively; explicit file arguments are taken as-is.
pub fn collect_data_files(paths: &[PathBuf]) -> SuiteResult<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = Vec::new();
    for path in paths {
        if path.is_file() {
            files.push(path.clone());
            continue;
        }
        for entry in WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            if has_data_extension(entry.path()) {
                files.push(entry.path().to_path_buf());
            }
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn has_data_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| DATA_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Which collected files are entry points and which back references.
#[derive(Debug, Default)]
pub struct DataHierarchy {
    pub top_level: Vec<PathBuf>,
    /// Root `@id` of each JSON-LD file, for the temporary fixture catalog
    pub iri_to_file: IndexMap<String, PathBuf>,
}

/// Split files into top-level documents and referenced fixtures. A JSON-LD
/// file whose root `@id` is referenced from some other file is a fixture;
/// everything else (including every Turtle file and any unparseable file,
/// which the syntax stage will report) is top-level.
pub fn discover_hierarchy(files: &[PathBuf]) -> SuiteResult<DataHierarchy> {
    let mut hierarchy = DataHierarchy::default();
    let mut referenced: HashSet<String> = HashSet::new();

    let mut parsed: Vec<(PathBuf, Option<String>)> = Vec::new();
    for file in files {
        if !is_json_file(file) {
            parsed.push((file.clone(), None));
            continue;
        }
        let content = std::fs::read_to_string(file)?;
        let Ok(value) = serde_json::from_str::<Value>(&content) else {
            parsed.push((file.clone(), None));
            continue;
        };
        let root = root_id(&value);
        if let Some(id) = &root {
            hierarchy.iri_to_file.insert(id.clone(), file.clone());
        }
        collect_references(&value, true, &mut referenced);
        parsed.push((file.clone(), root));
    }

    for (file, root) in parsed {
        let is_fixture = root.as_ref().is_some_and(|id| referenced.contains(id));
        if !is_fixture {
            hierarchy.top_level.push(file);
        }
    }
    Ok(hierarchy)
}

fn is_json_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("json") | Some("jsonld")
    )
}

/// Root `@id` of a JSON-LD document.
pub fn root_id(value: &Value) -> Option<String> {
    value
        .get("@id")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Collect every `@id` occurring below the document root. The root's own
/// `@id` identifies the document rather than referencing another one.
fn collect_references(value: &Value, is_root: bool, out: &mut HashSet<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key == "@id" && !is_root {
                    if let Some(id) = child.as_str() {
                        out.insert(id.to_string());
                    }
                } else if key != "@context" {
                    collect_references(child, false, out);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_references(item, is_root, out);
            }
        }
        _ => {}
    }
}
