//! Validation results and their rendered form.
//!
//! The rendering produced by [`ValidationResult::render`] is part of the
//! external contract: the failing-tests stage compares it byte-for-byte
//! (after newline normalization) against checked-in `.expected` files, so
//! the output must be deterministic. Violations are emitted in sorted order
//! and IRIs are compacted through the prefix map of the graph they came
//! from.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::ReturnCode;

/// A single SHACL constraint violation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Violation {
    pub focus_node: String,
    pub path: Option<String>,
    pub constraint: Option<String>,
    pub message: String,
}

/// Outcome of validating one data file (or one artifact set). Immutable
/// once produced.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub return_code: ReturnCode,
    pub conforms: bool,
    pub violations: Vec<Violation>,
    /// Non-violation findings (resolution failures, stitching notes)
    pub diagnostics: Vec<String>,
    pub files_validated: Vec<PathBuf>,
}

impl ValidationResult {
    pub fn success(files: Vec<PathBuf>) -> Self {
        Self {
            return_code: ReturnCode::Success,
            conforms: true,
            violations: Vec::new(),
            diagnostics: Vec::new(),
            files_validated: files,
        }
    }

    pub fn failure(return_code: ReturnCode, diagnostic: String, files: Vec<PathBuf>) -> Self {
        Self {
            return_code,
            conforms: false,
            violations: Vec::new(),
            diagnostics: vec![diagnostic],
            files_validated: files,
        }
    }

    pub fn from_violations(mut violations: Vec<Violation>, files: Vec<PathBuf>) -> Self {
        violations.sort();
        let conforms = violations.is_empty();
        Self {
            return_code: if conforms {
                ReturnCode::Success
            } else {
                ReturnCode::ConformanceError
            },
            conforms,
            violations,
            diagnostics: Vec::new(),
            files_validated: files,
        }
    }

    /// Render the result in the stable text form compared against
    /// `.expected` files.
    pub fn render(&self, root: &Path, prefixes: &IndexMap<String, String>) -> String {
        let mut out = String::new();
        if self.conforms {
            out.push_str("Conforms: true\n");
        } else {
            out.push_str("Conforms: false\n");
            out.push_str(&format!("Results ({}):\n", self.violations.len()));
            for v in &self.violations {
                out.push_str(&format!(
                    "  Violation: focus={}",
                    compact_iri(&v.focus_node, prefixes)
                ));
                if let Some(path) = &v.path {
                    out.push_str(&format!(" path={}", compact_iri(path, prefixes)));
                }
                if let Some(constraint) = &v.constraint {
                    out.push_str(&format!(" constraint={constraint}"));
                }
                out.push('\n');
                out.push_str(&format!("    {}\n", v.message));
            }
        }
        for diagnostic in &self.diagnostics {
            out.push_str(&format!("Note: {diagnostic}\n"));
        }
        for file in &self.files_validated {
            out.push_str(&format!("File: {}\n", display_path(file, root)));
        }
        out.push_str(&format!("Return code: {}\n", self.return_code));
        out
    }
}

/// Compact an IRI against a prefix map (`hdmap:format`), leaving it as-is
/// when no prefix applies. Blank node labels pass through untouched.
pub fn compact_iri(iri: &str, prefixes: &IndexMap<String, String>) -> String {
    if iri.starts_with("_:") {
        return iri.to_string();
    }
    let mut best: Option<(&str, &str)> = None;
    for (prefix, namespace) in prefixes {
        if let Some(rest) = iri.strip_prefix(namespace.as_str()) {
            // longest namespace wins so nested namespaces compact correctly
            let better = best.map_or(true, |(_, ns)| namespace.len() > ns.len());
            if better && !rest.is_empty() && !rest.contains(['/', '#']) {
                best = Some((prefix, namespace));
            }
        }
    }
    match best {
        Some((prefix, namespace)) => {
            format!("{prefix}:{}", &iri[namespace.len()..])
        }
        None => iri.to_string(),
    }
}

/// Paths under `root` are shown relative to it; anything else verbatim.
pub fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Line-based unified diff between expected and actual renderings. Used by
/// the failing-tests stage to explain an `.expected` mismatch.
pub fn unified_diff(expected: &str, actual: &str, label: &str) -> String {
    let expected_lines: Vec<&str> = expected.lines().collect();
    let actual_lines: Vec<&str> = actual.lines().collect();

    let mut out = String::new();
    out.push_str(&format!("--- {label}.expected\n"));
    out.push_str(&format!("+++ {label}.actual\n"));

    // LCS table over the two line vectors
    let n = expected_lines.len();
    let m = actual_lines.len();
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if expected_lines[i] == actual_lines[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if expected_lines[i] == actual_lines[j] {
            out.push_str(&format!(" {}\n", expected_lines[i]));
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            out.push_str(&format!("-{}\n", expected_lines[i]));
            i += 1;
        } else {
            out.push_str(&format!("+{}\n", actual_lines[j]));
            j += 1;
        }
    }
    for line in &expected_lines[i..] {
        out.push_str(&format!("-{line}\n"));
    }
    for line in &actual_lines[j..] {
        out.push_str(&format!("+{line}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefixes() -> IndexMap<String, String> {
        let mut map = IndexMap::new();
        map.insert(
            "hdmap".to_string(),
            "https://example.org/hdmap/v4/".to_string(),
        );
        map.insert(
            "sh".to_string(),
            "http://www.w3.org/ns/shacl#".to_string(),
        );
        map
    }

    #[test]
    fn compacts_iris_through_prefix_map() {
        let p = prefixes();
        assert_eq!(
            compact_iri("https://example.org/hdmap/v4/format", &p),
            "hdmap:format"
        );
        assert_eq!(
            compact_iri("http://www.w3.org/ns/shacl#minCount", &p),
            "sh:minCount"
        );
        assert_eq!(
            compact_iri("https://other.example/thing", &p),
            "https://other.example/thing"
        );
        assert_eq!(compact_iri("_:b0", &p), "_:b0");
    }

    #[test]
    fn rendering_is_sorted_and_stable() {
        let violations = vec![
            Violation {
                focus_node: "https://example.org/hdmap/v4/map-2".into(),
                path: Some("https://example.org/hdmap/v4/format".into()),
                constraint: Some("minCount".into()),
                message: "Less than 1 values".into(),
            },
            Violation {
                focus_node: "https://example.org/hdmap/v4/map-1".into(),
                path: None,
                constraint: None,
                message: "Value does not have class hdmap:Format".into(),
            },
        ];
        let result = ValidationResult::from_violations(violations, vec![]);
        assert_eq!(result.return_code, ReturnCode::ConformanceError);
        assert!(!result.conforms);

        let rendered = result.render(Path::new("/repo"), &prefixes());
        let first = rendered.find("hdmap:map-1").unwrap();
        let second = rendered.find("hdmap:map-2").unwrap();
        assert!(first < second);
        assert!(rendered.ends_with("Return code: 210\n"));
    }

    #[test]
    fn conforming_render() {
        let result =
            ValidationResult::success(vec![PathBuf::from("/repo/tests/data/x.json")]);
        let rendered = result.render(Path::new("/repo"), &IndexMap::new());
        assert_eq!(
            rendered,
            "Conforms: true\nFile: tests/data/x.json\nReturn code: 0\n"
        );
    }

    #[test]
    fn diff_marks_changed_lines() {
        let diff = unified_diff("a\nb\nc\n", "a\nx\nc\n", "case");
        assert!(diff.contains("-b"));
        assert!(diff.contains("+x"));
        assert!(diff.contains(" a"));
        assert!(diff.contains(" c"));
    }
}
