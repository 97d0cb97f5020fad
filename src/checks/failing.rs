//! Failing-tests stage: the negative corpus must fail the right way.
//!
//! Every invalid test file must produce return code 210 and render exactly
//! the diagnostics checked into its sibling `<name>.expected` file. A file
//! that passes validation, fails with a different code, or renders
//! different text fails this stage; mismatches are explained with a
//! unified diff.

use std::path::Path;

use crate::catalog::{CatalogResolver, TestDataFile, TestKind};
use crate::checks::conformance::ConformanceChecker;
use crate::checks::StageReport;
use crate::error::ReturnCode;
use crate::report::{display_path, unified_diff};

pub fn check_invalid_tests(
    checker: &ConformanceChecker<'_>,
    resolver: &CatalogResolver,
    root: &Path,
    domains: &[String],
) -> StageReport {
    let mut report = StageReport::new("check-failing-tests");
    let invalid: Vec<TestDataFile> = resolver
        .test_files(None)
        .into_iter()
        .filter(|t| t.test_kind == TestKind::Invalid)
        .filter(|t| {
            domains.is_empty()
                || t.domain.as_ref().is_some_and(|d| domains.contains(d))
        })
        .collect();
    if invalid.is_empty() {
        report.record(ReturnCode::Skipped);
        report.push_line("check-failing-tests: no invalid test data in scope");
        return report;
    }

    for test in invalid {
        let label = display_path(&test.path, root);
        let expected_path = expected_path_for(&test.path);
        let expected = match std::fs::read_to_string(&expected_path) {
            Ok(content) => content,
            Err(_) => {
                report.record(ReturnCode::GeneralError);
                report.push_line(format!(
                    "{label}: missing expected-output file {}",
                    display_path(&expected_path, root)
                ));
                continue;
            }
        };

        let validation = checker.validate_file(&test.path);
        let code = validation.result.return_code;
        if code != ReturnCode::ConformanceError {
            report.record(ReturnCode::GeneralError);
            report.push_line(format!(
                "{label}: expected return code 210, got {code}"
            ));
            continue;
        }

        let actual = validation.result.render(root, &validation.prefixes);
        if normalize(&actual) != normalize(&expected) {
            report.record(ReturnCode::GeneralError);
            report.push_line(format!("{label}: rendered diagnostics differ"));
            report.push_line(unified_diff(&expected, &actual, &label));
        } else {
            tracing::debug!(test = %label, "invalid test failed as expected");
        }
    }
    report
}

fn expected_path_for(test_path: &Path) -> std::path::PathBuf {
    let mut name = test_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(".expected");
    test_path.with_file_name(name)
}

/// Newline normalization: CRLF to LF and no trailing blank lines.
fn normalize(text: &str) -> String {
    let unified = text.replace("\r\n", "\n");
    format!("{}\n", unified.trim_end_matches('\n'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{InferenceMode, DEFAULT_MAX_DEPTH};
    use crate::shacl::BuiltinEngine;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn repo_with_invalid_test(expected: Option<&str>) -> TempDir {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "artifacts/catalog-v001.xml",
            r#"<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <uri name="https://e.org/lane/v1/" uri="lane/lane.owl.ttl"/>
  <uri name="https://e.org/lane/v1/shapes" uri="lane/lane.shacl.ttl"/>
</catalog>"#,
        );
        write(
            tmp.path(),
            "artifacts/lane/lane.owl.ttl",
            r#"@prefix owl: <http://www.w3.org/2002/07/owl#> .
@prefix ex: <https://e.org/lane/v1/> .
ex:Lane a owl:Class .
"#,
        );
        write(
            tmp.path(),
            "artifacts/lane/lane.shacl.ttl",
            r#"@prefix sh: <http://www.w3.org/ns/shacl#> .
@prefix lane: <https://e.org/lane/v1/> .
lane:LaneShape a sh:NodeShape ;
    sh:targetClass lane:Lane ;
    sh:property [ sh:path lane:width ; sh:minCount 1 ;
        sh:message "width is required" ] .
"#,
        );
        write(
            tmp.path(),
            "tests/catalog-v001.xml",
            r#"<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <uri name="test:lane:inv1" uri="data/lane/invalid/no_width.ttl"
       domain="lane" test-type="invalid" category="test-data"/>
</catalog>"#,
        );
        write(
            tmp.path(),
            "tests/data/lane/invalid/no_width.ttl",
            "@prefix lane: <https://e.org/lane/v1/> . lane:lane-1 a lane:Lane .",
        );
        if let Some(expected) = expected {
            write(
                tmp.path(),
                "tests/data/lane/invalid/no_width.ttl.expected",
                expected,
            );
        }
        tmp
    }

    fn run(tmp: &TempDir) -> StageReport {
        let resolver = CatalogResolver::open(tmp.path()).unwrap();
        let engine = BuiltinEngine;
        let checker = ConformanceChecker::new(
            &resolver,
            &engine,
            InferenceMode::Rdfs,
            false,
            DEFAULT_MAX_DEPTH,
        );
        check_invalid_tests(&checker, &resolver, tmp.path(), &[])
    }

    const EXPECTED: &str = "Conforms: false
Results (1):
  Violation: focus=lane:lane-1 path=lane:width constraint=sh:minCount
    width is required
File: tests/data/lane/invalid/no_width.ttl
Return code: 210
";

    #[test]
    fn matching_expected_output_passes() {
        let tmp = repo_with_invalid_test(Some(EXPECTED));
        let report = run(&tmp);
        assert_eq!(report.code, ReturnCode::Success, "{:?}", report.lines);
    }

    #[test]
    fn crlf_expected_file_still_matches() {
        let crlf = EXPECTED.replace('\n', "\r\n");
        let tmp = repo_with_invalid_test(Some(&crlf));
        let report = run(&tmp);
        assert_eq!(report.code, ReturnCode::Success, "{:?}", report.lines);
    }

    #[test]
    fn mismatch_reports_a_diff() {
        let tmp = repo_with_invalid_test(Some("Conforms: false\nsomething else\n"));
        let report = run(&tmp);
        assert_eq!(report.code, ReturnCode::GeneralError);
        let diff = report.lines.join("\n");
        assert!(diff.contains("-something else"));
        assert!(diff.contains("+Results (1):"));
    }

    #[test]
    fn missing_expected_file_is_an_error() {
        let tmp = repo_with_invalid_test(None);
        let report = run(&tmp);
        assert_eq!(report.code, ReturnCode::GeneralError);
        assert!(report.lines[0].contains("missing expected-output file"));
    }
}
