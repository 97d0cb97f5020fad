//! Type resolution, strict contexts and fixture stitching limits,
//! exercised through the public orchestrator where possible.

use std::fs;
use std::path::Path;

use assert_matches::assert_matches;
use ontovalidate::catalog::CatalogResolver;
use ontovalidate::{
    CheckKind, InferenceMode, ReturnCode, SuiteConfig, SuiteError, ValidationOrchestrator,
};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn config(root: &Path) -> SuiteConfig {
    SuiteConfig {
        root: root.to_path_buf(),
        run: CheckKind::All,
        domains: Vec::new(),
        data_paths: Vec::new(),
        artifact_dirs: Vec::new(),
        inference_mode: InferenceMode::Rdfs,
        strict: false,
        max_fixture_depth: 10,
    }
}

const NS: &str = "https://example.org/hdmap/v4/";

fn repo() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write(
        root,
        "artifacts/catalog-v001.xml",
        &format!(
            r#"<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <uri name="{NS}" uri="hdmap/hdmap.owl.ttl"/>
  <uri name="{NS}shapes" uri="hdmap/hdmap.shacl.ttl"/>
</catalog>"#
        ),
    );
    write(
        root,
        "artifacts/hdmap/hdmap.owl.ttl",
        &format!(
            r#"@prefix owl: <http://www.w3.org/2002/07/owl#> .
@prefix hdmap: <{NS}> .
hdmap:HdMap a owl:Class .
hdmap:Format a owl:Class .
hdmap:Provider a owl:Class .
"#
        ),
    );
    write(
        root,
        "artifacts/hdmap/hdmap.shacl.ttl",
        &format!(
            r#"@prefix sh: <http://www.w3.org/ns/shacl#> .
@prefix hdmap: <{NS}> .
hdmap:HdMapShape a sh:NodeShape ;
    sh:targetClass hdmap:HdMap ;
    sh:property [ sh:path hdmap:format ; sh:minCount 1 ] .
"#
        ),
    );
    tmp
}

fn test_catalog(root: &Path, extra: &str) {
    write(
        root,
        "tests/catalog-v001.xml",
        &format!(
            r#"<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <uri name="test:hdmap:001" uri="data/hdmap/valid/map.json"
       domain="hdmap" test-type="valid" category="test-data"/>
{extra}</catalog>"#
        ),
    );
}

#[test]
fn overlapping_namespaces_make_a_type_ambiguous() {
    let tmp = repo();
    // a second domain claims a namespace nested under hdmap's
    write(
        tmp.path(),
        "artifacts/catalog-v001.xml",
        &format!(
            r#"<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <uri name="{NS}" uri="hdmap/hdmap.owl.ttl"/>
  <uri name="{NS}sub/" uri="submap/submap.owl.ttl"/>
</catalog>"#
        ),
    );
    write(tmp.path(), "artifacts/submap/submap.owl.ttl", "");
    let resolver = CatalogResolver::open(tmp.path()).unwrap();
    let err = resolver
        .resolve_type_to_domain(&format!("{NS}sub/Thing"))
        .unwrap_err();
    assert_matches!(err, SuiteError::AmbiguousType { ref domains, .. } => {
        assert_eq!(domains, &["hdmap".to_string(), "submap".to_string()]);
    });
}

#[test]
fn unknown_domain_is_reported_by_name() {
    let tmp = repo();
    let resolver = CatalogResolver::open(tmp.path()).unwrap();
    let err = resolver.resolve_domain("nosuch").unwrap_err();
    assert_matches!(err, SuiteError::UnknownDomain { ref domain } => {
        assert_eq!(domain, "nosuch");
    });
}

#[test]
fn strict_mode_rejects_uncataloged_remote_contexts() {
    let tmp = repo();
    test_catalog(tmp.path(), "");
    write(
        tmp.path(),
        "tests/data/hdmap/valid/map.json",
        &format!(
            r#"{{
  "@context": "https://uncataloged.example/context",
  "@id": "{NS}map-1",
  "@type": "{NS}HdMap",
  "{NS}format": {{"@id": "{NS}format-1"}}
}}"#
        ),
    );
    let mut cfg = config(tmp.path());
    cfg.run = CheckKind::CheckDataConformance;
    cfg.strict = true;
    let summary = ValidationOrchestrator::new(cfg).run().unwrap();
    assert_eq!(summary.code, ReturnCode::ConformanceError);
    let output = summary.stages[0].lines.join("\n");
    assert!(output.contains("https://uncataloged.example/context"), "{output}");
}

#[test]
fn fixture_chains_resolve_up_to_the_depth_limit() {
    let tmp = repo();
    test_catalog(
        tmp.path(),
        r#"  <uri name="did:web:f1" uri="data/fixtures/f1.json" category="fixture"/>
  <uri name="did:web:f2" uri="data/fixtures/f2.json" category="fixture"/>
"#,
    );
    write(
        tmp.path(),
        "tests/data/hdmap/valid/map.json",
        &format!(
            r#"{{
  "@context": {{"hdmap": "{NS}"}},
  "@id": "hdmap:map-1",
  "@type": "hdmap:HdMap",
  "hdmap:format": {{"@id": "hdmap:format-1", "@type": "hdmap:Format"}},
  "hdmap:provider": {{"@id": "did:web:f1"}}
}}"#
        ),
    );
    write(
        tmp.path(),
        "tests/data/fixtures/f1.json",
        &format!(
            r#"{{
  "@context": {{"hdmap": "{NS}"}},
  "@id": "did:web:f1",
  "@type": "hdmap:Provider",
  "hdmap:delegate": {{"@id": "did:web:f2"}}
}}"#
        ),
    );
    write(
        tmp.path(),
        "tests/data/fixtures/f2.json",
        &format!(
            r#"{{
  "@context": {{"hdmap": "{NS}"}},
  "@id": "did:web:f2",
  "@type": "hdmap:Provider"
}}"#
        ),
    );

    let mut cfg = config(tmp.path());
    cfg.run = CheckKind::CheckDataConformance;
    let summary = ValidationOrchestrator::new(cfg).run().unwrap();
    assert_eq!(summary.code, ReturnCode::Success, "{:#?}", summary.stages);

    // the same chain fails once the depth bound is too small for f2
    let mut cfg = config(tmp.path());
    cfg.run = CheckKind::CheckDataConformance;
    cfg.max_fixture_depth = 1;
    let summary = ValidationOrchestrator::new(cfg).run().unwrap();
    assert_eq!(summary.code, ReturnCode::ConformanceError);
    let output = summary.stages[0].lines.join("\n");
    assert!(output.contains("did:web:f2"), "{output}");
}

#[test]
fn turtle_test_data_is_validated_like_jsonld() {
    let tmp = repo();
    write(
        tmp.path(),
        "tests/catalog-v001.xml",
        r#"<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <uri name="test:hdmap:ttl" uri="data/hdmap/valid/map.ttl"
       domain="hdmap" test-type="valid" category="test-data"/>
</catalog>"#,
    );
    write(
        tmp.path(),
        "tests/data/hdmap/valid/map.ttl",
        &format!(
            r#"@prefix hdmap: <{NS}> .
hdmap:map-1 a hdmap:HdMap ; hdmap:format hdmap:format-1 .
"#
        ),
    );
    let mut cfg = config(tmp.path());
    cfg.run = CheckKind::CheckDataConformance;
    let summary = ValidationOrchestrator::new(cfg).run().unwrap();
    assert_eq!(summary.code, ReturnCode::Success, "{:#?}", summary.stages);
}

#[test]
fn missing_expected_file_fails_the_failing_stage() {
    let tmp = repo();
    write(
        tmp.path(),
        "tests/catalog-v001.xml",
        r#"<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <uri name="test:hdmap:bad" uri="data/hdmap/invalid/bad.json"
       domain="hdmap" test-type="invalid" category="test-data"/>
</catalog>"#,
    );
    write(
        tmp.path(),
        "tests/data/hdmap/invalid/bad.json",
        &format!(
            r#"{{
  "@context": {{"hdmap": "{NS}"}},
  "@id": "hdmap:map-9",
  "@type": "hdmap:HdMap"
}}"#
        ),
    );
    let mut cfg = config(tmp.path());
    cfg.run = CheckKind::CheckFailingTests;
    let summary = ValidationOrchestrator::new(cfg).run().unwrap();
    assert_eq!(summary.code, ReturnCode::GeneralError);
    let output = summary.stages[0].lines.join("\n");
    assert!(output.contains("missing expected-output file"), "{output}");
}
