//! In-memory catalog model.
//!
//! Catalogs are OASIS XML catalog files (`catalog-v001.xml`) mapping
//! identifiers (ontology IRIs, fixture IRIs, test-data ids) to repository
//! paths. This module only *consumes* catalogs; the writer is a separate
//! indexing tool. Entries keep insertion order but lookups never depend on
//! it.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::{SuiteError, SuiteResult};

/// What a catalog entry points at, derived from its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Ontology,
    Shapes,
    Context,
    Fixture,
    TestData,
}

/// Whether a test-data entry belongs to the positive or negative corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestKind {
    Valid,
    Invalid,
}

impl TestKind {
    fn parse(value: &str) -> Option<TestKind> {
        match value {
            "valid" => Some(TestKind::Valid),
            "invalid" => Some(TestKind::Invalid),
            _ => None,
        }
    }
}

/// Where a catalog model came from. Also defines resolver precedence:
/// lower-numbered provenance wins on identifier collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CatalogProvenance {
    /// Synthesized in memory for a `--data-paths` invocation
    Temporary,
    /// Registered at runtime from `--artifacts` directories
    ExternalArtifacts,
    /// `artifacts/catalog-v001.xml`
    Artifacts,
    /// `imports/catalog-v001.xml`
    Imports,
    /// `tests/catalog-v001.xml`
    Tests,
}

impl std::fmt::Display for CatalogProvenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CatalogProvenance::Temporary => "temporary",
            CatalogProvenance::ExternalArtifacts => "external-artifacts",
            CatalogProvenance::Artifacts => "artifacts",
            CatalogProvenance::Imports => "imports",
            CatalogProvenance::Tests => "tests",
        };
        f.write_str(name)
    }
}

/// A single identifier → resource mapping.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    /// IRI (ontology/fixture) or test-data identifier
    pub identifier: String,
    pub kind: EntryKind,
    /// Path, relative to the repository root unless the entry points outside it
    pub path: PathBuf,
    pub domain: Option<String>,
    pub test_kind: Option<TestKind>,
}

/// One catalog: an ordered identifier → entry map with a provenance tag.
#[derive(Debug, Clone)]
pub struct CatalogModel {
    pub provenance: CatalogProvenance,
    entries: IndexMap<String, CatalogEntry>,
}

impl CatalogModel {
    pub fn empty(provenance: CatalogProvenance) -> Self {
        Self {
            provenance,
            entries: IndexMap::new(),
        }
    }

    /// Parse an OASIS XML catalog. `base_dir` is the directory the catalog
    /// lives in ("artifacts", "imports", "tests"); relative entry paths that
    /// do not already start with it are resolved against it.
    pub fn from_xml_file(
        path: &Path,
        provenance: CatalogProvenance,
        base_dir: &str,
    ) -> SuiteResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_xml_str(&content, provenance, base_dir).map_err(|detail| SuiteError::Catalog {
            path: path.to_path_buf(),
            detail,
        })
    }

    /// Parse catalog XML from a string. Entries are accepted with or without
    /// the OASIS namespace prefix on the `uri` element.
    pub fn from_xml_str(
        xml: &str,
        provenance: CatalogProvenance,
        base_dir: &str,
    ) -> Result<Self, String> {
        let mut reader = Reader::from_str(xml);
        let mut model = CatalogModel::empty(provenance);

        loop {
            match reader.read_event() {
                Ok(Event::Empty(e)) | Ok(Event::Start(e)) => {
                    if e.local_name().as_ref() != b"uri" {
                        continue;
                    }
                    let mut identifier = None;
                    let mut uri = None;
                    let mut domain = None;
                    let mut test_kind = None;
                    let mut category = None;
                    for attr in e.attributes() {
                        let attr = attr.map_err(|err| err.to_string())?;
                        let value = attr
                            .unescape_value()
                            .map_err(|err| err.to_string())?
                            .into_owned();
                        match attr.key.local_name().as_ref() {
                            b"name" => identifier = Some(value),
                            b"uri" => uri = Some(value),
                            b"domain" => domain = Some(value),
                            b"test-type" => test_kind = TestKind::parse(&value),
                            b"category" => category = Some(value),
                            _ => {}
                        }
                    }
                    let (Some(identifier), Some(uri)) = (identifier, uri) else {
                        continue;
                    };
                    let rel_path = normalize_catalog_path(base_dir, &uri);
                    let kind = classify_entry(&rel_path, category.as_deref());
                    model.insert(CatalogEntry {
                        identifier,
                        kind,
                        path: rel_path,
                        domain,
                        test_kind,
                    });
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => return Err(err.to_string()),
            }
        }

        Ok(model)
    }

    /// Insert an entry. The first entry wins within a model; a duplicate
    /// identifier is a catalog defect and is not silently overridden.
    pub fn insert(&mut self, entry: CatalogEntry) -> bool {
        if self.entries.contains_key(&entry.identifier) {
            tracing::warn!(
                identifier = %entry.identifier,
                provenance = %self.provenance,
                "duplicate catalog identifier ignored"
            );
            return false;
        }
        self.entries.insert(entry.identifier.clone(), entry);
        true
    }

    pub fn get(&self, identifier: &str) -> Option<&CatalogEntry> {
        self.entries.get(identifier)
    }

    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries of a given kind for a given domain.
    pub fn by_domain_kind<'a>(
        &'a self,
        domain: &'a str,
        kind: EntryKind,
    ) -> impl Iterator<Item = &'a CatalogEntry> {
        self.entries.values().filter(move |e| {
            e.kind == kind
                && (e.domain.as_deref() == Some(domain)
                    || domain_from_path(&e.path).as_deref() == Some(domain))
        })
    }
}

/// Resolve a catalog `uri` attribute to a repository-relative path.
fn normalize_catalog_path(base_dir: &str, uri: &str) -> PathBuf {
    let uri_path = PathBuf::from(uri);
    if uri_path.is_absolute() {
        return uri_path;
    }
    match uri_path.components().next() {
        Some(first) if first.as_os_str() == base_dir => uri_path,
        _ => Path::new(base_dir).join(uri_path),
    }
}

/// Domain owning an artifact path: the directory component directly under
/// `artifacts/` (or the first component for external layouts).
pub fn domain_from_path(path: &Path) -> Option<String> {
    let mut components = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned());
    let first = components.next()?;
    if first == "artifacts" || first == "imports" {
        components.next()
    } else {
        Some(first)
    }
}

fn is_context_path(path: &str) -> bool {
    path.ends_with(".context.jsonld") || path.ends_with(".context.json")
}

fn is_shapes_path(path: &str) -> bool {
    path.contains(".shacl.")
}

fn is_ontology_path(path: &str) -> bool {
    [".ttl", ".rdf", ".owl", ".xml", ".nt", ".n3"]
        .iter()
        .any(|ext| path.ends_with(ext))
}

fn classify_entry(path: &Path, category: Option<&str>) -> EntryKind {
    if category == Some("fixture") {
        return EntryKind::Fixture;
    }
    if category == Some("test-data") {
        return EntryKind::TestData;
    }
    let lower = path.to_string_lossy().to_ascii_lowercase();
    if is_context_path(&lower) {
        EntryKind::Context
    } else if is_shapes_path(&lower) {
        EntryKind::Shapes
    } else if is_ontology_path(&lower) {
        EntryKind::Ontology
    } else {
        EntryKind::TestData
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTIFACTS_CATALOG: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <uri name="https://example.org/hdmap/v4/" uri="hdmap/hdmap.owl.ttl"/>
  <uri name="https://example.org/hdmap/v4/shapes" uri="hdmap/hdmap.shacl.ttl"/>
  <uri name="https://example.org/hdmap/v4/context" uri="hdmap/hdmap.context.jsonld"/>
</catalog>
"#;

    #[test]
    fn parses_artifacts_catalog() {
        let model =
            CatalogModel::from_xml_str(ARTIFACTS_CATALOG, CatalogProvenance::Artifacts, "artifacts")
                .unwrap();
        assert_eq!(model.len(), 3);

        let onto = model.get("https://example.org/hdmap/v4/").unwrap();
        assert_eq!(onto.kind, EntryKind::Ontology);
        assert_eq!(onto.path, PathBuf::from("artifacts/hdmap/hdmap.owl.ttl"));

        let shapes = model.get("https://example.org/hdmap/v4/shapes").unwrap();
        assert_eq!(shapes.kind, EntryKind::Shapes);
        let ctx = model.get("https://example.org/hdmap/v4/context").unwrap();
        assert_eq!(ctx.kind, EntryKind::Context);
    }

    #[test]
    fn parses_catalog_without_namespace() {
        let xml = r#"<catalog><uri name="a" uri="demo/demo.owl.ttl"/></catalog>"#;
        let model =
            CatalogModel::from_xml_str(xml, CatalogProvenance::Artifacts, "artifacts").unwrap();
        assert_eq!(model.len(), 1);
        assert_eq!(
            model.get("a").unwrap().path,
            PathBuf::from("artifacts/demo/demo.owl.ttl")
        );
    }

    #[test]
    fn tests_catalog_categories() {
        let xml = r#"<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <uri name="test:hdmap:001" uri="data/hdmap/valid/hdmap_instance.json"
       domain="hdmap" test-type="valid" category="test-data"/>
  <uri name="did:web:registry.example.com:participant:abc"
       uri="data/fixtures/participant_abc.json" category="fixture"/>
</catalog>"#;
        let model = CatalogModel::from_xml_str(xml, CatalogProvenance::Tests, "tests").unwrap();
        let test = model.get("test:hdmap:001").unwrap();
        assert_eq!(test.kind, EntryKind::TestData);
        assert_eq!(test.test_kind, Some(TestKind::Valid));
        assert_eq!(test.domain.as_deref(), Some("hdmap"));

        let fixture = model.get("did:web:registry.example.com:participant:abc").unwrap();
        assert_eq!(fixture.kind, EntryKind::Fixture);
    }

    #[test]
    fn duplicate_identifiers_are_not_overridden() {
        let mut model = CatalogModel::empty(CatalogProvenance::Artifacts);
        assert!(model.insert(CatalogEntry {
            identifier: "x".into(),
            kind: EntryKind::Ontology,
            path: PathBuf::from("artifacts/a/a.owl.ttl"),
            domain: None,
            test_kind: None,
        }));
        assert!(!model.insert(CatalogEntry {
            identifier: "x".into(),
            kind: EntryKind::Ontology,
            path: PathBuf::from("artifacts/b/b.owl.ttl"),
            domain: None,
            test_kind: None,
        }));
        assert_eq!(
            model.get("x").unwrap().path,
            PathBuf::from("artifacts/a/a.owl.ttl")
        );
    }

    #[test]
    fn domain_extraction_from_paths() {
        assert_eq!(
            domain_from_path(Path::new("artifacts/hdmap/hdmap.owl.ttl")),
            Some("hdmap".to_string())
        );
        assert_eq!(
            domain_from_path(Path::new("scenario/scenario.owl.ttl")),
            Some("scenario".to_string())
        );
    }

    #[test]
    fn malformed_catalog_is_an_error() {
        let err = CatalogModel::from_xml_str(
            "<catalog><uri name='x'",
            CatalogProvenance::Tests,
            "tests",
        );
        assert!(err.is_err());
    }
}
