//! Graph assembly: parsing instance and schema files into an in-memory
//! store.
//!
//! JSON-LD files are preprocessed before parsing: remote `@context` URLs
//! are replaced with the body of the cataloged context file so that no
//! network access ever happens, and the context's term mappings feed the
//! prefix map used for compact rendering. Turtle files contribute their
//! `@prefix` declarations the same way.

use std::collections::BTreeSet;
use std::path::Path;

use indexmap::{IndexMap, IndexSet};
use once_cell::sync::Lazy;
use oxigraph::io::{JsonLdProfileSet, RdfFormat};
use oxigraph::model::vocab::rdf;
use oxigraph::model::{NamedOrBlankNode, Term};
use oxigraph::store::Store;
use regex::Regex;
use serde_json::Value;

use crate::catalog::{CatalogResolver, EntryKind};
use crate::error::{SuiteError, SuiteResult, SyntaxFormat};
use crate::iri::is_external_reference;

static TURTLE_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:@prefix|PREFIX)\s+([A-Za-z][\w.-]*):\s*<([^>]*)>").unwrap()
});

/// An RDF graph plus the prefix map accumulated from its source files.
pub struct AssembledGraph {
    pub store: Store,
    pub prefixes: IndexMap<String, String>,
}

// `Store` has no `Debug` impl, so derive is unavailable; tests call
// `unwrap_err()` on results holding this type, which requires `Debug`.
impl std::fmt::Debug for AssembledGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssembledGraph")
            .field("prefixes", &self.prefixes)
            .finish_non_exhaustive()
    }
}

impl AssembledGraph {
    pub fn new() -> SuiteResult<Self> {
        Ok(Self {
            store: Store::new()?,
            prefixes: IndexMap::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.store.len().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append all quads and prefixes of `other`. Never removes anything.
    pub fn merge(&mut self, other: &AssembledGraph) -> SuiteResult<()> {
        for quad in other.store.iter() {
            let quad = quad?;
            self.store.insert(&quad)?;
        }
        for (prefix, namespace) in &other.prefixes {
            self.prefixes
                .entry(prefix.clone())
                .or_insert_with(|| namespace.clone());
        }
        Ok(())
    }

    /// Object IRIs of every `rdf:type` triple, sorted.
    pub fn extract_types(&self) -> BTreeSet<String> {
        let mut types = BTreeSet::new();
        for quad in self
            .store
            .quads_for_pattern(None, Some(rdf::TYPE), None, None)
            .flatten()
        {
            if let Term::NamedNode(node) = &quad.object {
                types.insert(node.as_str().to_string());
            }
        }
        types
    }

    /// IRIs appearing in subject position, first-seen order.
    pub fn subject_iris(&self) -> IndexSet<String> {
        let mut subjects = IndexSet::new();
        for quad in self.store.iter().flatten() {
            if let NamedOrBlankNode::NamedNode(node) = &quad.subject {
                subjects.insert(node.as_str().to_string());
            }
        }
        subjects
    }

    /// External-reference IRIs (`did:` scheme) this graph points at but does
    /// not itself describe. These are the stitching frontier.
    pub fn external_references(&self) -> Vec<String> {
        let described = self.subject_iris();
        let mut refs = IndexSet::new();
        for quad in self.store.iter().flatten() {
            if let Term::NamedNode(node) = &quad.object {
                let iri = node.as_str();
                if is_external_reference(iri) && !described.contains(iri) {
                    refs.insert(iri.to_string());
                }
            }
        }
        refs.into_iter().collect()
    }
}

/// Loads data and schema files into [`AssembledGraph`]s.
pub struct GraphAssembler<'a> {
    resolver: Option<&'a CatalogResolver>,
    strict: bool,
}

impl<'a> GraphAssembler<'a> {
    pub fn new(resolver: &'a CatalogResolver, strict: bool) -> Self {
        Self {
            resolver: Some(resolver),
            strict,
        }
    }

    /// Assembler without catalog access. Remote contexts cannot be inlined.
    pub fn detached() -> Self {
        Self {
            resolver: None,
            strict: false,
        }
    }

    pub fn load_turtle(&self, path: &Path) -> SuiteResult<AssembledGraph> {
        let content = std::fs::read_to_string(path)?;
        let mut graph = AssembledGraph::new()?;
        graph
            .store
            .load_from_reader(RdfFormat::Turtle, content.as_bytes())
            .map_err(|err| SuiteError::Syntax {
                path: path.to_path_buf(),
                format: SyntaxFormat::Turtle,
                detail: err.to_string(),
            })?;
        for caps in TURTLE_PREFIX_RE.captures_iter(&content) {
            graph
                .prefixes
                .entry(caps[1].to_string())
                .or_insert_with(|| caps[2].to_string());
        }
        Ok(graph)
    }

    pub fn load_jsonld(&self, path: &Path) -> SuiteResult<AssembledGraph> {
        let content = std::fs::read_to_string(path)?;
        let mut value: Value =
            serde_json::from_str(&content).map_err(|err| SuiteError::Syntax {
                path: path.to_path_buf(),
                format: SyntaxFormat::Json,
                detail: err.to_string(),
            })?;

        let mut graph = AssembledGraph::new()?;
        self.inline_contexts(&mut value, path)?;
        collect_context_prefixes(&value, &mut graph.prefixes);

        let bytes = serde_json::to_vec(&value).map_err(|err| SuiteError::Syntax {
            path: path.to_path_buf(),
            format: SyntaxFormat::Json,
            detail: err.to_string(),
        })?;
        graph
            .store
            .load_from_reader(
                RdfFormat::JsonLd {
                    profile: JsonLdProfileSet::empty(),
                },
                bytes.as_slice(),
            )
            .map_err(|err| SuiteError::Syntax {
                path: path.to_path_buf(),
                format: SyntaxFormat::Json,
                detail: err.to_string(),
            })?;
        Ok(graph)
    }

    /// Load by extension: `.json`/`.jsonld` as JSON-LD, everything else as
    /// Turtle.
    pub fn load(&self, path: &Path) -> SuiteResult<AssembledGraph> {
        if is_json_path(path) {
            self.load_jsonld(path)
        } else {
            self.load_turtle(path)
        }
    }

    /// Replace remote string `@context` URLs with the body of the cataloged
    /// context file. Unknown remote contexts fail in strict mode and are
    /// dropped with a warning otherwise.
    fn inline_contexts(&self, value: &mut Value, source: &Path) -> SuiteResult<()> {
        match value {
            Value::Object(map) => {
                if let Some(ctx) = map.get_mut("@context") {
                    self.inline_context_value(ctx, source)?;
                }
                for (key, child) in map.iter_mut() {
                    if key != "@context" {
                        self.inline_contexts(child, source)?;
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.inline_contexts(item, source)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn inline_context_value(&self, ctx: &mut Value, source: &Path) -> SuiteResult<()> {
        match ctx {
            Value::String(url) if url.starts_with("http") => {
                match self.cataloged_context(url)? {
                    Some(body) => *ctx = body,
                    None if self.strict => {
                        return Err(SuiteError::UnresolvedCatalogEntry {
                            identifier: url.clone(),
                        });
                    }
                    None => {
                        tracing::warn!(
                            context = %url,
                            file = %source.display(),
                            "remote context not in any catalog, ignoring"
                        );
                        *ctx = Value::Object(serde_json::Map::new());
                    }
                }
            }
            Value::Array(parts) => {
                for part in parts {
                    self.inline_context_value(part, source)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// The `@context` member of the cataloged context document for a URL,
    /// if the catalogs know it.
    fn cataloged_context(&self, url: &str) -> SuiteResult<Option<Value>> {
        let Some(resolver) = self.resolver else {
            return Ok(None);
        };
        for variant in crate::iri::iri_variants(url) {
            let Some(entry) = resolver.lookup(&variant) else {
                continue;
            };
            if entry.kind != EntryKind::Context {
                continue;
            }
            let path = resolver.entry_path(entry);
            let content = std::fs::read_to_string(&path)?;
            let doc: Value = serde_json::from_str(&content).map_err(|err| SuiteError::Syntax {
                path,
                format: SyntaxFormat::Json,
                detail: err.to_string(),
            })?;
            let body = doc.get("@context").cloned().unwrap_or(doc);
            return Ok(Some(body));
        }
        Ok(None)
    }
}

fn is_json_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("json") | Some("jsonld")
    )
}

/// Record namespace-like term mappings of a (possibly nested) `@context`
/// as prefixes.
fn collect_context_prefixes(value: &Value, prefixes: &mut IndexMap<String, String>) {
    let Some(ctx) = value.get("@context") else {
        return;
    };
    collect_from_context(ctx, prefixes);
}

fn collect_from_context(ctx: &Value, prefixes: &mut IndexMap<String, String>) {
    match ctx {
        Value::Object(map) => {
            for (term, mapping) in map {
                if term.starts_with('@') {
                    continue;
                }
                if let Value::String(iri) = mapping {
                    if iri.ends_with('/') || iri.ends_with('#') {
                        prefixes
                            .entry(term.clone())
                            .or_insert_with(|| iri.clone());
                    }
                }
            }
        }
        Value::Array(parts) => {
            for part in parts {
                collect_from_context(part, prefixes);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn loads_turtle_and_tracks_prefixes() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "demo.ttl",
            r#"@prefix ex: <https://example.org/demo/v1/> .
@prefix rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#> .
ex:thing-1 rdf:type ex:Thing .
"#,
        );
        let graph = GraphAssembler::detached().load_turtle(&path).unwrap();
        assert_eq!(graph.len(), 1);
        assert_eq!(
            graph.prefixes.get("ex").map(String::as_str),
            Some("https://example.org/demo/v1/")
        );
        let types = graph.extract_types();
        assert!(types.contains("https://example.org/demo/v1/Thing"));
    }

    #[test]
    fn malformed_turtle_is_a_syntax_error() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "bad.ttl", "ex:thing oops");
        let err = GraphAssembler::detached().load_turtle(&path).unwrap_err();
        assert!(matches!(
            err,
            SuiteError::Syntax {
                format: SyntaxFormat::Turtle,
                ..
            }
        ));
    }

    #[test]
    fn loads_jsonld_with_inline_context() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "instance.json",
            r#"{
  "@context": {"hdmap": "https://example.org/hdmap/v4/"},
  "@id": "hdmap:map-1",
  "@type": "hdmap:HdMap"
}"#,
        );
        let graph = GraphAssembler::detached().load_jsonld(&path).unwrap();
        assert_eq!(graph.len(), 1);
        let types = graph.extract_types();
        assert!(types.contains("https://example.org/hdmap/v4/HdMap"));
        assert_eq!(
            graph.prefixes.get("hdmap").map(String::as_str),
            Some("https://example.org/hdmap/v4/")
        );
    }

    #[test]
    fn malformed_json_is_a_syntax_error() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "bad.json", "{\"@id\": ");
        let err = GraphAssembler::detached().load_jsonld(&path).unwrap_err();
        assert!(matches!(
            err,
            SuiteError::Syntax {
                format: SyntaxFormat::Json,
                ..
            }
        ));
    }

    #[test]
    fn merge_is_append_only_and_idempotent() {
        let dir = TempDir::new().unwrap();
        let a = GraphAssembler::detached()
            .load_turtle(&write(
                &dir,
                "a.ttl",
                "@prefix ex: <https://e.org/> . ex:a ex:p ex:b .",
            ))
            .unwrap();
        let b = GraphAssembler::detached()
            .load_turtle(&write(
                &dir,
                "b.ttl",
                "@prefix ex: <https://e.org/> . ex:b ex:p ex:c .",
            ))
            .unwrap();
        let mut merged = AssembledGraph::new().unwrap();
        merged.merge(&a).unwrap();
        merged.merge(&b).unwrap();
        assert_eq!(merged.len(), 2);
        merged.merge(&b).unwrap();
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn external_references_exclude_described_subjects() {
        let dir = TempDir::new().unwrap();
        let graph = GraphAssembler::detached()
            .load_turtle(&write(
                &dir,
                "refs.ttl",
                r#"@prefix ex: <https://e.org/> .
ex:a ex:provider <did:web:one> .
ex:a ex:consumer <did:web:two> .
<did:web:two> ex:name "resolved" .
"#,
            ))
            .unwrap();
        assert_eq!(graph.external_references(), vec!["did:web:one".to_string()]);
    }
}
