//! Catalog resolution.
//!
//! The resolver owns every loaded [`CatalogModel`] and answers the questions
//! the pipeline asks: which domain owns this type IRI, which schema files
//! validate it, and where does this fixture IRI live on disk. Lookup walks
//! models in precedence order (temporary, external artifacts, built-in
//! artifacts, imports, tests) and the first match wins; later matches for
//! the same identifier are recorded as collisions.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};
use once_cell::sync::Lazy;
use regex::Regex;
use walkdir::WalkDir;

use crate::catalog::model::{
    CatalogEntry, CatalogModel, CatalogProvenance, EntryKind, TestKind, domain_from_path,
};
use crate::error::{SuiteError, SuiteResult};
use crate::iri::{self, is_external_reference, is_well_known_type, iri_variants};

/// Domain name prefix for catalogs synthesized from `--data-paths`.
pub const TEMP_DOMAIN_PREFIX: &str = "custom-path-";

static VOCAB_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""@vocab"\s*:\s*"([^"]+)""#).unwrap());

/// A validation domain and the artifact files it owns.
#[derive(Debug, Clone)]
pub struct Domain {
    pub name: String,
    pub ontology_iri: Option<String>,
    pub ontology_paths: Vec<PathBuf>,
    pub shape_paths: Vec<PathBuf>,
    pub context_path: Option<PathBuf>,
}

/// Schema files discovered for a set of instance types.
#[derive(Debug, Clone, Default)]
pub struct SchemaSet {
    pub domains: Vec<String>,
    pub ontology_paths: Vec<PathBuf>,
    pub shape_paths: Vec<PathBuf>,
}

/// An identifier present in more than one catalog. The winning entry is the
/// one from the higher-precedence model.
#[derive(Debug, Clone)]
pub struct Collision {
    pub identifier: String,
    pub winner: CatalogProvenance,
    pub shadowed: CatalogProvenance,
}

/// One test-data file selected for a run.
#[derive(Debug, Clone)]
pub struct TestDataFile {
    pub identifier: String,
    pub path: PathBuf,
    pub domain: Option<String>,
    pub test_kind: TestKind,
}

pub struct CatalogResolver {
    root: PathBuf,
    /// Highest precedence first
    models: Vec<CatalogModel>,
    collisions: Vec<Collision>,
    /// Metadata from `docs/registry.json`. Informational only; path
    /// resolution always goes through the catalogs.
    registry: Option<serde_json::Value>,
}

impl CatalogResolver {
    /// Load the standard catalogs under `root`. A missing catalog file is
    /// tolerated (the repository may carry only a subset); a malformed one
    /// is not. Registry metadata is loaded with a warning when absent or
    /// unreadable.
    pub fn open(root: &Path) -> SuiteResult<Self> {
        let mut resolver = Self {
            root: root.to_path_buf(),
            models: Vec::new(),
            collisions: Vec::new(),
            registry: load_registry(root),
        };
        for (dir, provenance) in [
            ("artifacts", CatalogProvenance::Artifacts),
            ("imports", CatalogProvenance::Imports),
            ("tests", CatalogProvenance::Tests),
        ] {
            let path = root.join(dir).join("catalog-v001.xml");
            if path.is_file() {
                let model = CatalogModel::from_xml_file(&path, provenance, dir)?;
                tracing::debug!(catalog = %path.display(), entries = model.len(), "catalog loaded");
                resolver.push_model(model);
            } else {
                tracing::debug!(catalog = %path.display(), "catalog not present, skipping");
            }
        }
        Ok(resolver)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn collisions(&self) -> &[Collision] {
        &self.collisions
    }

    /// Version declared by `docs/registry.json`, if the file was present
    /// and parseable.
    pub fn registry_version(&self) -> Option<String> {
        match self.registry.as_ref()?.get("version")? {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Add a model, keeping precedence order and recording identifier
    /// collisions against already-loaded models.
    pub fn push_model(&mut self, model: CatalogModel) {
        for entry in model.entries() {
            for existing in &self.models {
                if existing.get(&entry.identifier).is_some() {
                    let (winner, shadowed) = if existing.provenance <= model.provenance {
                        (existing.provenance, model.provenance)
                    } else {
                        (model.provenance, existing.provenance)
                    };
                    self.collisions.push(Collision {
                        identifier: entry.identifier.clone(),
                        winner,
                        shadowed,
                    });
                }
            }
        }
        self.models.push(model);
        self.models.sort_by_key(|m| m.provenance);
    }

    /// Look an identifier up across all catalogs, highest precedence first.
    pub fn lookup(&self, identifier: &str) -> Option<&CatalogEntry> {
        self.models.iter().find_map(|m| m.get(identifier))
    }

    /// Absolute path for a catalog entry.
    pub fn entry_path(&self, entry: &CatalogEntry) -> PathBuf {
        if entry.path.is_absolute() {
            entry.path.clone()
        } else {
            self.root.join(&entry.path)
        }
    }

    /// All domains known to the artifact catalogs, in first-seen order.
    pub fn domains(&self) -> Vec<String> {
        let mut names = IndexSet::new();
        for model in &self.models {
            if !matches!(
                model.provenance,
                CatalogProvenance::Artifacts
                    | CatalogProvenance::ExternalArtifacts
                    | CatalogProvenance::Temporary
            ) {
                continue;
            }
            for entry in model.entries() {
                if let Some(domain) = entry
                    .domain
                    .clone()
                    .or_else(|| domain_from_path(&entry.path))
                {
                    names.insert(domain);
                }
            }
        }
        names.into_iter().collect()
    }

    /// The artifact set owned by one domain.
    pub fn resolve_domain(&self, name: &str) -> SuiteResult<Domain> {
        let mut domain = Domain {
            name: name.to_string(),
            ontology_iri: None,
            ontology_paths: Vec::new(),
            shape_paths: Vec::new(),
            context_path: None,
        };
        for model in &self.models {
            if matches!(model.provenance, CatalogProvenance::Tests) {
                continue;
            }
            for entry in model.by_domain_kind(name, EntryKind::Ontology) {
                domain.ontology_iri.get_or_insert_with(|| entry.identifier.clone());
                push_unique(&mut domain.ontology_paths, self.entry_path(entry));
            }
            for entry in model.by_domain_kind(name, EntryKind::Shapes) {
                push_unique(&mut domain.shape_paths, self.entry_path(entry));
            }
            for entry in model.by_domain_kind(name, EntryKind::Context) {
                if domain.context_path.is_none() {
                    domain.context_path = Some(self.entry_path(entry));
                }
            }
        }
        if domain.ontology_paths.is_empty() && domain.shape_paths.is_empty() {
            return Err(SuiteError::UnknownDomain {
                domain: name.to_string(),
            });
        }
        Ok(domain)
    }

    /// Which domain declares the namespace a type IRI lives under.
    ///
    /// Matching is by IRI prefix against artifact ontology identifiers,
    /// tolerant of http/https and trailing-slash spelling differences.
    /// Well-known W3C vocabulary types never resolve and never fail.
    pub fn resolve_type_to_domain(&self, type_iri: &str) -> SuiteResult<Option<String>> {
        if is_well_known_type(type_iri) {
            return Ok(None);
        }
        let mut matched: BTreeSet<String> = BTreeSet::new();
        for model in &self.models {
            if matches!(model.provenance, CatalogProvenance::Tests) {
                continue;
            }
            for entry in model.entries() {
                if entry.kind != EntryKind::Ontology && entry.kind != EntryKind::Context {
                    continue;
                }
                if iri::iri_under_base(type_iri, &entry.identifier) {
                    if let Some(domain) = entry
                        .domain
                        .clone()
                        .or_else(|| domain_from_path(&entry.path))
                    {
                        matched.insert(domain);
                    }
                }
            }
        }
        match matched.len() {
            0 => Err(SuiteError::UnknownType {
                iri: type_iri.to_string(),
            }),
            1 => Ok(matched.into_iter().next()),
            _ => Err(SuiteError::AmbiguousType {
                iri: type_iri.to_string(),
                domains: matched.into_iter().collect(),
            }),
        }
    }

    /// Schema files needed to validate instances carrying the given types.
    pub fn resolve_schema_for_types<I, S>(&self, types: I) -> SuiteResult<SchemaSet>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = SchemaSet::default();
        let mut seen_domains = IndexSet::new();
        for type_iri in types {
            let type_iri = type_iri.as_ref();
            if is_external_reference(type_iri) {
                continue;
            }
            let Some(domain_name) = self.resolve_type_to_domain(type_iri)? else {
                continue;
            };
            if !seen_domains.insert(domain_name.clone()) {
                continue;
            }
            let domain = self.resolve_domain(&domain_name)?;
            for path in domain.ontology_paths {
                push_unique(&mut set.ontology_paths, path);
            }
            for path in domain.shape_paths {
                push_unique(&mut set.shape_paths, path);
            }
            set.domains.push(domain_name);
        }
        Ok(set)
    }

    /// On-disk file backing an external reference (`did:` IRI).
    pub fn resolve_fixture(&self, iri: &str) -> SuiteResult<PathBuf> {
        for variant in iri_variants(iri) {
            if let Some(entry) = self.lookup(&variant) {
                return Ok(self.entry_path(entry));
            }
        }
        Err(SuiteError::UnresolvedFixture {
            iri: iri.to_string(),
        })
    }

    /// Base vocabulary ontologies from the imports catalog. These are loaded
    /// alongside every domain ontology before inference.
    pub fn base_ontology_paths(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        for model in &self.models {
            if model.provenance != CatalogProvenance::Imports {
                continue;
            }
            for entry in model.entries() {
                if entry.kind == EntryKind::Ontology {
                    push_unique(&mut paths, self.entry_path(entry));
                }
            }
        }
        paths
    }

    /// Imports ontologies whose namespace is actually referenced by the
    /// given IRIs. Falls back to the full import set when nothing matches,
    /// since base vocabularies may be reached only through inference.
    pub fn base_ontology_paths_for_iris<'a, I>(&self, iris: I) -> Vec<PathBuf>
    where
        I: IntoIterator<Item = &'a str> + Clone,
    {
        let mut paths = Vec::new();
        for model in &self.models {
            if model.provenance != CatalogProvenance::Imports {
                continue;
            }
            for entry in model.entries() {
                if entry.kind != EntryKind::Ontology {
                    continue;
                }
                let used = iris
                    .clone()
                    .into_iter()
                    .any(|iri| iri::iri_under_base(iri, &entry.identifier));
                if used {
                    push_unique(&mut paths, self.entry_path(entry));
                }
            }
        }
        if paths.is_empty() {
            self.base_ontology_paths()
        } else {
            paths
        }
    }

    /// Test-data entries for a run, optionally restricted to one domain.
    pub fn test_files(&self, domain: Option<&str>) -> Vec<TestDataFile> {
        let mut files = Vec::new();
        for model in &self.models {
            if model.provenance != CatalogProvenance::Tests {
                continue;
            }
            for entry in model.entries() {
                if entry.kind != EntryKind::TestData {
                    continue;
                }
                let Some(test_kind) = entry.test_kind else {
                    continue;
                };
                if let Some(wanted) = domain {
                    if entry.domain.as_deref() != Some(wanted) {
                        continue;
                    }
                }
                files.push(TestDataFile {
                    identifier: entry.identifier.clone(),
                    path: self.entry_path(entry),
                    domain: entry.domain.clone(),
                    test_kind,
                });
            }
        }
        files
    }

    /// Fixture entries known to the tests catalog.
    pub fn fixture_count(&self) -> usize {
        self.models
            .iter()
            .filter(|m| m.provenance == CatalogProvenance::Tests)
            .flat_map(|m| m.entries())
            .filter(|e| e.kind == EntryKind::Fixture)
            .count()
    }

    /// Register an external artifact directory laid out as
    /// `{domain}/{domain}.owl.ttl` (+ `.shacl.ttl`, `.context.jsonld`).
    /// The namespace IRI is taken from `@vocab` in the context file when
    /// present, with a placeholder IRI otherwise.
    pub fn register_artifact_directory(&mut self, dir: &Path) -> SuiteResult<usize> {
        if !dir.is_dir() {
            return Err(SuiteError::Catalog {
                path: dir.to_path_buf(),
                detail: "artifact directory does not exist".to_string(),
            });
        }
        let mut model = CatalogModel::empty(CatalogProvenance::ExternalArtifacts);
        let mut registered = 0usize;
        for subdir in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_dir())
        {
            let domain = subdir.file_name().to_string_lossy().into_owned();
            let base = subdir.path();
            let ontology = base.join(format!("{domain}.owl.ttl"));
            if !ontology.is_file() {
                continue;
            }
            let context = base.join(format!("{domain}.context.jsonld"));
            let vocab = if context.is_file() {
                extract_vocab(&context)?
            } else {
                None
            };
            let namespace = vocab
                .unwrap_or_else(|| format!("https://external.invalid/{domain}/"));

            model.insert(CatalogEntry {
                identifier: namespace.clone(),
                kind: EntryKind::Ontology,
                path: ontology,
                domain: Some(domain.clone()),
                test_kind: None,
            });
            registered += 1;

            let shapes = base.join(format!("{domain}.shacl.ttl"));
            if shapes.is_file() {
                model.insert(CatalogEntry {
                    identifier: format!("{namespace}shapes"),
                    kind: EntryKind::Shapes,
                    path: shapes,
                    domain: Some(domain.clone()),
                    test_kind: None,
                });
            }
            if context.is_file() {
                model.insert(CatalogEntry {
                    identifier: format!("{namespace}context"),
                    kind: EntryKind::Context,
                    path: context,
                    domain: Some(domain),
                    test_kind: None,
                });
            }
        }
        if registered == 0 {
            tracing::warn!(dir = %dir.display(), "no artifact domains found in directory");
        }
        self.push_model(model);
        Ok(registered)
    }

    /// Synthesize a temporary catalog for `--data-paths` mode: each group of
    /// data files becomes its own pseudo-domain so that conformance can run
    /// without a repository catalog.
    pub fn register_temporary_data(
        &mut self,
        groups: &IndexMap<String, Vec<PathBuf>>,
        fixtures: &IndexMap<String, PathBuf>,
    ) {
        let mut model = CatalogModel::empty(CatalogProvenance::Temporary);
        for (group, paths) in groups {
            let domain = format!("{TEMP_DOMAIN_PREFIX}{group}");
            for (idx, path) in paths.iter().enumerate() {
                model.insert(CatalogEntry {
                    identifier: format!("tmp:{domain}:{idx}"),
                    kind: EntryKind::TestData,
                    path: path.clone(),
                    domain: Some(domain.clone()),
                    test_kind: Some(TestKind::Valid),
                });
            }
        }
        for (iri, path) in fixtures {
            model.insert(CatalogEntry {
                identifier: iri.clone(),
                kind: EntryKind::Fixture,
                path: path.clone(),
                domain: None,
                test_kind: None,
            });
        }
        self.push_model(model);
    }
}

fn push_unique(paths: &mut Vec<PathBuf>, path: PathBuf) {
    if !paths.contains(&path) {
        paths.push(path);
    }
}

fn load_registry(root: &Path) -> Option<serde_json::Value> {
    let path = root.join("docs").join("registry.json");
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(_) => {
            tracing::warn!(registry = %path.display(), "registry file not found");
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(registry = %path.display(), error = %err, "could not load registry");
            None
        }
    }
}

fn extract_vocab(context_path: &Path) -> SuiteResult<Option<String>> {
    let content = std::fs::read_to_string(context_path)?;
    Ok(VOCAB_RE
        .captures(&content)
        .map(|caps| caps[1].to_string()))
}
