//! Run orchestration.
//!
//! Builds the resolver, works out the file scope for the selected mode
//! (cataloged repository vs loose data paths), runs the selected stages in
//! order and aggregates the worst return code. An earlier stage failing
//! never prevents later stages from running; every diagnostic is kept.

use std::path::PathBuf;

use anyhow::Result;
use indexmap::IndexMap;

use crate::catalog::{CatalogResolver, TestKind};
use crate::checks::conformance::ConformanceChecker;
use crate::checks::{coherence, failing, syntax, StageReport};
use crate::config::{CheckKind, SuiteConfig};
use crate::discovery;
use crate::error::ReturnCode;
use crate::shacl::{BuiltinEngine, ShaclEngine};

/// Everything one invocation produced.
pub struct RunSummary {
    pub stages: Vec<StageReport>,
    pub code: ReturnCode,
}

impl RunSummary {
    fn push(&mut self, stage: StageReport) {
        self.code = self.code.worst(stage.code);
        self.stages.push(stage);
    }
}

pub struct ValidationOrchestrator<'e> {
    config: SuiteConfig,
    engine: &'e dyn ShaclEngine,
}

impl ValidationOrchestrator<'static> {
    pub fn new(config: SuiteConfig) -> Self {
        static ENGINE: BuiltinEngine = BuiltinEngine;
        Self {
            config,
            engine: &ENGINE,
        }
    }
}

impl<'e> ValidationOrchestrator<'e> {
    pub fn with_engine(config: SuiteConfig, engine: &'e dyn ShaclEngine) -> Self {
        Self { config, engine }
    }

    pub fn run(&self) -> Result<RunSummary> {
        self.config.ensure_root()?;
        let mut resolver = CatalogResolver::open(&self.config.root)?;
        if let Some(version) = resolver.registry_version() {
            tracing::info!(version = %version, "registry metadata loaded");
        }
        for dir in &self.config.artifact_dirs {
            let registered = resolver.register_artifact_directory(dir)?;
            tracing::info!(dir = %dir.display(), domains = registered, "external artifacts registered");
        }
        for collision in resolver.collisions() {
            tracing::warn!(
                identifier = %collision.identifier,
                winner = %collision.winner,
                shadowed = %collision.shadowed,
                "catalog identifier collision"
            );
        }

        if self.config.data_paths.is_empty() {
            self.run_repository(resolver)
        } else {
            self.run_data_paths(resolver)
        }
    }

    fn run_repository(&self, resolver: CatalogResolver) -> Result<RunSummary> {
        let config = &self.config;
        let domains = if config.domains.is_empty() {
            resolver.domains()
        } else {
            config.domains.clone()
        };
        let mut summary = RunSummary {
            stages: Vec::new(),
            code: ReturnCode::Success,
        };
        let checker = ConformanceChecker::new(
            &resolver,
            self.engine,
            config.inference_mode,
            config.strict,
            config.max_fixture_depth,
        );

        let selected = config.run;
        if matches!(selected, CheckKind::All | CheckKind::CheckSyntax) {
            let files = self.repository_syntax_scope(&domains)?;
            summary.push(syntax::check_files(&config.root, &files)?);
        }
        if matches!(selected, CheckKind::All | CheckKind::CheckArtifactCoherence) {
            summary.push(coherence::check_domains(&resolver, &domains)?);
        }
        if matches!(selected, CheckKind::All | CheckKind::CheckDataConformance) {
            let mut files: Vec<PathBuf> = Vec::new();
            for test in resolver.test_files(None) {
                if test.test_kind != TestKind::Valid {
                    continue;
                }
                let in_scope = config.domains.is_empty()
                    || test
                        .domain
                        .as_ref()
                        .is_some_and(|d| config.domains.contains(d));
                if in_scope {
                    files.push(test.path);
                }
            }
            summary.push(checker.check_files(&config.root, &files));
        }
        if matches!(selected, CheckKind::All | CheckKind::CheckFailingTests) {
            summary.push(failing::check_invalid_tests(
                &checker,
                &resolver,
                &config.root,
                &config.domains,
            ));
        }
        Ok(summary)
    }

    /// Files the syntax stage covers in repository mode: every artifact,
    /// import and test-data file the catalogs reference, restricted to the
    /// selected domains where one is set (fixtures are always in scope).
    fn repository_syntax_scope(&self, domains: &[String]) -> Result<Vec<PathBuf>> {
        let mut dirs = vec![self.config.root.join("imports")];
        if self.config.domains.is_empty() {
            dirs.push(self.config.root.join("artifacts"));
            dirs.push(self.config.root.join("tests"));
        } else {
            for domain in domains {
                dirs.push(self.config.root.join("artifacts").join(domain));
                dirs.push(self.config.root.join("tests").join("data").join(domain));
            }
            dirs.push(self.config.root.join("tests").join("data").join("fixtures"));
        }
        let dirs: Vec<PathBuf> = dirs.into_iter().filter(|d| d.is_dir()).collect();
        Ok(discovery::collect_data_files(&dirs)?)
    }

    /// Loose-files mode: a temporary catalog is synthesized from the
    /// discovered hierarchy and only the syntax and conformance stages run.
    fn run_data_paths(&self, mut resolver: CatalogResolver) -> Result<RunSummary> {
        let config = &self.config;
        let files = discovery::collect_data_files(&config.data_paths)?;
        let hierarchy = discovery::discover_hierarchy(&files)?;

        let mut groups: IndexMap<String, Vec<PathBuf>> = IndexMap::new();
        for (idx, path) in config.data_paths.iter().enumerate() {
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| idx.to_string());
            groups
                .entry(name)
                .or_default()
                .push(path.clone());
        }
        resolver.register_temporary_data(&groups, &hierarchy.iri_to_file);

        let mut summary = RunSummary {
            stages: Vec::new(),
            code: ReturnCode::Success,
        };
        let checker = ConformanceChecker::new(
            &resolver,
            self.engine,
            config.inference_mode,
            config.strict,
            config.max_fixture_depth,
        );

        if matches!(config.run, CheckKind::All | CheckKind::CheckSyntax) {
            summary.push(syntax::check_files(&config.root, &files)?);
        }
        if matches!(config.run, CheckKind::All | CheckKind::CheckDataConformance) {
            summary.push(checker.check_files(&config.root, &hierarchy.top_level));
        }
        Ok(summary)
    }
}
