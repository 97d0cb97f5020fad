//! Data conformance stage: the full pipeline for one instance file.
//!
//! load data → discover types → resolve schemas → stitch fixtures → load
//! ontologies → inference → SHACL. Any resolution or stitching failure
//! surfaces as a nonconforming result for that file; sibling files are
//! unaffected.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::catalog::CatalogResolver;
use crate::checks::StageReport;
use crate::error::{ReturnCode, SuiteError, SuiteResult};
use crate::graph::{inference, AssembledGraph, FixtureStitcher, GraphAssembler, InferenceMode};
use crate::report::ValidationResult;
use crate::shacl::ShaclEngine;

pub struct ConformanceChecker<'a> {
    resolver: &'a CatalogResolver,
    engine: &'a dyn ShaclEngine,
    mode: InferenceMode,
    strict: bool,
    max_fixture_depth: usize,
}

/// A per-file result together with the prefix map needed to render it.
pub struct FileValidation {
    pub result: ValidationResult,
    pub prefixes: IndexMap<String, String>,
}

impl<'a> ConformanceChecker<'a> {
    pub fn new(
        resolver: &'a CatalogResolver,
        engine: &'a dyn ShaclEngine,
        mode: InferenceMode,
        strict: bool,
        max_fixture_depth: usize,
    ) -> Self {
        Self {
            resolver,
            engine,
            mode,
            strict,
            max_fixture_depth,
        }
    }

    /// Validate every file, collecting rendered results into a stage
    /// report.
    pub fn check_files(&self, root: &Path, files: &[PathBuf]) -> StageReport {
        let mut report = StageReport::new("check-data-conformance");
        if files.is_empty() {
            report.record(ReturnCode::Skipped);
            report.push_line("check-data-conformance: nothing to check");
            return report;
        }
        for file in files {
            let validation = self.validate_file(file);
            report.record(validation.result.return_code);
            report.push_line(validation.result.render(root, &validation.prefixes));
        }
        report
    }

    /// Validate one file. Errors become a nonconforming result instead of
    /// propagating, so one broken file never hides its siblings.
    pub fn validate_file(&self, path: &Path) -> FileValidation {
        match self.try_validate(path) {
            Ok(validation) => validation,
            Err(err) => {
                tracing::debug!(file = %path.display(), error = %err, "validation failed");
                FileValidation {
                    result: ValidationResult::failure(
                        err.return_code(),
                        err.to_string(),
                        vec![path.to_path_buf()],
                    ),
                    prefixes: IndexMap::new(),
                }
            }
        }
    }

    fn try_validate(&self, path: &Path) -> SuiteResult<FileValidation> {
        let assembler = GraphAssembler::new(self.resolver, self.strict);
        let mut data = assembler.load(path)?;

        FixtureStitcher::new(self.resolver, self.strict)
            .with_max_depth(self.max_fixture_depth)
            .stitch(&mut data)?;

        let types = data.extract_types();
        if types.is_empty() {
            return Err(SuiteError::EmptyTypeSet {
                path: path.to_path_buf(),
            });
        }
        let schemas = self
            .resolver
            .resolve_schema_for_types(types.iter().map(String::as_str))?;
        tracing::debug!(
            file = %path.display(),
            domains = ?schemas.domains,
            "schemas resolved"
        );

        let mut ontology = AssembledGraph::new()?;
        for schema_path in schemas.ontology_paths.iter().chain(
            self.resolver
                .base_ontology_paths_for_iris(types.iter().map(String::as_str))
                .iter(),
        ) {
            ontology.merge(&assembler.load(schema_path)?)?;
        }
        let combined = inference::apply(self.mode, &data, &ontology)?;

        let mut shapes = AssembledGraph::new()?;
        for shape_path in &schemas.shape_paths {
            shapes.merge(&assembler.load(shape_path)?)?;
        }
        let shacl = self.engine.validate(&combined, &shapes)?;

        let mut prefixes = combined.prefixes.clone();
        for (prefix, namespace) in &shapes.prefixes {
            prefixes
                .entry(prefix.clone())
                .or_insert_with(|| namespace.clone());
        }

        let mut result =
            ValidationResult::from_violations(shacl.violations(), vec![path.to_path_buf()]);
        for warning in shacl.warnings() {
            result
                .diagnostics
                .push(format!("warning: {}", warning.violation.message));
        }
        Ok(FileValidation { result, prefixes })
    }
}
