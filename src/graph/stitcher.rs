//! Fixture stitching: resolving external references into the data graph.
//!
//! Instance data points at off-graph identities through `did:` IRIs. Each
//! such reference is looked up in the fixture catalog, its file loaded and
//! merged, and the merged graph re-scanned, since fixtures can reference
//! further fixtures. A visited set keeps the walk terminating on reference
//! cycles; the depth bound catches catalogs that keep producing new
//! frontier IRIs.

use std::collections::HashSet;
use std::collections::VecDeque;

use crate::catalog::CatalogResolver;
use crate::error::{SuiteError, SuiteResult};
use crate::graph::assembler::{AssembledGraph, GraphAssembler};

pub const DEFAULT_MAX_DEPTH: usize = 10;

/// What a stitching pass did, in first-seen order.
#[derive(Debug, Default)]
pub struct StitchReport {
    pub resolved: Vec<String>,
}

pub struct FixtureStitcher<'a> {
    resolver: &'a CatalogResolver,
    assembler: GraphAssembler<'a>,
    max_depth: usize,
}

impl<'a> FixtureStitcher<'a> {
    pub fn new(resolver: &'a CatalogResolver, strict: bool) -> Self {
        Self {
            resolver,
            assembler: GraphAssembler::new(resolver, strict),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Merge fixtures for every external reference reachable from `graph`
    /// until a fixed point. A reference without a fixture is a hard error;
    /// exceeding the depth bound reports the still-pending frontier.
    pub fn stitch(&self, graph: &mut AssembledGraph) -> SuiteResult<StitchReport> {
        let mut report = StitchReport::default();
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = graph.external_references().into();

        let mut depth = 0usize;
        while !queue.is_empty() {
            if depth >= self.max_depth {
                let mut pending: Vec<String> = queue.into_iter().collect();
                pending.sort();
                return Err(SuiteError::FixtureCycleExceeded {
                    max_depth: self.max_depth,
                    pending,
                });
            }
            depth += 1;

            while let Some(iri) = queue.pop_front() {
                if !visited.insert(iri.clone()) {
                    continue;
                }
                let path = self.resolver.resolve_fixture(&iri)?;
                tracing::debug!(fixture = %iri, path = %path.display(), "stitching fixture");
                let fixture = self.assembler.load(&path)?;
                graph.merge(&fixture)?;
                report.resolved.push(iri);
            }

            // merging can expose new references
            for iri in graph.external_references() {
                if !visited.contains(&iri) {
                    queue.push_back(iri);
                }
            }
        }
        Ok(report)
    }
}
