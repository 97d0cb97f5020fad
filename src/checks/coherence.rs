//! Artifact coherence stage: shapes must talk about classes the ontology
//! declares.
//!
//! For each domain, the ontology (plus the shared base vocabularies from
//! the imports catalog) yields the set of declared classes, and the shapes
//! files the set of classes they target or reference. Matching is on
//! lowercased local names, since shapes and ontologies in the wild disagree
//! on namespace spelling. Mismatches are collected per domain and reported
//! together.

use std::collections::BTreeSet;

use oxigraph::model::vocab::{rdf, rdfs};
use oxigraph::model::{NamedNodeRef, NamedOrBlankNode, Term};

use crate::catalog::CatalogResolver;
use crate::checks::StageReport;
use crate::error::{ReturnCode, SuiteError, SuiteResult};
use crate::graph::{AssembledGraph, GraphAssembler};
use crate::iri::{is_well_known_type, local_name_lower};
use crate::shacl::shapes::{SH_CLASS, SH_TARGET_CLASS};

const OWL_CLASS: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2002/07/owl#Class");

pub fn check_domains(
    resolver: &CatalogResolver,
    domains: &[String],
) -> SuiteResult<StageReport> {
    let mut report = StageReport::new("check-artifact-coherence");
    if domains.is_empty() {
        report.record(ReturnCode::Skipped);
        report.push_line("check-artifact-coherence: no domains in scope");
        return Ok(report);
    }
    let assembler = GraphAssembler::new(resolver, false);

    for name in domains {
        match check_domain(resolver, &assembler, name) {
            Ok(missing) if missing.is_empty() => {
                tracing::debug!(domain = %name, "artifacts coherent");
            }
            Ok(missing) => {
                report.record(ReturnCode::MissingTargetClass);
                report.push_line(format!(
                    "Domain {name}: shapes reference classes the ontology does not declare: {}",
                    missing.into_iter().collect::<Vec<_>>().join(", ")
                ));
            }
            Err(err) => {
                let code = match &err {
                    SuiteError::Syntax { .. } => err.return_code(),
                    _ => ReturnCode::CoherenceError,
                };
                report.record(code);
                report.push_line(format!("Domain {name}: {err}"));
            }
        }
    }
    Ok(report)
}

/// Lowercased local names of classes the shapes mention but the ontology
/// does not declare.
fn check_domain(
    resolver: &CatalogResolver,
    assembler: &GraphAssembler<'_>,
    name: &str,
) -> SuiteResult<BTreeSet<String>> {
    let domain = resolver.resolve_domain(name)?;
    if domain.ontology_paths.is_empty() {
        return Err(SuiteError::Catalog {
            path: resolver.root().to_path_buf(),
            detail: format!("domain {name} has no ontology artifact"),
        });
    }
    if domain.shape_paths.is_empty() {
        return Err(SuiteError::Catalog {
            path: resolver.root().to_path_buf(),
            detail: format!("domain {name} has no shapes artifact"),
        });
    }

    let mut ontology = AssembledGraph::new()?;
    for path in domain
        .ontology_paths
        .iter()
        .chain(resolver.base_ontology_paths().iter())
    {
        ontology.merge(&assembler.load(path)?)?;
    }
    let declared = declared_classes(&ontology)?;

    let mut shapes = AssembledGraph::new()?;
    for path in &domain.shape_paths {
        shapes.merge(&assembler.load(path)?)?;
    }

    let mut missing = BTreeSet::new();
    for class_iri in referenced_classes(&shapes)? {
        if is_well_known_type(&class_iri) {
            continue;
        }
        if !declared.contains(&local_name_lower(&class_iri)) {
            missing.insert(local_name_lower(&class_iri));
        }
    }
    Ok(missing)
}

/// Classes the ontology declares, as lowercased local names: everything
/// typed `owl:Class` or `rdfs:Class`, plus anything placed in a subclass
/// hierarchy.
fn declared_classes(ontology: &AssembledGraph) -> SuiteResult<BTreeSet<String>> {
    let mut classes = BTreeSet::new();
    for class_type in [OWL_CLASS, rdfs::CLASS] {
        for quad in ontology.store.quads_for_pattern(
            None,
            Some(rdf::TYPE),
            Some(class_type.into()),
            None,
        ) {
            if let NamedOrBlankNode::NamedNode(node) = quad?.subject {
                classes.insert(local_name_lower(node.as_str()));
            }
        }
    }
    for quad in ontology
        .store
        .quads_for_pattern(None, Some(rdfs::SUB_CLASS_OF), None, None)
    {
        let quad = quad?;
        if let NamedOrBlankNode::NamedNode(node) = &quad.subject {
            classes.insert(local_name_lower(node.as_str()));
        }
        if let Term::NamedNode(node) = &quad.object {
            classes.insert(local_name_lower(node.as_str()));
        }
    }
    Ok(classes)
}

/// Class IRIs the shapes graph targets or constrains against.
fn referenced_classes(shapes: &AssembledGraph) -> SuiteResult<BTreeSet<String>> {
    let mut classes = BTreeSet::new();
    for predicate in [SH_TARGET_CLASS, SH_CLASS] {
        for quad in shapes
            .store
            .quads_for_pattern(None, Some(predicate), None, None)
        {
            if let Term::NamedNode(node) = quad?.object {
                classes.insert(node.as_str().to_string());
            }
        }
    }
    Ok(classes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn repo(ontology: &str, shapes: &str) -> TempDir {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "artifacts/catalog-v001.xml",
            r#"<catalog xmlns="urn:oasis:names:tc:entity:xmlns:xml:catalog">
  <uri name="https://e.org/lane/v1/" uri="lane/lane.owl.ttl"/>
  <uri name="https://e.org/lane/v1/shapes" uri="lane/lane.shacl.ttl"/>
</catalog>"#,
        );
        write(tmp.path(), "artifacts/lane/lane.owl.ttl", ontology);
        write(tmp.path(), "artifacts/lane/lane.shacl.ttl", shapes);
        tmp
    }

    const ONTOLOGY: &str = r#"
@prefix owl: <http://www.w3.org/2002/07/owl#> .
@prefix ex: <https://e.org/lane/v1/> .
ex:Lane a owl:Class .
ex:Surface a owl:Class .
"#;

    #[test]
    fn coherent_artifacts_pass() {
        let tmp = repo(
            ONTOLOGY,
            r#"@prefix sh: <http://www.w3.org/ns/shacl#> .
@prefix ex: <https://e.org/lane/v1/> .
ex:LaneShape a sh:NodeShape ; sh:targetClass ex:Lane .
"#,
        );
        let resolver = CatalogResolver::open(tmp.path()).unwrap();
        let report =
            check_domains(&resolver, &["lane".to_string()]).unwrap();
        assert_eq!(report.code, ReturnCode::Success);
    }

    #[test]
    fn case_differences_in_local_names_are_tolerated() {
        let tmp = repo(
            ONTOLOGY,
            r#"@prefix sh: <http://www.w3.org/ns/shacl#> .
@prefix other: <https://other.example/ns/> .
other:laneShape a sh:NodeShape ; sh:targetClass other:LANE .
"#,
        );
        let resolver = CatalogResolver::open(tmp.path()).unwrap();
        let report =
            check_domains(&resolver, &["lane".to_string()]).unwrap();
        assert_eq!(report.code, ReturnCode::Success);
    }

    #[test]
    fn undeclared_target_classes_are_collected_together() {
        let tmp = repo(
            ONTOLOGY,
            r#"@prefix sh: <http://www.w3.org/ns/shacl#> .
@prefix ex: <https://e.org/lane/v1/> .
ex:GhostShape a sh:NodeShape ; sh:targetClass ex:Ghost .
ex:PhantomShape a sh:NodeShape ;
    sh:property [ sh:path ex:ref ; sh:class ex:Phantom ] .
"#,
        );
        let resolver = CatalogResolver::open(tmp.path()).unwrap();
        let report =
            check_domains(&resolver, &["lane".to_string()]).unwrap();
        assert_eq!(report.code, ReturnCode::MissingTargetClass);
        assert_eq!(report.lines.len(), 1);
        assert!(report.lines[0].contains("ghost"));
        assert!(report.lines[0].contains("phantom"));
    }

    #[test]
    fn unknown_domain_is_a_coherence_error() {
        let tmp = repo(ONTOLOGY, "");
        let resolver = CatalogResolver::open(tmp.path()).unwrap();
        let report =
            check_domains(&resolver, &["nosuch".to_string()]).unwrap();
        assert_eq!(report.code, ReturnCode::CoherenceError);
    }
}
