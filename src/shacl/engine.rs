//! Constraint checking.
//!
//! The orchestrator talks to SHACL through the [`ShaclEngine`] trait so the
//! built-in checker can be swapped for an external validator. The built-in
//! engine walks every node shape over its focus nodes and evaluates the
//! constraint subset the shapes catalogs actually use. Iteration order is
//! fully deterministic so that rendered reports are byte-stable.

use oxigraph::model::vocab::rdf;
use oxigraph::model::{NamedNode, NamedOrBlankNode, Term};
use oxigraph::store::Store;
use regex::Regex;

use crate::error::SuiteResult;
use crate::graph::AssembledGraph;
use crate::report::Violation;
use crate::shacl::shapes::{NodeShape, PropertyShape, Severity, ShapeDiscovery};

/// One constraint finding with its shape-declared severity.
#[derive(Debug, Clone)]
pub struct ShapeOutcome {
    pub severity: Severity,
    pub source_shape: String,
    pub violation: Violation,
}

/// Everything a validation pass found.
#[derive(Debug, Default)]
pub struct ShaclReport {
    pub outcomes: Vec<ShapeOutcome>,
}

impl ShaclReport {
    /// Only `sh:Violation` severity counts against conformance.
    pub fn conforms(&self) -> bool {
        !self
            .outcomes
            .iter()
            .any(|o| o.severity == Severity::Violation)
    }

    pub fn violations(&self) -> Vec<Violation> {
        self.outcomes
            .iter()
            .filter(|o| o.severity == Severity::Violation)
            .map(|o| o.violation.clone())
            .collect()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ShapeOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.severity != Severity::Violation)
    }
}

/// Seam between the pipeline and a SHACL implementation.
pub trait ShaclEngine {
    fn validate(
        &self,
        data: &AssembledGraph,
        shapes: &AssembledGraph,
    ) -> SuiteResult<ShaclReport>;
}

/// The built-in engine.
#[derive(Debug, Default)]
pub struct BuiltinEngine;

impl ShaclEngine for BuiltinEngine {
    fn validate(
        &self,
        data: &AssembledGraph,
        shapes: &AssembledGraph,
    ) -> SuiteResult<ShaclReport> {
        let node_shapes = ShapeDiscovery::new(&shapes.store).load_all_node_shapes()?;
        let mut report = ShaclReport::default();
        for shape in &node_shapes {
            let focus_nodes = focus_nodes(shape, &data.store)?;
            tracing::trace!(shape = %shape.id, focus = focus_nodes.len(), "checking shape");
            for focus in &focus_nodes {
                for property in &shape.properties {
                    let checker = ConstraintChecker::new(&data.store);
                    for violation in checker.check_property(focus, property)? {
                        report.outcomes.push(ShapeOutcome {
                            severity: shape.severity,
                            source_shape: shape.id.as_str().to_string(),
                            violation,
                        });
                    }
                }
            }
        }
        Ok(report)
    }
}

/// Focus nodes of a shape over the data graph, sorted by rendered form.
fn focus_nodes(shape: &NodeShape, data: &Store) -> SuiteResult<Vec<NamedOrBlankNode>> {
    let mut nodes: Vec<NamedOrBlankNode> = Vec::new();
    let mut push = |node: NamedOrBlankNode, nodes: &mut Vec<NamedOrBlankNode>| {
        if !nodes.contains(&node) {
            nodes.push(node);
        }
    };

    for class in &shape.target_classes {
        for quad in data.quads_for_pattern(None, Some(rdf::TYPE), Some(class.as_ref().into()), None)
        {
            push(quad?.subject, &mut nodes);
        }
    }
    for node in &shape.target_nodes {
        push(node.clone().into(), &mut nodes);
    }
    for predicate in &shape.target_subjects_of {
        for quad in data.quads_for_pattern(None, Some(predicate.as_ref()), None, None) {
            push(quad?.subject, &mut nodes);
        }
    }
    for predicate in &shape.target_objects_of {
        for quad in data.quads_for_pattern(None, Some(predicate.as_ref()), None, None) {
            match quad?.object {
                Term::NamedNode(n) => push(n.into(), &mut nodes),
                Term::BlankNode(b) => push(b.into(), &mut nodes),
                _ => {}
            }
        }
    }

    nodes.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
    Ok(nodes)
}

struct ConstraintChecker<'a> {
    data: &'a Store,
}

impl<'a> ConstraintChecker<'a> {
    fn new(data: &'a Store) -> Self {
        Self { data }
    }

    fn check_property(
        &self,
        focus: &NamedOrBlankNode,
        property: &PropertyShape,
    ) -> SuiteResult<Vec<Violation>> {
        let mut violations = Vec::new();
        let values = self.property_values(focus, &property.path)?;

        if let Some(min_count) = property.min_count {
            if (values.len() as i64) < min_count {
                violations.push(self.violation(
                    focus,
                    property,
                    "sh:minCount",
                    format!(
                        "Property {} must have at least {} value(s)",
                        property.path, min_count
                    ),
                ));
            }
        }
        if let Some(max_count) = property.max_count {
            if (values.len() as i64) > max_count {
                violations.push(self.violation(
                    focus,
                    property,
                    "sh:maxCount",
                    format!(
                        "Property {} must have at most {} value(s)",
                        property.path, max_count
                    ),
                ));
            }
        }
        for value in &values {
            self.check_value(focus, value, property, &mut violations)?;
        }
        Ok(violations)
    }

    fn check_value(
        &self,
        focus: &NamedOrBlankNode,
        value: &Term,
        property: &PropertyShape,
        violations: &mut Vec<Violation>,
    ) -> SuiteResult<()> {
        if let Some(expected) = &property.datatype {
            let ok = matches!(value, Term::Literal(lit) if lit.datatype() == expected.as_ref());
            if !ok {
                violations.push(self.violation(
                    focus,
                    property,
                    "sh:datatype",
                    format!("Value {value} must have datatype {expected}"),
                ));
            }
        }

        if let Some(expected) = &property.class {
            if !self.has_class(value, expected)? {
                violations.push(self.violation(
                    focus,
                    property,
                    "sh:class",
                    format!("Value {value} must be an instance of {expected}"),
                ));
            }
        }

        if let Some(kind) = &property.node_kind {
            if !kind.matches(value) {
                violations.push(self.violation(
                    focus,
                    property,
                    "sh:nodeKind",
                    format!("Value {value} has the wrong node kind"),
                ));
            }
        }

        if !property.in_values.is_empty() && !property.in_values.contains(value) {
            violations.push(self.violation(
                focus,
                property,
                "sh:in",
                format!("Value {value} is not in the allowed value list"),
            ));
        }

        if let Term::Literal(lit) = value {
            let text = lit.value();

            if let Some(pattern) = &property.pattern {
                match Regex::new(pattern) {
                    Ok(re) if re.is_match(text) => {}
                    Ok(_) => violations.push(self.violation(
                        focus,
                        property,
                        "sh:pattern",
                        format!("Value {value} must match pattern {pattern}"),
                    )),
                    Err(err) => {
                        tracing::warn!(pattern = %pattern, error = %err, "unusable sh:pattern");
                    }
                }
            }
            if let Some(min_length) = property.min_length {
                if (text.chars().count() as i64) < min_length {
                    violations.push(self.violation(
                        focus,
                        property,
                        "sh:minLength",
                        format!("Value {value} must have at least {min_length} characters"),
                    ));
                }
            }
            if let Some(max_length) = property.max_length {
                if (text.chars().count() as i64) > max_length {
                    violations.push(self.violation(
                        focus,
                        property,
                        "sh:maxLength",
                        format!("Value {value} must have at most {max_length} characters"),
                    ));
                }
            }
            if let Some(bound) = &property.min_inclusive {
                if !numeric_ge(text, bound.value()) {
                    violations.push(self.violation(
                        focus,
                        property,
                        "sh:minInclusive",
                        format!("Value {value} must be >= {}", bound.value()),
                    ));
                }
            }
            if let Some(bound) = &property.max_inclusive {
                if !numeric_ge(bound.value(), text) {
                    violations.push(self.violation(
                        focus,
                        property,
                        "sh:maxInclusive",
                        format!("Value {value} must be <= {}", bound.value()),
                    ));
                }
            }
        }
        Ok(())
    }

    fn property_values(
        &self,
        focus: &NamedOrBlankNode,
        path: &NamedNode,
    ) -> SuiteResult<Vec<Term>> {
        let mut values = Vec::new();
        for quad in self.data.quads_for_pattern(
            Some(focus.as_ref()),
            Some(path.as_ref()),
            None,
            None,
        ) {
            values.push(quad?.object);
        }
        values.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
        Ok(values)
    }

    fn has_class(&self, value: &Term, class: &NamedNode) -> SuiteResult<bool> {
        let subject: NamedOrBlankNode = match value {
            Term::NamedNode(n) => n.clone().into(),
            Term::BlankNode(b) => b.clone().into(),
            _ => return Ok(false),
        };
        for quad in self.data.quads_for_pattern(
            Some(subject.as_ref()),
            Some(rdf::TYPE),
            Some(class.as_ref().into()),
            None,
        ) {
            quad?;
            return Ok(true);
        }
        Ok(false)
    }

    fn violation(
        &self,
        focus: &NamedOrBlankNode,
        property: &PropertyShape,
        constraint: &str,
        default_message: String,
    ) -> Violation {
        Violation {
            focus_node: render_node(focus),
            path: Some(property.path.as_str().to_string()),
            constraint: Some(constraint.to_string()),
            message: property.message.clone().unwrap_or(default_message),
        }
    }
}

fn render_node(node: &NamedOrBlankNode) -> String {
    match node {
        NamedOrBlankNode::NamedNode(n) => n.as_str().to_string(),
        NamedOrBlankNode::BlankNode(b) => format!("_:{}", b.as_str()),
    }
}

/// `left >= right` under numeric comparison; falls back to lexicographic
/// comparison when either side is not a number.
fn numeric_ge(left: &str, right: &str) -> bool {
    match (left.parse::<f64>(), right.parse::<f64>()) {
        (Ok(l), Ok(r)) => l >= r,
        _ => left >= right,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphAssembler;
    use std::fs;
    use tempfile::TempDir;

    fn load(content: &str) -> AssembledGraph {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("g.ttl");
        fs::write(&path, content).unwrap();
        GraphAssembler::detached().load_turtle(&path).unwrap()
    }

    const SHAPES: &str = r#"
@prefix sh: <http://www.w3.org/ns/shacl#> .
@prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
@prefix ex: <https://e.org/> .

ex:LaneShape a sh:NodeShape ;
    sh:targetClass ex:Lane ;
    sh:property [
        sh:path ex:width ;
        sh:datatype xsd:decimal ;
        sh:minCount 1 ;
        sh:maxCount 1
    ] ;
    sh:property [
        sh:path ex:surface ;
        sh:in ( "asphalt" "concrete" )
    ] ;
    sh:property [
        sh:path ex:format ;
        sh:class ex:Format
    ] .
"#;

    fn validate(data: &str) -> ShaclReport {
        let data = load(data);
        let shapes = load(SHAPES);
        BuiltinEngine.validate(&data, &shapes).unwrap()
    }

    #[test]
    fn conforming_data_passes() {
        let report = validate(
            r#"@prefix ex: <https://e.org/> .
@prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
ex:lane-1 a ex:Lane ;
    ex:width "3.5"^^xsd:decimal ;
    ex:surface "asphalt" .
"#,
        );
        assert!(report.conforms(), "unexpected: {:?}", report.outcomes);
    }

    #[test]
    fn missing_required_property_violates_min_count() {
        let report = validate("@prefix ex: <https://e.org/> . ex:lane-1 a ex:Lane .");
        assert!(!report.conforms());
        let violations = report.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].constraint.as_deref(), Some("sh:minCount"));
        assert_eq!(violations[0].focus_node, "https://e.org/lane-1");
    }

    #[test]
    fn wrong_datatype_and_value_list() {
        let report = validate(
            r#"@prefix ex: <https://e.org/> .
ex:lane-1 a ex:Lane ;
    ex:width "wide" ;
    ex:surface "gravel" .
"#,
        );
        let constraints: Vec<_> = report
            .violations()
            .into_iter()
            .filter_map(|v| v.constraint)
            .collect();
        assert!(constraints.contains(&"sh:datatype".to_string()));
        assert!(constraints.contains(&"sh:in".to_string()));
    }

    #[test]
    fn class_constraint_checks_instance_types() {
        let report = validate(
            r#"@prefix ex: <https://e.org/> .
@prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
ex:lane-1 a ex:Lane ;
    ex:width "1.0"^^xsd:decimal ;
    ex:format ex:unknown-format .
"#,
        );
        let violations = report.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].constraint.as_deref(), Some("sh:class"));
    }

    #[test]
    fn blank_node_focus_nodes_are_checked() {
        let data = load(
            r#"@prefix ex: <https://e.org/> .
ex:map-1 ex:lane [ a ex:Lane ] .
"#,
        );
        let shapes = load(SHAPES);
        let report = BuiltinEngine.validate(&data, &shapes).unwrap();
        assert!(!report.conforms());
        assert!(report.violations()[0].focus_node.starts_with("_:"));
    }

    #[test]
    fn warning_severity_does_not_break_conformance() {
        let shapes = load(
            r#"@prefix sh: <http://www.w3.org/ns/shacl#> .
@prefix ex: <https://e.org/> .
ex:LaneShape a sh:NodeShape ;
    sh:targetClass ex:Lane ;
    sh:severity sh:Warning ;
    sh:property [ sh:path ex:width ; sh:minCount 1 ] .
"#,
        );
        let data = load("@prefix ex: <https://e.org/> . ex:lane-1 a ex:Lane .");
        let report = BuiltinEngine.validate(&data, &shapes).unwrap();
        assert!(report.conforms());
        assert_eq!(report.warnings().count(), 1);
    }
}
