//! SHACL shape model and discovery.
//!
//! Shapes are read from the already-parsed shapes graph into a plain Rust
//! model once per validation run. Discovery is deterministic: shapes come
//! out sorted by IRI and property shapes in declaration order of the
//! shapes file (store iteration order of `sh:property` quads).

use std::collections::HashSet;

use oxigraph::model::vocab::rdf;
use oxigraph::model::{Literal, NamedNode, NamedNodeRef, NamedOrBlankNode, NamedOrBlankNodeRef, Term};
use oxigraph::store::Store;

use crate::error::SuiteResult;
use crate::iri::SH_NS;

macro_rules! sh {
    ($name:ident, $local:literal) => {
        pub(crate) const $name: NamedNodeRef<'static> =
            NamedNodeRef::new_unchecked(concat!("http://www.w3.org/ns/shacl#", $local));
    };
}

sh!(SH_NODE_SHAPE, "NodeShape");
sh!(SH_TARGET_CLASS, "targetClass");
sh!(SH_TARGET_NODE, "targetNode");
sh!(SH_TARGET_SUBJECTS_OF, "targetSubjectsOf");
sh!(SH_TARGET_OBJECTS_OF, "targetObjectsOf");
sh!(SH_PROPERTY, "property");
sh!(SH_PATH, "path");
sh!(SH_DATATYPE, "datatype");
sh!(SH_CLASS, "class");
sh!(SH_NODE_KIND, "nodeKind");
sh!(SH_MIN_COUNT, "minCount");
sh!(SH_MAX_COUNT, "maxCount");
sh!(SH_PATTERN, "pattern");
sh!(SH_MIN_LENGTH, "minLength");
sh!(SH_MAX_LENGTH, "maxLength");
sh!(SH_MIN_INCLUSIVE, "minInclusive");
sh!(SH_MAX_INCLUSIVE, "maxInclusive");
sh!(SH_IN, "in");
sh!(SH_MESSAGE, "message");
sh!(SH_SEVERITY, "severity");

const RDF_FIRST: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://www.w3.org/1999/02/22-rdf-syntax-ns#first");
const RDF_REST: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://www.w3.org/1999/02/22-rdf-syntax-ns#rest");
const RDF_NIL: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://www.w3.org/1999/02/22-rdf-syntax-ns#nil");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    #[default]
    Violation,
    Warning,
    Info,
}

impl Severity {
    fn from_iri(iri: &str) -> Self {
        match iri.strip_prefix(SH_NS) {
            Some("Warning") => Severity::Warning,
            Some("Info") => Severity::Info,
            _ => Severity::Violation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Iri,
    BlankNode,
    Literal,
    BlankNodeOrIri,
    BlankNodeOrLiteral,
    IriOrLiteral,
}

impl NodeKind {
    fn from_iri(iri: &str) -> Option<Self> {
        match iri.strip_prefix(SH_NS)? {
            "IRI" => Some(NodeKind::Iri),
            "BlankNode" => Some(NodeKind::BlankNode),
            "Literal" => Some(NodeKind::Literal),
            "BlankNodeOrIRI" => Some(NodeKind::BlankNodeOrIri),
            "BlankNodeOrLiteral" => Some(NodeKind::BlankNodeOrLiteral),
            "IRIOrLiteral" => Some(NodeKind::IriOrLiteral),
            _ => None,
        }
    }

    pub fn matches(&self, term: &Term) -> bool {
        match self {
            NodeKind::Iri => matches!(term, Term::NamedNode(_)),
            NodeKind::BlankNode => matches!(term, Term::BlankNode(_)),
            NodeKind::Literal => matches!(term, Term::Literal(_)),
            NodeKind::BlankNodeOrIri => {
                matches!(term, Term::BlankNode(_) | Term::NamedNode(_))
            }
            NodeKind::BlankNodeOrLiteral => {
                matches!(term, Term::BlankNode(_) | Term::Literal(_))
            }
            NodeKind::IriOrLiteral => {
                matches!(term, Term::NamedNode(_) | Term::Literal(_))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct PropertyShape {
    pub path: NamedNode,
    pub datatype: Option<NamedNode>,
    pub class: Option<NamedNode>,
    pub node_kind: Option<NodeKind>,
    pub min_count: Option<i64>,
    pub max_count: Option<i64>,
    pub pattern: Option<String>,
    pub min_length: Option<i64>,
    pub max_length: Option<i64>,
    pub min_inclusive: Option<Literal>,
    pub max_inclusive: Option<Literal>,
    pub in_values: Vec<Term>,
    pub message: Option<String>,
}

impl PropertyShape {
    fn new(path: NamedNode) -> Self {
        Self {
            path,
            datatype: None,
            class: None,
            node_kind: None,
            min_count: None,
            max_count: None,
            pattern: None,
            min_length: None,
            max_length: None,
            min_inclusive: None,
            max_inclusive: None,
            in_values: Vec::new(),
            message: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NodeShape {
    pub id: NamedNode,
    pub target_classes: Vec<NamedNode>,
    pub target_nodes: Vec<NamedNode>,
    pub target_subjects_of: Vec<NamedNode>,
    pub target_objects_of: Vec<NamedNode>,
    pub severity: Severity,
    pub properties: Vec<PropertyShape>,
}

impl NodeShape {
    fn new(id: NamedNode) -> Self {
        Self {
            id,
            target_classes: Vec::new(),
            target_nodes: Vec::new(),
            target_subjects_of: Vec::new(),
            target_objects_of: Vec::new(),
            severity: Severity::Violation,
            properties: Vec::new(),
        }
    }
}

pub struct ShapeDiscovery<'a> {
    shapes_store: &'a Store,
}

impl<'a> ShapeDiscovery<'a> {
    pub fn new(shapes_store: &'a Store) -> Self {
        Self { shapes_store }
    }

    /// All node shapes of the shapes graph, sorted by IRI. A subject counts
    /// as a node shape if it is typed `sh:NodeShape` or carries any target
    /// declaration.
    pub fn load_all_node_shapes(&self) -> SuiteResult<Vec<NodeShape>> {
        let mut ids: Vec<NamedNode> = Vec::new();
        for quad in self.shapes_store.quads_for_pattern(
            None,
            Some(rdf::TYPE),
            Some(SH_NODE_SHAPE.into()),
            None,
        ) {
            let quad = quad?;
            if let NamedOrBlankNode::NamedNode(id) = quad.subject {
                ids.push(id);
            }
        }
        for target in [SH_TARGET_CLASS, SH_TARGET_NODE, SH_TARGET_SUBJECTS_OF, SH_TARGET_OBJECTS_OF]
        {
            for quad in self.shapes_store.quads_for_pattern(None, Some(target), None, None) {
                let quad = quad?;
                if let NamedOrBlankNode::NamedNode(id) = quad.subject {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
            }
        }
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids.dedup();

        ids.into_iter().map(|id| self.load_node_shape(id)).collect()
    }

    fn load_node_shape(&self, id: NamedNode) -> SuiteResult<NodeShape> {
        let mut shape = NodeShape::new(id);
        let subject: NamedOrBlankNode = shape.id.clone().into();

        for (predicate, bucket) in [
            (SH_TARGET_CLASS, &mut shape.target_classes),
            (SH_TARGET_NODE, &mut shape.target_nodes),
            (SH_TARGET_SUBJECTS_OF, &mut shape.target_subjects_of),
            (SH_TARGET_OBJECTS_OF, &mut shape.target_objects_of),
        ] {
            for term in self.objects(subject.as_ref(), predicate)? {
                if let Term::NamedNode(node) = term {
                    bucket.push(node);
                }
            }
        }
        if let Some(Term::NamedNode(node)) = self.object(subject.as_ref(), SH_SEVERITY)? {
            shape.severity = Severity::from_iri(node.as_str());
        }

        for term in self.objects(subject.as_ref(), SH_PROPERTY)? {
            let prop_subject = match &term {
                Term::NamedNode(n) => NamedOrBlankNode::from(n.clone()),
                Term::BlankNode(b) => NamedOrBlankNode::from(b.clone()),
                _ => continue,
            };
            if let Some(property) = self.load_property_shape(prop_subject)? {
                shape.properties.push(property);
            }
        }
        Ok(shape)
    }

    /// A property shape without a named `sh:path` is skipped; complex path
    /// expressions are out of scope for this checker.
    fn load_property_shape(
        &self,
        id: NamedOrBlankNode,
    ) -> SuiteResult<Option<PropertyShape>> {
        let Some(Term::NamedNode(path)) = self.object(id.as_ref(), SH_PATH)? else {
            tracing::debug!(shape = %id, "property shape without named path, skipping");
            return Ok(None);
        };
        let mut property = PropertyShape::new(path);

        if let Some(Term::NamedNode(dt)) = self.object(id.as_ref(), SH_DATATYPE)? {
            property.datatype = Some(dt);
        }
        if let Some(Term::NamedNode(class)) = self.object(id.as_ref(), SH_CLASS)? {
            property.class = Some(class);
        }
        if let Some(Term::NamedNode(kind)) = self.object(id.as_ref(), SH_NODE_KIND)? {
            property.node_kind = NodeKind::from_iri(kind.as_str());
        }
        property.min_count = self.integer(id.as_ref(), SH_MIN_COUNT)?;
        property.max_count = self.integer(id.as_ref(), SH_MAX_COUNT)?;
        property.pattern = self.string(id.as_ref(), SH_PATTERN)?;
        property.min_length = self.integer(id.as_ref(), SH_MIN_LENGTH)?;
        property.max_length = self.integer(id.as_ref(), SH_MAX_LENGTH)?;
        if let Some(Term::Literal(lit)) = self.object(id.as_ref(), SH_MIN_INCLUSIVE)? {
            property.min_inclusive = Some(lit);
        }
        if let Some(Term::Literal(lit)) = self.object(id.as_ref(), SH_MAX_INCLUSIVE)? {
            property.max_inclusive = Some(lit);
        }
        if let Some(head) = self.object(id.as_ref(), SH_IN)? {
            property.in_values = self.rdf_list(&head)?;
        }
        property.message = self.string(id.as_ref(), SH_MESSAGE)?;

        Ok(Some(property))
    }

    fn object(
        &self,
        subject: NamedOrBlankNodeRef<'_>,
        predicate: NamedNodeRef<'_>,
    ) -> SuiteResult<Option<Term>> {
        for quad in self
            .shapes_store
            .quads_for_pattern(Some(subject), Some(predicate), None, None)
        {
            return Ok(Some(quad?.object));
        }
        Ok(None)
    }

    fn objects(
        &self,
        subject: NamedOrBlankNodeRef<'_>,
        predicate: NamedNodeRef<'_>,
    ) -> SuiteResult<Vec<Term>> {
        let mut terms = Vec::new();
        for quad in self
            .shapes_store
            .quads_for_pattern(Some(subject), Some(predicate), None, None)
        {
            terms.push(quad?.object);
        }
        terms.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
        Ok(terms)
    }

    fn string(
        &self,
        subject: NamedOrBlankNodeRef<'_>,
        predicate: NamedNodeRef<'_>,
    ) -> SuiteResult<Option<String>> {
        match self.object(subject, predicate)? {
            Some(Term::Literal(lit)) => Ok(Some(lit.value().to_string())),
            _ => Ok(None),
        }
    }

    fn integer(
        &self,
        subject: NamedOrBlankNodeRef<'_>,
        predicate: NamedNodeRef<'_>,
    ) -> SuiteResult<Option<i64>> {
        match self.object(subject, predicate)? {
            Some(Term::Literal(lit)) => Ok(lit.value().parse().ok()),
            _ => Ok(None),
        }
    }

    fn rdf_list(&self, head: &Term) -> SuiteResult<Vec<Term>> {
        let mut values = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut current = head.clone();
        loop {
            let node: NamedOrBlankNode = match &current {
                Term::NamedNode(n) if n.as_ref() == RDF_NIL => break,
                Term::NamedNode(n) => n.clone().into(),
                Term::BlankNode(b) => b.clone().into(),
                _ => break,
            };
            // a cyclic rdf:rest chain must not hang shape discovery
            if !visited.insert(node.to_string()) {
                tracing::warn!(node = %node, "cyclic rdf:rest chain in shapes list, truncating");
                break;
            }
            if let Some(first) = self.object(node.as_ref(), RDF_FIRST)? {
                values.push(first);
            }
            match self.object(node.as_ref(), RDF_REST)? {
                Some(rest) => current = rest,
                None => break,
            }
        }
        Ok(values)
    }
}
