//! Inference over the combined data + ontology graph.
//!
//! All modes are materializing and monotonic: rules only ever add triples
//! to a fresh copy of the input union, so callers keep their pre-inference
//! graphs intact. The RDFS ruleset covers subclass/subproperty closure and
//! domain/range typing (rules 2, 3, 5, 7, 9, 11); the OWL-RL subset adds
//! equivalence, inverse, symmetric and transitive property expansion and
//! then runs the RDFS rules over the result.

use oxigraph::model::vocab::{rdf, rdfs};
use oxigraph::model::{GraphName, NamedNode, NamedNodeRef, NamedOrBlankNode, Quad, Term};
use oxigraph::store::Store;

use crate::error::{SuiteError, SuiteResult};
use crate::graph::assembler::AssembledGraph;

const OWL_EQUIVALENT_CLASS: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2002/07/owl#equivalentClass");
const OWL_EQUIVALENT_PROPERTY: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2002/07/owl#equivalentProperty");
const OWL_INVERSE_OF: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2002/07/owl#inverseOf");
const OWL_SYMMETRIC_PROPERTY: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2002/07/owl#SymmetricProperty");
const OWL_TRANSITIVE_PROPERTY: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2002/07/owl#TransitiveProperty");

/// Which entailment regime to apply before SHACL checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceMode {
    /// Plain union of data and ontology, no entailment
    None,
    /// RDFS closure
    #[default]
    Rdfs,
    /// OWL-RL subset followed by the RDFS closure
    Owlrl,
    /// RDFS closure first, then the OWL-RL pass
    Both,
}

/// Union `data` and `ontology` into a new graph and materialize the
/// entailments of `mode` in it.
pub fn apply(
    mode: InferenceMode,
    data: &AssembledGraph,
    ontology: &AssembledGraph,
) -> SuiteResult<AssembledGraph> {
    let mut combined = AssembledGraph::new()?;
    combined.merge(data)?;
    combined.merge(ontology)?;

    check_schema_wellformed(&combined.store)?;

    let before = combined.len();
    match mode {
        InferenceMode::None => {}
        InferenceMode::Rdfs => {
            run_to_fixpoint(&combined.store, rdfs_pass)?;
        }
        InferenceMode::Owlrl => {
            run_to_fixpoint(&combined.store, owl_rl_pass)?;
            run_to_fixpoint(&combined.store, rdfs_pass)?;
        }
        InferenceMode::Both => {
            run_to_fixpoint(&combined.store, rdfs_pass)?;
            run_to_fixpoint(&combined.store, owl_rl_pass)?;
            run_to_fixpoint(&combined.store, rdfs_pass)?;
        }
    }
    tracing::debug!(
        mode = ?mode,
        base = before,
        inferred = combined.len() - before,
        "inference complete"
    );
    Ok(combined)
}

/// A schema triple with a literal where a class or property IRI belongs
/// makes rule application meaningless; fail instead of inferring nonsense.
fn check_schema_wellformed(store: &Store) -> SuiteResult<()> {
    let schema_predicates = [
        rdfs::SUB_CLASS_OF,
        rdfs::SUB_PROPERTY_OF,
        rdfs::DOMAIN,
        rdfs::RANGE,
        OWL_EQUIVALENT_CLASS,
        OWL_EQUIVALENT_PROPERTY,
        OWL_INVERSE_OF,
    ];
    for predicate in schema_predicates {
        for quad in store.quads_for_pattern(None, Some(predicate), None, None) {
            let quad = quad?;
            if matches!(quad.object, Term::Literal(_)) {
                return Err(SuiteError::Inference(format!(
                    "literal object in schema triple: {} {} {}",
                    quad.subject, quad.predicate, quad.object
                )));
            }
        }
    }
    Ok(())
}

fn run_to_fixpoint<F>(store: &Store, pass: F) -> SuiteResult<()>
where
    F: Fn(&Store) -> SuiteResult<usize>,
{
    loop {
        if pass(store)? == 0 {
            return Ok(());
        }
    }
}

fn insert_new(store: &Store, quads: &[Quad]) -> SuiteResult<usize> {
    let mut added = 0;
    for quad in quads {
        if !store.contains(quad)? {
            store.insert(quad)?;
            added += 1;
        }
    }
    Ok(added)
}

fn triple(subject: NamedOrBlankNode, predicate: NamedNode, object: Term) -> Quad {
    Quad::new(subject, predicate, object, GraphName::DefaultGraph)
}

/// One application of rdfs 2, 3, 5, 7, 9 and 11 over the whole store.
fn rdfs_pass(store: &Store) -> SuiteResult<usize> {
    let mut fresh: Vec<Quad> = Vec::new();

    // rdfs5 / rdfs11: subPropertyOf and subClassOf transitivity
    for hierarchy in [rdfs::SUB_PROPERTY_OF, rdfs::SUB_CLASS_OF] {
        for quad in store.quads_for_pattern(None, Some(hierarchy), None, None) {
            let quad = quad?;
            let Term::NamedNode(mid) = &quad.object else {
                continue;
            };
            for next in store.quads_for_pattern(
                Some(mid.as_ref().into()),
                Some(hierarchy),
                None,
                None,
            ) {
                let next = next?;
                fresh.push(triple(
                    quad.subject.clone(),
                    hierarchy.into_owned(),
                    next.object.clone(),
                ));
            }
        }
    }

    // rdfs7: property usage propagates up subPropertyOf
    for quad in store.quads_for_pattern(None, Some(rdfs::SUB_PROPERTY_OF), None, None) {
        let quad = quad?;
        let NamedOrBlankNode::NamedNode(sub) = &quad.subject else {
            continue;
        };
        let Term::NamedNode(sup) = &quad.object else {
            continue;
        };
        for usage in store.quads_for_pattern(None, Some(sub.as_ref()), None, None) {
            let usage = usage?;
            fresh.push(triple(usage.subject.clone(), sup.clone(), usage.object.clone()));
        }
    }

    // rdfs2 / rdfs3: domain and range typing
    for (schema_predicate, types_subject) in [(rdfs::DOMAIN, true), (rdfs::RANGE, false)] {
        for quad in store.quads_for_pattern(None, Some(schema_predicate), None, None) {
            let quad = quad?;
            let NamedOrBlankNode::NamedNode(property) = &quad.subject else {
                continue;
            };
            let Term::NamedNode(class) = &quad.object else {
                continue;
            };
            for usage in store.quads_for_pattern(None, Some(property.as_ref()), None, None) {
                let usage = usage?;
                let typed: NamedOrBlankNode = if types_subject {
                    usage.subject.clone()
                } else {
                    match &usage.object {
                        Term::NamedNode(n) => n.clone().into(),
                        Term::BlankNode(b) => b.clone().into(),
                        _ => continue,
                    }
                };
                fresh.push(triple(
                    typed,
                    rdf::TYPE.into_owned(),
                    class.clone().into(),
                ));
            }
        }
    }

    // rdfs9: instances inherit supertypes
    for quad in store.quads_for_pattern(None, Some(rdfs::SUB_CLASS_OF), None, None) {
        let quad = quad?;
        let NamedOrBlankNode::NamedNode(sub) = &quad.subject else {
            continue;
        };
        for instance in store.quads_for_pattern(
            None,
            Some(rdf::TYPE),
            Some(sub.as_ref().into()),
            None,
        ) {
            let instance = instance?;
            fresh.push(triple(
                instance.subject.clone(),
                rdf::TYPE.into_owned(),
                quad.object.clone(),
            ));
        }
    }

    insert_new(store, &fresh)
}

/// One application of the OWL-RL subset: equivalence, inverse, symmetric
/// and transitive properties.
fn owl_rl_pass(store: &Store) -> SuiteResult<usize> {
    let mut fresh: Vec<Quad> = Vec::new();

    // equivalentClass / equivalentProperty expand to mutual subsumption
    for (equivalence, hierarchy) in [
        (OWL_EQUIVALENT_CLASS, rdfs::SUB_CLASS_OF),
        (OWL_EQUIVALENT_PROPERTY, rdfs::SUB_PROPERTY_OF),
    ] {
        for quad in store.quads_for_pattern(None, Some(equivalence), None, None) {
            let quad = quad?;
            let Term::NamedNode(object) = &quad.object else {
                continue;
            };
            fresh.push(triple(
                quad.subject.clone(),
                hierarchy.into_owned(),
                quad.object.clone(),
            ));
            fresh.push(triple(
                object.clone().into(),
                hierarchy.into_owned(),
                named_or_blank_to_term(&quad.subject),
            ));
        }
    }

    // inverseOf, both directions
    for quad in store.quads_for_pattern(None, Some(OWL_INVERSE_OF), None, None) {
        let quad = quad?;
        let NamedOrBlankNode::NamedNode(p) = &quad.subject else {
            continue;
        };
        let Term::NamedNode(q) = &quad.object else {
            continue;
        };
        fresh.extend(swapped_usages(store, p, q)?);
        fresh.extend(swapped_usages(store, q, p)?);
    }

    // symmetric properties
    for quad in store.quads_for_pattern(
        None,
        Some(rdf::TYPE),
        Some(OWL_SYMMETRIC_PROPERTY.into()),
        None,
    ) {
        let quad = quad?;
        let NamedOrBlankNode::NamedNode(p) = &quad.subject else {
            continue;
        };
        fresh.extend(swapped_usages(store, p, p)?);
    }

    // transitive properties
    for quad in store.quads_for_pattern(
        None,
        Some(rdf::TYPE),
        Some(OWL_TRANSITIVE_PROPERTY.into()),
        None,
    ) {
        let quad = quad?;
        let NamedOrBlankNode::NamedNode(p) = &quad.subject else {
            continue;
        };
        for first in store.quads_for_pattern(None, Some(p.as_ref()), None, None) {
            let first = first?;
            let Term::NamedNode(mid) = &first.object else {
                continue;
            };
            for second in store.quads_for_pattern(
                Some(mid.as_ref().into()),
                Some(p.as_ref()),
                None,
                None,
            ) {
                let second = second?;
                fresh.push(triple(
                    first.subject.clone(),
                    p.clone(),
                    second.object.clone(),
                ));
            }
        }
    }

    insert_new(store, &fresh)
}

/// `x p y` becomes `y q x` for every usage of `p` with a non-literal object.
fn swapped_usages(store: &Store, p: &NamedNode, q: &NamedNode) -> SuiteResult<Vec<Quad>> {
    let mut quads = Vec::new();
    for usage in store.quads_for_pattern(None, Some(p.as_ref()), None, None) {
        let usage = usage?;
        let swapped_subject: NamedOrBlankNode = match &usage.object {
            Term::NamedNode(n) => n.clone().into(),
            Term::BlankNode(b) => b.clone().into(),
            _ => continue,
        };
        quads.push(triple(
            swapped_subject,
            q.clone(),
            named_or_blank_to_term(&usage.subject),
        ));
    }
    Ok(quads)
}

fn named_or_blank_to_term(node: &NamedOrBlankNode) -> Term {
    match node {
        NamedOrBlankNode::NamedNode(n) => n.clone().into(),
        NamedOrBlankNode::BlankNode(b) => b.clone().into(),
    }
}
