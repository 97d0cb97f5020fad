//! IRI helpers shared across the catalog, graph, and check layers.
//!
//! Local-name extraction and variant expansion mirror how the catalogs key
//! their entries: ontology IRIs may appear with or without a trailing slash,
//! with `http` or `https`, and classes are matched case-insensitively on
//! their local name.

pub const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const RDFS_NS: &str = "http://www.w3.org/2000/01/rdf-schema#";
pub const OWL_NS: &str = "http://www.w3.org/2002/07/owl#";
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema#";
pub const SH_NS: &str = "http://www.w3.org/ns/shacl#";
pub const SKOS_NS: &str = "http://www.w3.org/2004/02/skos/core#";

/// Namespaces whose types never participate in type-to-domain discovery.
const WELL_KNOWN_NAMESPACES: &[&str] = &[RDF_NS, RDFS_NS, OWL_NS, XSD_NS, SH_NS, SKOS_NS];

/// Scheme marking an off-graph identity resolved through the fixture catalog.
const EXTERNAL_REF_SCHEME: &str = "did:";

/// Extract the local name of an IRI (the segment after the last `#` or `/`).
pub fn local_name(iri: &str) -> &str {
    let trimmed = iri.trim_end_matches(['#', '/']);
    match trimmed.rfind(['#', '/']) {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Lowercased local name, used for case-insensitive class comparison.
pub fn local_name_lower(iri: &str) -> String {
    local_name(iri).to_ascii_lowercase()
}

/// Whether a type IRI belongs to a well-known W3C vocabulary and is
/// therefore exempt from catalog-backed schema discovery.
pub fn is_well_known_type(iri: &str) -> bool {
    WELL_KNOWN_NAMESPACES.iter().any(|ns| iri.starts_with(ns))
}

/// Whether an IRI denotes an external reference that must be resolved
/// through the fixture catalog rather than dereferenced.
pub fn is_external_reference(iri: &str) -> bool {
    iri.starts_with(EXTERNAL_REF_SCHEME)
}

/// Expand an IRI into the lookup variants the catalogs may be keyed by:
/// the IRI itself, its http/https twin, and both with the trailing slash
/// toggled.
pub fn iri_variants(iri: &str) -> Vec<String> {
    let mut schemes = vec![iri.to_string()];
    if let Some(rest) = iri.strip_prefix("http://") {
        schemes.push(format!("https://{rest}"));
    } else if let Some(rest) = iri.strip_prefix("https://") {
        schemes.push(format!("http://{rest}"));
    }

    let mut variants = Vec::with_capacity(schemes.len() * 2);
    for s in schemes {
        if let Some(stripped) = s.strip_suffix('/') {
            variants.push(stripped.to_string());
        } else {
            variants.push(format!("{s}/"));
        }
        variants.push(s);
    }
    variants
}

/// Whether `iri` falls under `base` (equal, or extends it past a `/` or `#`).
pub fn iri_under_base(iri: &str, base: &str) -> bool {
    for candidate in iri_variants(base) {
        if iri == candidate {
            return true;
        }
        let root = candidate.trim_end_matches(['#', '/']);
        if iri.starts_with(&format!("{root}/")) || iri.starts_with(&format!("{root}#")) {
            return true;
        }
    }
    false
}
