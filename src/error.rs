//! Error taxonomy and the process return-code contract.
//!
//! Every failure mode the suite can report maps to a typed [`SuiteError`]
//! variant, and every variant maps to exactly one [`ReturnCode`]. The numeric
//! codes are a stable external contract consumed by CI pipelines and by the
//! `.expected` fixtures of the failing-tests stage.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Process exit codes. The integer values are bit-exact and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ReturnCode {
    /// All selected checks passed
    Success = 0,
    /// Unclassified failure (bad invocation, missing expected-output file, ...)
    GeneralError = 1,
    /// Syntax failure in a format without a more specific code
    SyntaxError = 10,
    /// A required external capability is unavailable
    MissingDependency = 99,
    /// Nothing applicable to check
    Skipped = 100,
    /// Malformed JSON / JSON-LD payload
    JsonSyntaxError = 101,
    /// Malformed Turtle payload
    TurtleSyntaxError = 102,
    /// Artifact coherence could not be established (missing artifacts, ...)
    CoherenceError = 200,
    /// A SHACL target class is not declared by the ontology
    MissingTargetClass = 201,
    /// Data conformance checking failed
    ConformanceError = 210,
    /// A specific SHACL constraint violation
    ShaclViolation = 211,
}

impl ReturnCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Severity rank used for worst-code aggregation. The numeric exit codes
    /// are not ordered by severity (100 means "skipped"), so ranking is
    /// explicit.
    fn rank(self) -> u8 {
        match self {
            ReturnCode::Success => 0,
            ReturnCode::Skipped => 1,
            ReturnCode::SyntaxError => 2,
            ReturnCode::JsonSyntaxError => 3,
            ReturnCode::TurtleSyntaxError => 4,
            ReturnCode::CoherenceError => 5,
            ReturnCode::MissingTargetClass => 6,
            ReturnCode::ConformanceError => 7,
            ReturnCode::ShaclViolation => 8,
            ReturnCode::MissingDependency => 9,
            ReturnCode::GeneralError => 10,
        }
    }

    /// The more severe of two codes.
    pub fn worst(self, other: ReturnCode) -> ReturnCode {
        if other.rank() > self.rank() { other } else { self }
    }

    pub fn is_failure(self) -> bool {
        !matches!(self, ReturnCode::Success | ReturnCode::Skipped)
    }
}

impl std::fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Input format involved in a syntax failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxFormat {
    Json,
    Turtle,
}

/// Typed failure modes of the validation suite.
///
/// Propagation policy: `Syntax` is isolated per file; catalog-resolution
/// errors abort the current domain but not sibling domains; `Catalog` is the
/// only genuinely fatal state. Nothing is retried.
#[derive(Debug, Error)]
pub enum SuiteError {
    #[error("Syntax error in {}: {detail}", path.display())]
    Syntax {
        path: PathBuf,
        format: SyntaxFormat,
        detail: String,
    },

    #[error("no catalog entry for identifier '{identifier}'")]
    UnresolvedCatalogEntry { identifier: String },

    #[error("type '{iri}' does not map to any cataloged domain")]
    UnknownType { iri: String },

    #[error("type '{iri}' maps to multiple domains: {domains:?}")]
    AmbiguousType { iri: String, domains: Vec<String> },

    #[error("external reference '{iri}' has no fixture in any catalog")]
    UnresolvedFixture { iri: String },

    #[error("domain '{domain}' is not present in any artifact catalog")]
    UnknownDomain { domain: String },

    #[error(
        "fixture stitching exceeded depth {max_depth} (cycle suspected), pending: {pending:?}"
    )]
    FixtureCycleExceeded { max_depth: usize, pending: Vec<String> },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("data graph declares no rdf:type; conformance checking cannot proceed ({})", path.display())]
    EmptyTypeSet { path: PathBuf },

    #[error("corrupt catalog file {}: {detail}", path.display())]
    Catalog { path: PathBuf, detail: String },

    #[error("graph store error: {0}")]
    Store(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SuiteError {
    /// The return code this failure surfaces as.
    pub fn return_code(&self) -> ReturnCode {
        match self {
            SuiteError::Syntax { format, .. } => match format {
                SyntaxFormat::Json => ReturnCode::JsonSyntaxError,
                SyntaxFormat::Turtle => ReturnCode::TurtleSyntaxError,
            },
            SuiteError::UnresolvedCatalogEntry { .. }
            | SuiteError::UnknownType { .. }
            | SuiteError::AmbiguousType { .. }
            | SuiteError::UnresolvedFixture { .. }
            | SuiteError::FixtureCycleExceeded { .. }
            | SuiteError::Inference(_) => ReturnCode::ConformanceError,
            SuiteError::EmptyTypeSet { .. }
            | SuiteError::UnknownDomain { .. }
            | SuiteError::Catalog { .. }
            | SuiteError::Store(_)
            | SuiteError::Io(_) => ReturnCode::GeneralError,
        }
    }
}

impl From<oxigraph::store::StorageError> for SuiteError {
    fn from(err: oxigraph::store::StorageError) -> Self {
        SuiteError::Store(err.to_string())
    }
}

pub type SuiteResult<T> = Result<T, SuiteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worst_uses_severity_rank_not_numeric_value() {
        assert_eq!(
            ReturnCode::Skipped.worst(ReturnCode::JsonSyntaxError),
            ReturnCode::JsonSyntaxError
        );
        assert_eq!(
            ReturnCode::ConformanceError.worst(ReturnCode::Skipped),
            ReturnCode::ConformanceError
        );
        assert_eq!(
            ReturnCode::ShaclViolation.worst(ReturnCode::GeneralError),
            ReturnCode::GeneralError
        );
        assert_eq!(
            ReturnCode::Success.worst(ReturnCode::Success),
            ReturnCode::Success
        );
    }

    #[test]
    fn error_codes_match_contract() {
        assert_eq!(ReturnCode::JsonSyntaxError.code(), 101);
        assert_eq!(ReturnCode::TurtleSyntaxError.code(), 102);
        assert_eq!(ReturnCode::MissingTargetClass.code(), 201);
        assert_eq!(ReturnCode::ConformanceError.code(), 210);
        assert_eq!(ReturnCode::ShaclViolation.code(), 211);
        assert_eq!(ReturnCode::MissingDependency.code(), 99);
    }

    #[test]
    fn unresolved_fixture_maps_to_conformance_error() {
        let err = SuiteError::UnresolvedFixture {
            iri: "did:web:example.com:x".into(),
        };
        assert_eq!(err.return_code(), ReturnCode::ConformanceError);
    }
}
