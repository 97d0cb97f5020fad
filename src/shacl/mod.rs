//! SHACL shape discovery and constraint checking.

pub mod engine;
pub mod shapes;

pub use engine::{BuiltinEngine, ShaclEngine, ShaclReport, ShapeOutcome};
pub use shapes::{NodeKind, NodeShape, PropertyShape, Severity, ShapeDiscovery};
