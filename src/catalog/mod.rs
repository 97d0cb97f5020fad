//! Catalog loading and identifier resolution.

pub mod model;
pub mod resolver;

pub use model::{CatalogEntry, CatalogModel, CatalogProvenance, EntryKind, TestKind};
pub use resolver::{
    CatalogResolver, Collision, Domain, SchemaSet, TEMP_DOMAIN_PREFIX, TestDataFile,
};
