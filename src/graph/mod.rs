//! Graph assembly, fixture stitching and inference.

pub mod assembler;
pub mod inference;
pub mod stitcher;

pub use assembler::{AssembledGraph, GraphAssembler};
pub use inference::InferenceMode;
pub use stitcher::{DEFAULT_MAX_DEPTH, FixtureStitcher, StitchReport};
