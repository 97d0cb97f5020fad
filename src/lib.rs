pub mod catalog;
pub mod checks;
pub mod config;
pub mod discovery;
pub mod error;
pub mod graph;
pub mod iri;
pub mod logging;
pub mod report;
pub mod shacl;
pub mod suite;

pub use config::{CheckKind, CliArgs, SuiteConfig};
pub use error::{ReturnCode, SuiteError, SuiteResult};
pub use graph::InferenceMode;
pub use logging::init_logging;
pub use report::{ValidationResult, Violation};
pub use suite::{RunSummary, ValidationOrchestrator};

use anyhow::Result;

/// Run the configured suite and return the process exit code. Stage output
/// is printed to stdout; only the code travels back to the caller.
pub fn run_suite(config: SuiteConfig) -> Result<i32> {
    let orchestrator = ValidationOrchestrator::new(config);
    let summary = orchestrator.run()?;
    for stage in &summary.stages {
        for line in &stage.lines {
            println!("{line}");
        }
        tracing::info!(stage = stage.name, code = %stage.code, "stage finished");
    }
    Ok(summary.code.code())
}
