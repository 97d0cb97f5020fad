//! Logging setup.
//!
//! Diagnostics meant for consumers go to stdout through the stage reports;
//! tracing output is operator-facing and goes to stderr so that rendered
//! validation results stay machine-comparable.

use tracing_subscriber::{fmt, EnvFilter};

pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ontovalidate=info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
