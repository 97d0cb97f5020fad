use clap::Parser;
use ontovalidate::{init_logging, run_suite, CliArgs, SuiteConfig};

fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = CliArgs::parse();
    let config = SuiteConfig::from_args(cli)?;
    config.ensure_root()?;

    let code = run_suite(config)?;
    std::process::exit(code);
}
