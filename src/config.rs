use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::graph::{InferenceMode, DEFAULT_MAX_DEPTH};

/// Which stage(s) to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckKind {
    #[default]
    All,
    CheckSyntax,
    CheckArtifactCoherence,
    CheckDataConformance,
    CheckFailingTests,
}

impl std::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CheckKind::All => "all",
            CheckKind::CheckSyntax => "check-syntax",
            CheckKind::CheckArtifactCoherence => "check-artifact-coherence",
            CheckKind::CheckDataConformance => "check-data-conformance",
            CheckKind::CheckFailingTests => "check-failing-tests",
        };
        f.write_str(name)
    }
}

/// Fully resolved run configuration.
#[derive(Debug, Clone)]
pub struct SuiteConfig {
    pub root: PathBuf,
    pub run: CheckKind,
    /// Empty means every cataloged domain
    pub domains: Vec<String>,
    /// Non-empty switches to data-paths mode
    pub data_paths: Vec<PathBuf>,
    /// Extra artifact directories registered ahead of the built-in catalogs
    pub artifact_dirs: Vec<PathBuf>,
    pub inference_mode: InferenceMode,
    pub strict: bool,
    pub max_fixture_depth: usize,
}

impl SuiteConfig {
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let CliArgs {
            config,
            root: cli_root,
            run: cli_run,
            domain: cli_domains,
            data_paths: cli_data_paths,
            artifacts: cli_artifacts,
            inference_mode: cli_inference_mode,
            strict: cli_strict,
            max_fixture_depth: cli_max_fixture_depth,
        } = args;

        let file_config = if let Some(path) = config.as_ref() {
            load_config_file(path)?
        } else {
            PartialConfig::default()
        };

        let PartialConfig {
            root: file_root,
            run: file_run,
            domains: file_domains,
            data_paths: file_data_paths,
            artifacts: file_artifacts,
            inference_mode: file_inference_mode,
            strict: file_strict,
            max_fixture_depth: file_max_fixture_depth,
        } = file_config;

        let root = cli_root
            .or(file_root)
            .unwrap_or_else(|| PathBuf::from("."));

        let domains = non_empty(cli_domains)
            .or(file_domains)
            .unwrap_or_default();
        let data_paths = non_empty(cli_data_paths)
            .or(file_data_paths)
            .unwrap_or_default();
        let artifact_dirs = non_empty(cli_artifacts)
            .or(file_artifacts)
            .unwrap_or_default();

        anyhow::ensure!(
            data_paths.is_empty() || domains.is_empty(),
            "--data-paths and --domain are mutually exclusive"
        );

        let run = cli_run.or(file_run).unwrap_or_default();
        if !data_paths.is_empty()
            && matches!(
                run,
                CheckKind::CheckArtifactCoherence | CheckKind::CheckFailingTests
            )
        {
            anyhow::bail!("{run} requires a cataloged repository, not --data-paths");
        }

        let max_fixture_depth = cli_max_fixture_depth
            .or(file_max_fixture_depth)
            .unwrap_or(DEFAULT_MAX_DEPTH)
            .max(1);

        Ok(Self {
            root,
            run,
            domains,
            data_paths,
            artifact_dirs,
            inference_mode: cli_inference_mode
                .or(file_inference_mode)
                .unwrap_or_default(),
            strict: cli_strict || file_strict.unwrap_or(false),
            max_fixture_depth,
        })
    }

    pub fn ensure_root(&self) -> Result<()> {
        if self.data_paths.is_empty() {
            anyhow::ensure!(
                self.root.is_dir(),
                "repository root {:?} is not a directory",
                self.root
            );
        }
        Ok(())
    }
}

fn non_empty<T>(values: Vec<T>) -> Option<Vec<T>> {
    if values.is_empty() { None } else { Some(values) }
}

#[derive(Parser, Debug, Default, Clone)]
#[command(
    name = "ontovalidate",
    about = "Catalog-driven validation of JSON-LD and Turtle instance data",
    version
)]
pub struct CliArgs {
    #[arg(
        long,
        value_name = "FILE",
        help = "Path to a configuration file (YAML or JSON)",
        global = true
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = "ONTOVALIDATE_ROOT",
        value_name = "DIR",
        help = "Repository root containing the artifacts/, imports/ and tests/ catalogs"
    )]
    pub root: Option<PathBuf>,

    #[arg(
        long,
        env = "ONTOVALIDATE_RUN",
        value_enum,
        help = "Stage to run (default: all)"
    )]
    pub run: Option<CheckKind>,

    #[arg(
        long,
        env = "ONTOVALIDATE_DOMAIN",
        value_name = "NAME",
        value_delimiter = ',',
        help = "Restrict checking to the given domain(s)"
    )]
    pub domain: Vec<String>,

    #[arg(
        long,
        value_name = "PATH",
        num_args = 1..,
        help = "Validate loose files/directories instead of a cataloged repository"
    )]
    pub data_paths: Vec<PathBuf>,

    #[arg(
        long,
        value_name = "DIR",
        num_args = 1..,
        help = "Additional artifact directories laid out as <domain>/<domain>.owl.ttl"
    )]
    pub artifacts: Vec<PathBuf>,

    #[arg(
        long,
        env = "ONTOVALIDATE_INFERENCE_MODE",
        value_enum,
        help = "Entailment applied before SHACL checking (default: rdfs)"
    )]
    pub inference_mode: Option<InferenceMode>,

    #[arg(long, help = "Treat unresolvable remote contexts as errors")]
    pub strict: bool,

    #[arg(
        long,
        env = "ONTOVALIDATE_MAX_FIXTURE_DEPTH",
        value_name = "N",
        help = "Fixture stitching depth bound"
    )]
    pub max_fixture_depth: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialConfig {
    root: Option<PathBuf>,
    run: Option<CheckKind>,
    domains: Option<Vec<String>>,
    data_paths: Option<Vec<PathBuf>>,
    artifacts: Option<Vec<PathBuf>>,
    inference_mode: Option<InferenceMode>,
    strict: Option<bool>,
    max_fixture_depth: Option<usize>,
}

fn load_config_file(path: &Path) -> Result<PartialConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading configuration file {}", path.display()))?;
    let parsed = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("parsing JSON configuration {}", path.display()))?,
        _ => serde_yaml::from_str(&content)
            .with_context(|| format!("parsing YAML configuration {}", path.display()))?,
    };
    Ok(parsed)
}
