///
/// This module implements the CLI interface for pdk-pipeline: command parsing,
/// the `BRANCH` boundary and user-visible output.
///
/// All pipeline logic (branch resolution, source binding, assembly, fan-out)
/// lives in the [`pdk-pipeline-core`] crate. This module is CLI glue only.
///
/// ## Features
/// - Entry struct [`Cli`] defines the subcommands (`synth`, `sample-api`).
/// - `BRANCH` is read exactly once, by clap, while parsing `synth` arguments.
/// - Programmatic entrypoint [`run`] for integration tests and `main()`.
///
/// [`pdk-pipeline-core`]: ../../pdk_pipeline_core/
use crate::load_config::load_config;
use crate::synth::synthesise;
use anyhow::Result;
use clap::{Parser, Subcommand};
use pdk_pipeline_core::openapi::{write_sample_spec, HandlerLanguage, SampleSpecOptions, SampleWrite};
use std::path::PathBuf;

/// CLI for pdk-pipeline: synthesise branch-aware deployment pipelines.
#[derive(Parser)]
#[clap(
    name = "pdk-pipeline",
    version,
    about = "Synthesise branch-aware deployment pipelines with feature-branch fan-out"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Assemble the pipeline described by the config file and write it out
    Synth {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Directory for the synthesised template and manifest
        #[clap(long, default_value = "cdk.out")]
        out: PathBuf,
        /// Active branch; when absent the default branch is assumed
        #[clap(long, env = "BRANCH")]
        branch: Option<String>,
    },
    /// Write the sample OpenAPI spec unless the file already exists
    SampleApi {
        /// Destination of the spec file
        #[clap(long)]
        path: PathBuf,
        /// Handler language recorded on the sample operation
        #[clap(long)]
        language: Option<HandlerLanguage>,
    },
}

fn run_synth(config: PathBuf, out: PathBuf, branch: Option<String>) -> Result<()> {
    let config = load_config(&config)?;
    tracing::info!(command = "synth", "Starting synthesis");
    let report = synthesise(&config, branch.as_deref(), &out)?;

    println!("Synthesis complete.");
    println!(
        "Branch: {} (default: {})",
        report.branch.raw_name, report.branch.is_default
    );
    println!("Template: {}", report.template.display());
    println!("Stages: {}", report.stages.len());
    println!("Feature branch triggers: {}", report.feature_triggers.len());
    tracing::info!(command = "synth", ?report, "Synthesis complete");
    Ok(())
}

fn run_sample_api(path: PathBuf, language: Option<HandlerLanguage>) -> Result<()> {
    let options = SampleSpecOptions {
        handler_language: language,
    };
    match write_sample_spec(&path, &options)? {
        SampleWrite::Written => println!("Sample spec written to {}", path.display()),
        SampleWrite::Skipped => println!("Sample spec already exists at {}, skipped", path.display()),
    }
    Ok(())
}

/// Extracted CLI logic entrypoint for integration tests and main()
pub fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let result = match cli.command {
        Commands::Synth {
            config,
            out,
            branch,
        } => run_synth(config, out, branch),
        Commands::SampleApi { path, language } => run_sample_api(path, language),
    };

    if let Err(e) = &result {
        eprintln!("[ERROR] {}", e);
        tracing::error!(error = %e, "Command failed");
    }
    result
}
