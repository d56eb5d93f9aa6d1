//! Synthesis: runs one assembly pass for a loaded config and writes the result.
//!
//! The pass is strictly ordered:
//!   - resolve the branch from the value the CLI read out of `BRANCH`
//!   - register root aspects, construct the pipeline, attach stages in config order
//!   - build the pipeline
//!   - write `<pipeline name>.template.yaml` and `manifest.json` into the output dir
//!   - write the sample OpenAPI spec, if configured and not already present
//!
//! A configuration error aborts the pass before anything is written.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pdk_pipeline_core::branch::{resolve, BranchDescriptor};
use pdk_pipeline_core::construct::App;
use pdk_pipeline_core::feature_branches::FeatureTrigger;
use pdk_pipeline_core::openapi::{write_sample_spec, SampleWrite};
use pdk_pipeline_core::pipeline::{BuildReport, PdkPipeline, StageDeployment};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::load_config::PipelineConfig;

pub const MANIFEST_FILE: &str = "manifest.json";
const MANIFEST_VERSION: &str = "1";

#[derive(Debug)]
pub struct SynthReport {
    pub branch: BranchDescriptor,
    pub template: PathBuf,
    pub manifest: PathBuf,
    pub stages: Vec<StageDeployment>,
    pub feature_triggers: Vec<FeatureTrigger>,
    pub build: BuildReport,
    pub sample_api: Option<SampleWrite>,
}

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    version: &'static str,
    pipeline: &'a str,
    branch: &'a BranchDescriptor,
    artifacts: Vec<ManifestArtifact>,
}

#[derive(Debug, Serialize)]
struct ManifestArtifact {
    file: String,
    sha256: String,
}

fn fingerprint(contents: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(contents);
    format!("{:x}", hasher.finalize())
}

/// Assembles the pipeline described by `config` and writes it to `out_dir`.
///
/// `branch_env` is the raw `BRANCH` value; `None` means the default branch.
pub fn synthesise(config: &PipelineConfig, branch_env: Option<&str>, out_dir: &Path) -> Result<SynthReport> {
    let branch = resolve(branch_env, config.pipeline.default_branch_name.as_deref());

    let mut app = App::new();
    for aspect in &config.aspects {
        app.add_aspect(aspect.clone());
    }

    let mut pipeline = PdkPipeline::new(&mut app, &config.id, &config.pipeline, branch.clone())?;

    let stages: Vec<StageDeployment> = config
        .stages
        .iter()
        .map(|stage| pipeline.add_stage(&app, stage.stage.clone(), stage.options.clone()))
        .collect();
    let build = pipeline.build(&mut app);

    let template_yaml = app
        .to_yaml()
        .context("Failed to serialise construct tree")?;

    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory {}", out_dir.display()))?;

    let pipeline_name = &pipeline.definition().pipeline_name;
    let template_file = format!("{pipeline_name}.template.yaml");
    let template = out_dir.join(&template_file);
    fs::write(&template, &template_yaml)
        .with_context(|| format!("Failed to write template {}", template.display()))?;
    info!(path = %template.display(), resources = app.resources().len(), "Wrote template");

    let manifest_doc = Manifest {
        version: MANIFEST_VERSION,
        pipeline: pipeline_name,
        branch: &branch,
        artifacts: vec![ManifestArtifact {
            file: template_file,
            sha256: fingerprint(template_yaml.as_bytes()),
        }],
    };
    let manifest_json =
        serde_json::to_string_pretty(&manifest_doc).context("Failed to serialise manifest")?;
    let manifest = out_dir.join(MANIFEST_FILE);
    fs::write(&manifest, manifest_json)
        .with_context(|| format!("Failed to write manifest {}", manifest.display()))?;
    debug!(path = %manifest.display(), "Wrote manifest");

    let sample_api = match &config.sample_api {
        Some(section) => Some(
            write_sample_spec(&section.path, &section.options)
                .with_context(|| format!("Failed to write sample spec {}", section.path.display()))?,
        ),
        None => None,
    };

    Ok(SynthReport {
        branch,
        template,
        manifest,
        stages,
        feature_triggers: pipeline.feature_triggers().to_vec(),
        build,
        sample_api,
    })
}
