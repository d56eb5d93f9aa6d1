/// `load_config` module: loads a static YAML pipeline config into typed structs.
///
/// This module is the only place where user-supplied YAML is parsed and mapped
/// to the strongly-typed pipeline properties of `pdk-pipeline-core`.
///
/// # Responsibilities
/// - Parse the config file into [`PipelineConfig`]
/// - Apply defaults for optional sections (pipeline id, stages, aspects)
/// - Surface read and parse failures with clear diagnostics
///
/// The loader never reads the process environment: the active branch is
/// passed in separately by the CLI, so the same file yields the same config on
/// every branch.
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
/// Repository validation happens later, at pipeline construction.
use anyhow::Result;
use pdk_pipeline_core::construct::Aspect;
use pdk_pipeline_core::openapi::SampleSpecOptions;
use pdk_pipeline_core::pipeline::{AddStageOptions, PdkPipelineProps, Stage};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const DEFAULT_PIPELINE_ID: &str = "ApplicationPipeline";

fn default_pipeline_id() -> String {
    DEFAULT_PIPELINE_ID.to_string()
}

#[derive(Debug, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_pipeline_id")]
    pub id: String,
    pub pipeline: PdkPipelineProps,
    #[serde(default)]
    pub stages: Vec<StageConfig>,
    /// Policy checks registered on the root and copied onto every stage.
    #[serde(default)]
    pub aspects: Vec<Aspect>,
    #[serde(default)]
    pub sample_api: Option<SampleApiSection>,
}

#[derive(Debug, Deserialize)]
pub struct StageConfig {
    #[serde(flatten)]
    pub stage: Stage,
    #[serde(flatten)]
    pub options: AddStageOptions,
}

#[derive(Debug, Deserialize)]
pub struct SampleApiSection {
    pub path: PathBuf,
    #[serde(flatten)]
    pub options: SampleSpecOptions,
}

/// Loads a static YAML pipeline config file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let config: PipelineConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    info!(
        pipeline = %config.id,
        stages = config.stages.len(),
        aspects = config.aspects.len(),
        sample_api = config.sample_api.is_some(),
        "Config loaded"
    );

    Ok(config)
}
