//! Branch-aware pipeline assembly.
//!
//! [`PdkPipeline`] wires the pieces together in a fixed order:
//!   - validate the repository configuration (nothing is added to the tree on failure)
//!   - bind the source to the active branch
//!   - add the access-log bucket, the optional artifact key and the artifact bucket
//!   - define the synth step
//!   - fan out feature-branch triggers when on the default branch
//!
//! Stages are then attached with [`PdkPipeline::add_stage`] and the pipeline is
//! finalised with [`PdkPipeline::build`].
//!
//! # Side effects
//! Every mutation is returned as data: [`StageBinding`] carries the tags and
//! aspects applied to a stage, [`BuildReport`] lists what `build` added.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::branch::BranchDescriptor;
use crate::construct::{
    App, Aspect, BucketEncryption, BucketProps, RemovalPolicy, Resource, ResourceProperties,
};
use crate::contract::PipelineBackend;
use crate::error::ConfigurationError;
use crate::feature_branches::{self, FeatureBranchesProps, FeatureTrigger};
use crate::source::{self, RepositoryOptions, RepositoryReference, SourceHandle};
use crate::suppressions::PIPELINE_SUPPRESSIONS;

pub const ACCESS_LOGS_BUCKET_ID: &str = "AccessLogsBucket";
pub const ARTIFACTS_BUCKET_ID: &str = "ArtifactsBucket";
pub const ARTIFACT_KEY_ID: &str = "ArtifactKey";
pub const CODE_SCANNER_ID: &str = "SonarCodeScanner";

pub const FEATURE_BRANCH_TAG: &str = "FeatureBranch";
pub const REPO_NAME_TAG: &str = "RepoName";

const ACCESS_LOGS_CONTEXT_KEY: &str = "@aws-cdk/aws-s3:serverAccessLogsUseBucketPolicy";

pub const DEFAULT_INSTALL_COMMANDS: &[&str] = &["npm install -g aws-cdk pnpm", "npx projen install"];
pub const DEFAULT_SYNTH_COMMANDS: &[&str] = &["npx projen build"];

/// Overrides for the synth step. Empty lists fall back to the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthStepOptions {
    #[serde(default)]
    pub install_commands: Option<Vec<String>>,
    #[serde(default)]
    pub commands: Option<Vec<String>>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Settings for the optional code-quality scan run after the pipeline is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SonarCodeScannerConfig {
    pub sonarqube_endpoint: String,
    pub sonarqube_project_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sonarqube_authorized_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sonarqube_default_profile_or_gate_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sonarqube_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_archive_commands: Vec<String>,
}

/// Construction-time parameters for [`PdkPipeline`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdkPipelineProps {
    #[serde(flatten)]
    pub repository: RepositoryOptions,
    #[serde(default)]
    pub default_branch_name: Option<String>,
    /// Branch prefixes that get their own feature pipeline. `[""]` matches every branch.
    #[serde(default)]
    pub branch_name_prefixes: Option<Vec<String>>,
    #[serde(default)]
    pub code_commit_removal_policy: Option<RemovalPolicy>,
    #[serde(default)]
    pub cross_account_keys: bool,
    pub primary_synth_directory: String,
    #[serde(default)]
    pub cdk_src_dir: Option<String>,
    #[serde(default)]
    pub cdk_command: Option<String>,
    #[serde(default)]
    pub synth: SynthStepOptions,
    #[serde(default)]
    pub sonar_code_scanner: Option<SonarCodeScannerConfig>,
}

impl PdkPipelineProps {
    fn prefixes(&self) -> &[String] {
        self.branch_name_prefixes.as_deref().unwrap_or_default()
    }
}

/// A deployable unit attached to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl Stage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            account: None,
            region: None,
        }
    }
}

/// Shell steps run around a stage's deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddStageOptions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post: Vec<String>,
}

/// A stage together with everything `add_stage` applied to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageBinding {
    #[serde(flatten)]
    pub stage: Stage,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub branch_tags: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aspects: Vec<Aspect>,
}

/// What the backend reports for an attached stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageDeployment {
    pub stage_name: String,
    /// Zero-based attachment order.
    pub position: usize,
    pub pre_steps: usize,
    pub post_steps: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShellStep {
    pub name: String,
    pub input: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    pub install_commands: Vec<String>,
    pub commands: Vec<String>,
    pub primary_output_directory: String,
}

/// Everything the backend needs to finalise the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineDefinition {
    pub pipeline_name: String,
    pub artifact_bucket: String,
    pub cross_account_keys: bool,
    pub source: SourceHandle,
    pub synth: ShellStep,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachedStage {
    #[serde(flatten)]
    pub binding: StageBinding,
    #[serde(flatten)]
    pub options: AddStageOptions,
}

/// Serialised form of a finalised pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineResource {
    #[serde(flatten)]
    pub definition: PipelineDefinition,
    pub restart_execution_on_update: bool,
    pub stages: Vec<AttachedStage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SonarCodeScannerProps {
    #[serde(flatten)]
    pub config: SonarCodeScannerConfig,
    pub artifact_bucket: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_bucket_key: Option<String>,
    pub synth_build: String,
    pub cdk_out_dir: String,
}

/// What [`PdkPipeline::build`] added to the construct tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub pipeline: String,
    pub code_scanner: Option<String>,
    pub suppressions_applied: usize,
}

/// Default backend: keeps attached stages in order and emits them on build.
#[derive(Debug, Default)]
pub struct CodePipeline {
    stages: Vec<AttachedStage>,
}

impl PipelineBackend for CodePipeline {
    fn add_stage(&mut self, binding: StageBinding, options: AddStageOptions) -> StageDeployment {
        let deployment = StageDeployment {
            stage_name: binding.stage.name.clone(),
            position: self.stages.len(),
            pre_steps: options.pre.len(),
            post_steps: options.post.len(),
        };
        self.stages.push(AttachedStage { binding, options });
        deployment
    }

    fn build_pipeline(&mut self, definition: &PipelineDefinition) -> PipelineResource {
        PipelineResource {
            definition: definition.clone(),
            restart_execution_on_update: true,
            stages: self.stages.clone(),
        }
    }
}

/// Tags for a stage attached on `branch`.
///
/// Empty on the default branch or when fan-out is disabled; otherwise
/// `FeatureBranch=<raw branch>` plus `RepoName=<name>` when a repository name is known.
pub fn branch_tags(
    branch: &BranchDescriptor,
    fan_out_enabled: bool,
    repository_name: Option<&str>,
) -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();
    if !fan_out_enabled || branch.is_default {
        return tags;
    }
    tags.insert(FEATURE_BRANCH_TAG.to_string(), branch.raw_name.clone());
    if let Some(name) = repository_name {
        tags.insert(REPO_NAME_TAG.to_string(), name.to_string());
    }
    tags
}

fn commands_or_default(commands: &Option<Vec<String>>, defaults: &[&str]) -> Vec<String> {
    match commands {
        Some(commands) if !commands.is_empty() => commands.clone(),
        _ => defaults.iter().map(|c| (*c).to_string()).collect(),
    }
}

pub struct PdkPipeline<B = CodePipeline> {
    id: String,
    branch: BranchDescriptor,
    repository_name: Option<String>,
    fan_out_enabled: bool,
    definition: PipelineDefinition,
    artifact_key: Option<String>,
    primary_synth_directory: String,
    sonar_code_scanner: Option<SonarCodeScannerConfig>,
    feature_triggers: Vec<FeatureTrigger>,
    backend: B,
}

impl PdkPipeline<CodePipeline> {
    pub fn new(
        app: &mut App,
        id: &str,
        props: &PdkPipelineProps,
        branch: BranchDescriptor,
    ) -> Result<Self, ConfigurationError> {
        Self::with_backend(app, id, props, branch, CodePipeline::default())
    }
}

impl<B: PipelineBackend> PdkPipeline<B> {
    /// Assembles the pipeline on top of a specific backend.
    ///
    /// Fails before touching `app` when the repository configuration is invalid.
    pub fn with_backend(
        app: &mut App,
        id: &str,
        props: &PdkPipelineProps,
        branch: BranchDescriptor,
        backend: B,
    ) -> Result<Self, ConfigurationError> {
        let reference = RepositoryReference::try_from(&props.repository)?;
        let fan_out_enabled = !props.prefixes().is_empty();

        info!(
            pipeline = id,
            branch = %branch.raw_name,
            is_default = branch.is_default,
            fan_out_enabled,
            "Assembling pipeline"
        );

        app.set_context(ACCESS_LOGS_CONTEXT_KEY, "true");

        let source = source::bind(
            app,
            &reference,
            &branch,
            props.code_commit_removal_policy.unwrap_or_default(),
        );

        let access_logs_bucket = app.add_resource(Resource::new(
            ACCESS_LOGS_BUCKET_ID,
            ResourceProperties::Bucket(BucketProps {
                encryption: BucketEncryption::S3Managed,
                encryption_key: None,
                enforce_ssl: true,
                block_public_access: true,
                versioned: false,
                auto_delete_objects: true,
                removal_policy: RemovalPolicy::Destroy,
                server_access_logs_bucket: None,
                server_access_logs_prefix: None,
            }),
        ));

        let artifact_key = props.cross_account_keys.then(|| {
            app.add_resource(Resource::new(
                ARTIFACT_KEY_ID,
                ResourceProperties::Key {
                    enable_key_rotation: true,
                    removal_policy: RemovalPolicy::Destroy,
                },
            ))
        });

        let artifact_bucket = app.add_resource(Resource::new(
            ARTIFACTS_BUCKET_ID,
            ResourceProperties::Bucket(BucketProps {
                encryption: if artifact_key.is_some() {
                    BucketEncryption::Kms
                } else {
                    BucketEncryption::S3Managed
                },
                encryption_key: artifact_key.clone(),
                enforce_ssl: true,
                block_public_access: true,
                versioned: false,
                auto_delete_objects: true,
                removal_policy: RemovalPolicy::Destroy,
                server_access_logs_bucket: Some(access_logs_bucket),
                server_access_logs_prefix: Some("access-logs".to_string()),
            }),
        ));
        debug!(artifact_bucket = %artifact_bucket, kms = artifact_key.is_some(), "Artifact storage added");

        let mut env = props.synth.env.clone();
        if fan_out_enabled {
            env.insert("BRANCH".to_string(), branch.raw_name.clone());
        }
        let synth = ShellStep {
            name: "Synth".to_string(),
            input: source.describe(),
            env,
            install_commands: commands_or_default(
                &props.synth.install_commands,
                DEFAULT_INSTALL_COMMANDS,
            ),
            commands: commands_or_default(&props.synth.commands, DEFAULT_SYNTH_COMMANDS),
            primary_output_directory: props.primary_synth_directory.clone(),
        };

        let feature_triggers = if fan_out_enabled && branch.is_default {
            feature_branches::fan_out(
                app,
                props.prefixes(),
                &FeatureBranchesProps {
                    source: &source,
                    install_commands: &synth.install_commands,
                    build_commands: &synth.commands,
                    cdk_src_dir: props.cdk_src_dir.as_deref(),
                    cdk_command: props.cdk_command.as_deref(),
                },
            )
        } else {
            Vec::new()
        };

        let pipeline_name = match branch.resource_suffix() {
            Some(suffix) => format!("{id}-{suffix}"),
            None => id.to_string(),
        };

        Ok(Self {
            id: id.to_string(),
            repository_name: props.repository.repository_name.clone().filter(|n| !n.is_empty()),
            fan_out_enabled,
            definition: PipelineDefinition {
                pipeline_name,
                artifact_bucket,
                cross_account_keys: props.cross_account_keys,
                source,
                synth,
            },
            artifact_key,
            primary_synth_directory: props.primary_synth_directory.clone(),
            sonar_code_scanner: props.sonar_code_scanner.clone(),
            feature_triggers,
            branch,
            backend,
        })
    }

    /// Tags the stage for feature branches, copies the root aspects onto it and
    /// hands it to the backend. The backend's result is returned unchanged.
    pub fn add_stage(&mut self, app: &App, stage: Stage, options: AddStageOptions) -> StageDeployment {
        let branch_tags = branch_tags(
            &self.branch,
            self.fan_out_enabled,
            self.repository_name.as_deref(),
        );
        info!(
            stage = %stage.name,
            tags = branch_tags.len(),
            aspects = app.aspects().len(),
            "Adding stage to pipeline"
        );
        let binding = StageBinding {
            stage,
            branch_tags,
            aspects: app.aspects().to_vec(),
        };
        self.backend.add_stage(binding, options)
    }

    /// Finalises the pipeline, adds the code scanner if configured and records
    /// the pipeline's known compliance exceptions.
    ///
    /// Meant to be called once per pipeline.
    pub fn build(&mut self, app: &mut App) -> BuildReport {
        let resource = self.backend.build_pipeline(&self.definition);
        let pipeline = app.add_resource(Resource::new(
            self.id.clone(),
            ResourceProperties::Pipeline(resource),
        ));

        let code_scanner = self.sonar_code_scanner.as_ref().map(|config| {
            info!(project = %config.sonarqube_project_name, "Adding code scanner");
            app.add_resource(Resource::new(
                CODE_SCANNER_ID,
                ResourceProperties::CodeScanner(SonarCodeScannerProps {
                    config: config.clone(),
                    artifact_bucket: self.definition.artifact_bucket.clone(),
                    artifact_bucket_key: self.artifact_key.clone(),
                    synth_build: format!("{}/{}", self.id, self.definition.synth.name),
                    cdk_out_dir: self.primary_synth_directory.clone(),
                }),
            ))
        });

        let suppressions_applied = app.suppress(&self.id, PIPELINE_SUPPRESSIONS);
        info!(
            pipeline = %pipeline,
            scanner = code_scanner.is_some(),
            suppressions_applied,
            "Pipeline built"
        );

        BuildReport {
            pipeline,
            code_scanner,
            suppressions_applied,
        }
    }

    pub fn branch(&self) -> &BranchDescriptor {
        &self.branch
    }

    pub fn source(&self) -> &SourceHandle {
        &self.definition.source
    }

    pub fn definition(&self) -> &PipelineDefinition {
        &self.definition
    }

    pub fn feature_triggers(&self) -> &[FeatureTrigger] {
        &self.feature_triggers
    }

    pub fn fan_out_enabled(&self) -> bool {
        self.fan_out_enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::resolve;

    #[test]
    fn no_tags_on_default_branch() {
        let branch = resolve(None, Some("main"));
        assert!(branch_tags(&branch, true, Some("Demo")).is_empty());
    }

    #[test]
    fn no_tags_without_fan_out() {
        let branch = resolve(Some("feature/x"), None);
        assert!(branch_tags(&branch, false, Some("Demo")).is_empty());
    }

    #[test]
    fn repo_name_tag_only_when_known() {
        let branch = resolve(Some("feature/x"), None);
        let tags = branch_tags(&branch, true, None);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags.get(FEATURE_BRANCH_TAG).map(String::as_str), Some("feature/x"));
    }

    #[test]
    fn overrides_replace_defaults_only_when_non_empty() {
        assert_eq!(
            commands_or_default(&Some(vec![]), DEFAULT_SYNTH_COMMANDS),
            vec!["npx projen build".to_string()]
        );
        assert_eq!(
            commands_or_default(&Some(vec!["make".to_string()]), DEFAULT_SYNTH_COMMANDS),
            vec!["make".to_string()]
        );
    }
}
