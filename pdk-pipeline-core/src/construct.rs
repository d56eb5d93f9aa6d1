//! # construct: the in-memory construct tree
//!
//! The [`App`] is the root every component writes into. A "provisioned"
//! resource is only a [`Resource`] description appended here; the tree is later
//! serialised with [`App::to_yaml`] and handed to an external orchestrator.
//!
//! ## Ordering
//! Resources, outputs and suppression entries keep insertion order. Context
//! flags and tag maps are sorted, so identical assembly passes always produce
//! byte-identical output.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::pipeline::{PipelineResource, SonarCodeScannerProps};
use crate::suppressions::Suppression;

/// What happens to a resource when its stack is torn down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalPolicy {
    #[default]
    Retain,
    Destroy,
    Snapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketEncryption {
    S3Managed,
    Kms,
}

/// A cross-cutting policy check registered on the root (e.g. a compliance rule pack).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Aspect {
    pub name: String,
}

impl Aspect {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyStatement {
    pub actions: Vec<String>,
    pub resources: Vec<String>,
}

impl PolicyStatement {
    /// A statement granting `actions` on every resource.
    pub fn on_all_resources<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            actions: actions.into_iter().map(Into::into).collect(),
            resources: vec!["*".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketProps {
    pub encryption: BucketEncryption,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<String>,
    pub enforce_ssl: bool,
    pub block_public_access: bool,
    pub versioned: bool,
    pub auto_delete_objects: bool,
    pub removal_policy: RemovalPolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_access_logs_bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_access_logs_prefix: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildPhase {
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildPhases {
    pub install: BuildPhase,
    pub build: BuildPhase,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildSpec {
    pub version: String,
    pub phases: BuildPhases,
}

impl BuildSpec {
    pub fn new(install: Vec<String>, build: Vec<String>) -> Self {
        Self {
            version: "0.2".to_string(),
            phases: BuildPhases {
                install: BuildPhase { commands: install },
                build: BuildPhase { commands: build },
            },
        }
    }
}

/// Branch filter for a build project started by repository branch events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchFilter {
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildProjectProps {
    pub description: String,
    pub source: String,
    pub build_spec: BuildSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_filter: Option<BranchFilter>,
    pub policy_statements: Vec<PolicyStatement>,
}

/// Resource properties, keyed by resource type in the serialised tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ResourceProperties {
    #[serde(rename = "AWS::CodeCommit::Repository")]
    Repository {
        repository_name: String,
        removal_policy: RemovalPolicy,
    },
    #[serde(rename = "AWS::S3::Bucket")]
    Bucket(BucketProps),
    #[serde(rename = "AWS::KMS::Key")]
    Key {
        enable_key_rotation: bool,
        removal_policy: RemovalPolicy,
    },
    #[serde(rename = "AWS::CodePipeline::Pipeline")]
    Pipeline(PipelineResource),
    #[serde(rename = "AWS::CodeBuild::Project")]
    BuildProject(BuildProjectProps),
    #[serde(rename = "PDK::SonarCodeScanner")]
    CodeScanner(SonarCodeScannerProps),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    pub logical_id: String,
    #[serde(flatten)]
    pub properties: ResourceProperties,
}

impl Resource {
    pub fn new(logical_id: impl Into<String>, properties: ResourceProperties) -> Self {
        Self {
            logical_id: logical_id.into(),
            properties,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Output {
    pub id: String,
    pub value: String,
}

/// One suppressed compliance finding, attached to a construct path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuppressionEntry {
    pub path: String,
    pub rule_id: String,
    pub reason: String,
}

/// Root of the construct tree.
#[derive(Debug, Default, Serialize)]
pub struct App {
    context: BTreeMap<String, String>,
    aspects: Vec<Aspect>,
    resources: Vec<Resource>,
    outputs: Vec<Output>,
    suppressions: Vec<SuppressionEntry>,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_aspect(&mut self, aspect: Aspect) {
        debug!(aspect = %aspect.name, "Registered root aspect");
        self.aspects.push(aspect);
    }

    pub fn aspects(&self) -> &[Aspect] {
        &self.aspects
    }

    pub fn set_context(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.context.insert(key.into(), value.into());
    }

    pub fn context(&self, key: &str) -> Option<&str> {
        self.context.get(key).map(String::as_str)
    }

    /// Appends a resource and returns its logical id.
    pub fn add_resource(&mut self, resource: Resource) -> String {
        let logical_id = resource.logical_id.clone();
        debug!(logical_id = %logical_id, "Added resource to construct tree");
        self.resources.push(resource);
        logical_id
    }

    /// First resource with the given logical id.
    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.logical_id == logical_id)
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn add_output(&mut self, id: impl Into<String>, value: impl Into<String>) {
        self.outputs.push(Output {
            id: id.into(),
            value: value.into(),
        });
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    /// Records one entry per rule id of every suppression, under `path`.
    /// Returns the number of entries added.
    pub fn suppress(&mut self, path: &str, suppressions: &[Suppression]) -> usize {
        let before = self.suppressions.len();
        for suppression in suppressions {
            for rule_id in suppression.rule_ids {
                self.suppressions.push(SuppressionEntry {
                    path: path.to_string(),
                    rule_id: (*rule_id).to_string(),
                    reason: suppression.reason.to_string(),
                });
            }
        }
        self.suppressions.len() - before
    }

    pub fn suppressions(&self) -> &[SuppressionEntry] {
        &self.suppressions
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
