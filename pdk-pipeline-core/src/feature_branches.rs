//! Feature-branch fan-out: one build trigger per configured branch prefix.
//!
//! Only invoked from the default branch's pipeline. Each trigger is an
//! independent, statically provisioned build project; concurrent branch builds
//! are left entirely to the external build system.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::info;

use crate::construct::{
    App, BranchFilter, BuildProjectProps, BuildSpec, PolicyStatement, Resource, ResourceProperties,
};
use crate::source::SourceHandle;

/// Prefix list matching every branch.
pub const ALL_BRANCHES: &[&str] = &[""];

pub const DEFAULT_CDK_COMMAND: &str = "npx cdk";

/// Resolves the branch checked out by the build at execution time.
pub const RESOLVE_BRANCH_COMMAND: &str = "export BRANCH=$(git rev-parse --abbrev-ref HEAD)";

pub const ASSUME_ROLE_ACTION: &str = "sts:AssumeRole";

/// Namespaces a feature pipeline may need to create resources in. Granted with
/// a `*` action on every resource, as the resources only exist per branch.
pub const RESOURCE_NAMESPACES: &[&str] = &[
    "cloudformation",
    "ssm",
    "ecr",
    "s3",
    "iam",
    "kms",
    "codebuild",
    "codepipeline",
    "codecommit",
    "lambda",
    "logs",
    "events",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureTrigger {
    pub logical_id: String,
    pub prefix: String,
    pub permissions: BTreeSet<String>,
}

impl FeatureTrigger {
    /// Prefix match; the empty prefix matches every branch.
    pub fn matches(&self, branch: &str) -> bool {
        branch.starts_with(&self.prefix)
    }
}

pub struct FeatureBranchesProps<'a> {
    pub source: &'a SourceHandle,
    pub install_commands: &'a [String],
    pub build_commands: &'a [String],
    pub cdk_src_dir: Option<&'a str>,
    pub cdk_command: Option<&'a str>,
}

fn feature_policy() -> Vec<PolicyStatement> {
    vec![
        PolicyStatement::on_all_resources([ASSUME_ROLE_ACTION]),
        PolicyStatement::on_all_resources(RESOURCE_NAMESPACES.iter().map(|ns| format!("{ns}:*"))),
    ]
}

fn deploy_commands(props: &FeatureBranchesProps<'_>) -> Vec<String> {
    // BRANCH is exported before any build command runs.
    let mut commands = Vec::with_capacity(props.build_commands.len() + 3);
    commands.push(RESOLVE_BRANCH_COMMAND.to_string());
    commands.extend(props.build_commands.iter().cloned());
    if let Some(dir) = props.cdk_src_dir {
        commands.push(format!("cd {dir}"));
    }
    commands.push(format!(
        "{} deploy --all --require-approval never",
        props.cdk_command.unwrap_or(DEFAULT_CDK_COMMAND)
    ));
    commands
}

/// Provisions one trigger per prefix, in the given order.
///
/// Prefixes are neither sorted nor deduplicated: a repeated prefix yields a
/// second trigger.
pub fn fan_out(app: &mut App, prefixes: &[String], props: &FeatureBranchesProps<'_>) -> Vec<FeatureTrigger> {
    let policy = feature_policy();
    let permissions: BTreeSet<String> = policy
        .iter()
        .flat_map(|statement| statement.actions.iter().cloned())
        .collect();
    let build_spec = BuildSpec::new(props.install_commands.to_vec(), deploy_commands(props));

    prefixes
        .iter()
        .enumerate()
        .map(|(index, prefix)| {
            let logical_id = app.add_resource(Resource::new(
                format!("FeatureBranchTrigger{index}"),
                ResourceProperties::BuildProject(BuildProjectProps {
                    description: "Build project to deploy feature branch pipelines".to_string(),
                    source: props.source.describe(),
                    build_spec: build_spec.clone(),
                    branch_filter: Some(BranchFilter {
                        prefix: prefix.clone(),
                    }),
                    policy_statements: policy.clone(),
                }),
            ));
            info!(logical_id = %logical_id, prefix = %prefix, "Provisioned feature branch trigger");
            FeatureTrigger {
                logical_id,
                prefix: prefix.clone(),
                permissions: permissions.clone(),
            }
        })
        .collect()
}
