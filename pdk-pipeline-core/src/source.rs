//! Source binding: validates the repository configuration into a
//! [`RepositoryReference`] and binds it to the active branch.
//!
//! Only a hosted repository on the default branch is provisioned. Feature
//! branches look the repository up by name, and connections never create anything.

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::branch::BranchDescriptor;
use crate::construct::{App, RemovalPolicy, Resource, ResourceProperties};
use crate::error::ConfigurationError;

pub const CODE_REPOSITORY_ID: &str = "CodeRepository";

/// Raw repository configuration as it appears in the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryOptions {
    #[serde(default)]
    pub repository_name: Option<String>,
    #[serde(default)]
    pub codestar_connection_arn: Option<String>,
    #[serde(default)]
    pub repository_owner_and_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedRepoRef {
    pub repository_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRef {
    pub connection_arn: String,
    /// `owner/name` of the externally hosted repository.
    pub owner_and_name: String,
}

/// Exactly one way of reaching the pipeline's repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryReference {
    Hosted(HostedRepoRef),
    Connection(ConnectionRef),
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl TryFrom<&RepositoryOptions> for RepositoryReference {
    type Error = ConfigurationError;

    fn try_from(options: &RepositoryOptions) -> Result<Self, Self::Error> {
        if let Some(connection_arn) = present(&options.codestar_connection_arn) {
            let Some(owner_and_name) = present(&options.repository_owner_and_name) else {
                error!(connection_arn, "Connection configured without owner/name");
                return Err(ConfigurationError::MissingOwnerAndName);
            };
            return Ok(RepositoryReference::Connection(ConnectionRef {
                connection_arn: connection_arn.to_string(),
                owner_and_name: owner_and_name.to_string(),
            }));
        }
        match present(&options.repository_name) {
            Some(name) => Ok(RepositoryReference::Hosted(HostedRepoRef {
                repository_name: name.to_string(),
            })),
            None => {
                error!("Neither a repository name nor a connection was configured");
                Err(ConfigurationError::MissingRepository)
            }
        }
    }
}

/// Where a [`SourceHandle`] fetches from, and whether binding provisioned it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceOrigin {
    ProvisionedRepository {
        repository_name: String,
        logical_id: String,
    },
    ExistingRepository {
        repository_name: String,
    },
    Connection {
        connection_arn: String,
        owner_and_name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceHandle {
    pub origin: SourceOrigin,
    pub branch: String,
}

impl SourceHandle {
    /// Logical id of the repository this binding created, if any.
    pub fn provisioned_repository(&self) -> Option<&str> {
        match &self.origin {
            SourceOrigin::ProvisionedRepository { logical_id, .. } => Some(logical_id),
            _ => None,
        }
    }

    /// Short form used by build projects, e.g. `codecommit:Demo@mainline`.
    pub fn describe(&self) -> String {
        match &self.origin {
            SourceOrigin::ProvisionedRepository {
                repository_name, ..
            }
            | SourceOrigin::ExistingRepository { repository_name } => {
                format!("codecommit:{}@{}", repository_name, self.branch)
            }
            SourceOrigin::Connection { owner_and_name, .. } => {
                format!("connection:{}@{}", owner_and_name, self.branch)
            }
        }
    }
}

/// Binds `reference` to `branch`, provisioning the repository only for a hosted
/// reference on the default branch.
pub fn bind(
    app: &mut App,
    reference: &RepositoryReference,
    branch: &BranchDescriptor,
    removal_policy: RemovalPolicy,
) -> SourceHandle {
    let origin = match reference {
        RepositoryReference::Hosted(hosted) if branch.is_default => {
            let logical_id = app.add_resource(Resource::new(
                CODE_REPOSITORY_ID,
                ResourceProperties::Repository {
                    repository_name: hosted.repository_name.clone(),
                    removal_policy,
                },
            ));
            app.add_output(
                "CodeRepositoryGRCUrl",
                format!("codecommit::${{AWS::Region}}://{}", hosted.repository_name),
            );
            info!(
                repository = %hosted.repository_name,
                ?removal_policy,
                "Provisioned code repository"
            );
            SourceOrigin::ProvisionedRepository {
                repository_name: hosted.repository_name.clone(),
                logical_id,
            }
        }
        RepositoryReference::Hosted(hosted) => {
            info!(repository = %hosted.repository_name, "Using existing code repository");
            SourceOrigin::ExistingRepository {
                repository_name: hosted.repository_name.clone(),
            }
        }
        RepositoryReference::Connection(connection) => {
            info!(
                owner_and_name = %connection.owner_and_name,
                "Binding source through external connection"
            );
            SourceOrigin::Connection {
                connection_arn: connection.connection_arn.clone(),
                owner_and_name: connection.owner_and_name.clone(),
            }
        }
    };

    SourceHandle {
        origin,
        branch: branch.raw_name.clone(),
    }
}
