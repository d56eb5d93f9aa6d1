//! Branch resolution: turns the `BRANCH` signal (read once by the caller) into a
//! [`BranchDescriptor`].

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

/// Default branch used when neither the environment nor the config names one.
pub const DEFAULT_BRANCH_NAME: &str = "mainline";

/// The active branch for one assembly pass. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchDescriptor {
    pub raw_name: String,
    pub normalized_name: String,
    pub is_default: bool,
}

impl BranchDescriptor {
    /// Suffix for per-branch resource names; `None` on the default branch.
    pub fn resource_suffix(&self) -> Option<&str> {
        if self.is_default {
            None
        } else {
            Some(&self.normalized_name)
        }
    }
}

fn disallowed_chars() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^A-Za-z0-9-]").expect("static branch pattern is valid"))
}

/// Replaces every character outside `[A-Za-z0-9-]` with `-`.
///
/// One character in, one character out: `feature/foo_1` becomes `feature-foo-1`.
pub fn normalize_branch_name(raw: &str) -> String {
    disallowed_chars().replace_all(raw, "-").into_owned()
}

/// Resolves the active branch.
///
/// An absent (or empty) `env_branch` always means the default branch, whatever
/// `configured_default` says.
pub fn resolve(env_branch: Option<&str>, configured_default: Option<&str>) -> BranchDescriptor {
    let default_name = configured_default
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_BRANCH_NAME);

    let descriptor = match env_branch.filter(|name| !name.is_empty()) {
        None => BranchDescriptor {
            raw_name: default_name.to_string(),
            normalized_name: default_name.to_string(),
            is_default: true,
        },
        Some(branch) => BranchDescriptor {
            raw_name: branch.to_string(),
            normalized_name: normalize_branch_name(branch),
            is_default: branch == default_name,
        },
    };

    info!(
        branch = %descriptor.raw_name,
        normalized = %descriptor.normalized_name,
        is_default = descriptor.is_default,
        "Resolved active branch"
    );
    debug!(default_name, "Default branch name in effect");
    descriptor
}
