//! Known false-positive compliance findings on the pipeline, as reviewable data.
//!
//! This is a fixed exception list for the pipeline construct, not a general
//! suppression mechanism.

/// Rule ids (one per rule pack) silenced together with a single justification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Suppression {
    pub rule_ids: &'static [&'static str],
    pub reason: &'static str,
}

pub const PIPELINE_SUPPRESSIONS: &[Suppression] = &[
    Suppression {
        rule_ids: &["AwsSolutions-IAM5", "AwsPrototyping-IAMNoWildcardPermissions"],
        reason: "Wildcards are needed for dynamically created resources.",
    },
    Suppression {
        rule_ids: &[
            "AwsSolutions-CB4",
            "AwsPrototyping-CodeBuildProjectKMSEncryptedArtifacts",
        ],
        reason: "Encryption of Codebuild is not required.",
    },
    Suppression {
        rule_ids: &["AwsSolutions-S1", "AwsPrototyping-S3BucketLoggingEnabled"],
        reason: "Access Log buckets should not have s3 bucket logging",
    },
];
