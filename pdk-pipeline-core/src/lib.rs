#![doc = "pdk-pipeline-core: core logic library for pdk-pipeline."]

//! This crate contains the branch-aware pipeline model: branch resolution,
//! source binding, pipeline assembly and feature-branch fan-out, plus the
//! sample OpenAPI writer.
//!
//! Nothing in here reads the process environment or talks to a cloud account.
//! Every "provisioned" resource is a description appended to an [`construct::App`],
//! to be serialised and materialised by an external orchestrator.
//!
//! # Usage
//! The `pdk-pipeline` CLI crate loads configuration, reads `BRANCH` once and
//! drives the operations below.

pub mod branch;
pub mod construct;
pub mod contract;
pub mod error;
pub mod feature_branches;
pub mod openapi;
pub mod pipeline;
pub mod source;
pub mod suppressions;

pub use error::{ConfigurationError, SampleSpecError};
