//! # contract: the pipeline engine seam
//!
//! [`PipelineBackend`] is the stage-attachment and finalisation primitive that
//! [`crate::pipeline::PdkPipeline`] delegates to. The crate ships one
//! implementation, [`crate::pipeline::CodePipeline`], which records stages into
//! a pipeline resource description.
//!
//! ## Mocking & Testing
//! The trait is annotated for `mockall`; `MockPipelineBackend` is exported with
//! the default `test-export-mocks` feature so integration tests can assert that
//! stage bindings reach the backend unchanged.

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::pipeline::{AddStageOptions, PipelineDefinition, PipelineResource, StageBinding, StageDeployment};

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait PipelineBackend {
    /// Attaches a stage after any previously attached stages.
    fn add_stage(&mut self, binding: StageBinding, options: AddStageOptions) -> StageDeployment;

    /// Produces the finalised pipeline description.
    fn build_pipeline(&mut self, definition: &PipelineDefinition) -> PipelineResource;
}
