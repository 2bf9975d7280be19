//! Shared test fixtures: PDF and TETML builders, in-process collaborator
//! fakes and the pipeline harness.

pub mod builders;
pub mod fakes;
pub mod harness;

pub use builders::*;
pub use fakes::*;
pub use harness::PipelineHarness;
