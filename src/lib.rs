//! Thoughtlink - chat page extraction and collective sync agent
//!
//! The crates do the work; this one wires them into a running pipeline and
//! hosts the command line.

pub mod pipeline;

pub use pipeline::{Pipeline, PipelineReport, RunningPipeline};
