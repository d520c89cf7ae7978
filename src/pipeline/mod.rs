//! Job pipeline: skeleton extraction, sequential chunk reconstruction,
//! length enforcement, and stitching, orchestrated by a per-job state
//! machine driver.

pub mod config;
pub mod controller;
pub mod length_enforcer;
pub mod reconstructor;
pub mod skeleton_extractor;
pub mod stitcher;

pub use config::PipelineConfig;
pub use controller::{JobRegistry, PipelineEvent, RunOutcome};
