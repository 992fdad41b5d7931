//! Core of the pipeline engine
//!
//! A pipeline is a graph of views. Each view wraps a shared [`Step`] with its
//! predecessor wiring and parameters, buffers every output stream separately
//! for its consumers, and computes nothing until a consumer pulls. Views can
//! be cloned with parameter overrides and switched to replaying a cache
//! persisted on disk.

mod cache;
mod clone;
mod error;
mod params;
mod pipeline;
mod registry;
mod step;
mod value;
mod wiring;

pub use error::{PipelineError, StepError, WiringError};
pub use params::{Params, BOUNDED_EPOCH, SHUFFLE};
pub use pipeline::{Pipeline, PipelineConfig, Stream, ViewId, ViewState};
pub use registry::{StepFactory, StepMetadata, StepRegistry};
pub use step::{Input, Production, Step, StepRole};
pub use value::{Tensor, Tuple, Value};
pub use wiring::{Indices, Inputs, Wire};

/// Ready-made productions for common step shapes
pub mod production {
    pub use crate::step::{from_fn, once};
}

/// Reading and writing cache files
pub mod cache_file {
    pub use crate::cache::{load, persist};
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
