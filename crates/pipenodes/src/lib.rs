//! Standard step library
//!
//! Sources, control-flow steps, transformers and debugging steps for
//! `pipecore` pipelines.

mod control;
mod debug;
mod source;
mod tensor;
mod transform;

pub use control::{Block, DuplicateStream, Duplicator, Identity, RoundRobinMerger};
pub use debug::{minimal_preview, DebugStep, PreviewIdentity, PreviewKind};
pub use source::{Counter, Sequence};
pub use transform::{
    Batcher, DictToValue, FunctionTransformer, ListToStreams, StackStreams, StreamsToList,
    StreamsToTuple, ToTensor,
};
use pipecore::StepRegistry;

use std::sync::Arc;

/// Register all standard steps with a registry
pub fn register_all(registry: &mut StepRegistry) {
    registry.register(Arc::new(source::CounterFactory));
    registry.register(Arc::new(source::SequenceFactory));
    registry.register(Arc::new(control::IdentityFactory));
    registry.register(Arc::new(control::DuplicatorFactory));
    registry.register(Arc::new(control::DuplicateStreamFactory));
    registry.register(Arc::new(control::RoundRobinMergerFactory));
    registry.register(Arc::new(transform::StreamsToListFactory));
    registry.register(Arc::new(transform::ListToStreamsFactory));
    registry.register(Arc::new(transform::StreamsToTupleFactory));
    registry.register(Arc::new(transform::StackStreamsFactory));
    registry.register(Arc::new(transform::BatcherFactory));
    registry.register(Arc::new(transform::DictToValueFactory));
    registry.register(Arc::new(transform::ToTensorFactory));
    registry.register(Arc::new(debug::DebugStepFactory));
    registry.register(Arc::new(debug::PreviewIdentityFactory));
}
