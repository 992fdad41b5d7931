use pipecore::production::{from_fn, once};
use pipecore::{
    Indices, Inputs, Params, Pipeline, Production, Step, StepError, StepFactory, StepMetadata,
    Tuple, ViewId,
};
use std::sync::Arc;

/// Passes its input through unchanged
pub struct Identity;

impl Step for Identity {
    fn step_type(&self) -> &str {
        "control.identity"
    }

    fn start(&self) -> Box<dyn Production> {
        once(|input, _| input.pull())
    }
}

pub struct IdentityFactory;

impl StepFactory for IdentityFactory {
    fn create(&self, _params: &Params) -> Result<Arc<dyn Step>, StepError> {
        Ok(Arc::new(Identity))
    }

    fn step_type(&self) -> &str {
        "control.identity"
    }

    fn metadata(&self) -> StepMetadata {
        StepMetadata {
            description: "Passes input through unchanged".to_string(),
            category: "control".to_string(),
            ..StepMetadata::default()
        }
    }
}

/// Yields every input tuple `copies` times in a row.
///
/// Each copy is a separate unit for downstream consumers.
pub struct Duplicator {
    copies: usize,
}

impl Duplicator {
    pub fn new(copies: usize) -> Self {
        Self { copies }
    }
}

impl Step for Duplicator {
    fn step_type(&self) -> &str {
        "control.duplicator"
    }

    fn start(&self) -> Box<dyn Production> {
        let copies = self.copies;
        let mut held: Option<Tuple> = None;
        let mut left = 0;
        from_fn(move |input, _| {
            if held.is_none() {
                held = Some(input.pull()?);
                left = copies;
            }
            if left == 0 {
                return Ok(None);
            }
            left -= 1;
            Ok(held.clone())
        })
    }
}

pub struct DuplicatorFactory;

impl StepFactory for DuplicatorFactory {
    fn create(&self, params: &Params) -> Result<Arc<dyn Step>, StepError> {
        Ok(Arc::new(Duplicator::new(params.usize_or("copies", 2)?)))
    }

    fn step_type(&self) -> &str {
        "control.duplicator"
    }

    fn metadata(&self) -> StepMetadata {
        StepMetadata {
            description: "Repeats every input tuple".to_string(),
            category: "control".to_string(),
            ..StepMetadata::default()
        }
    }
}

/// Widens every tuple: `[a, b]` becomes `[a, b, a, b]` for two copies.
pub struct DuplicateStream {
    copies: usize,
}

impl DuplicateStream {
    pub fn new(copies: usize) -> Self {
        Self { copies }
    }
}

impl Step for DuplicateStream {
    fn step_type(&self) -> &str {
        "control.duplicate_stream"
    }

    fn start(&self) -> Box<dyn Production> {
        let copies = self.copies;
        once(move |input, _| {
            let tuple = input.pull()?;
            Ok((0..copies).flat_map(|_| tuple.iter().cloned()).collect())
        })
    }
}

pub struct DuplicateStreamFactory;

impl StepFactory for DuplicateStreamFactory {
    fn create(&self, params: &Params) -> Result<Arc<dyn Step>, StepError> {
        Ok(Arc::new(DuplicateStream::new(params.usize_or("copies", 2)?)))
    }

    fn step_type(&self) -> &str {
        "control.duplicate_stream"
    }

    fn metadata(&self) -> StepMetadata {
        StepMetadata {
            description: "Repeats every input stream side by side".to_string(),
            category: "control".to_string(),
            ..StepMetadata::default()
        }
    }
}

/// Concatenates consecutive inputs until at least `count` values are gathered.
pub struct RoundRobinMerger {
    count: usize,
}

impl RoundRobinMerger {
    pub fn new(count: usize) -> Self {
        Self { count }
    }
}

impl Step for RoundRobinMerger {
    fn step_type(&self) -> &str {
        "control.round_robin_merger"
    }

    fn start(&self) -> Box<dyn Production> {
        let count = self.count;
        once(move |input, _| {
            let mut merged = Vec::with_capacity(count);
            while merged.len() < count {
                let next = input.pull()?;
                if next.is_empty() {
                    return Err(StepError::InvalidInput {
                        step: "control.round_robin_merger".to_string(),
                        expected: "at least one value per input".to_string(),
                        actual: "empty tuple".to_string(),
                    }
                    .into());
                }
                merged.extend(next);
            }
            Ok(merged)
        })
    }
}

pub struct RoundRobinMergerFactory;

impl StepFactory for RoundRobinMergerFactory {
    fn create(&self, params: &Params) -> Result<Arc<dyn Step>, StepError> {
        Ok(Arc::new(RoundRobinMerger::new(params.usize_or("count", 2)?)))
    }

    fn step_type(&self) -> &str {
        "control.round_robin_merger"
    }

    fn metadata(&self) -> StepMetadata {
        StepMetadata {
            description: "Merges consecutive inputs into one wider tuple".to_string(),
            category: "control".to_string(),
            ..StepMetadata::default()
        }
    }
}

/// A chain of steps connected as one unit.
///
/// Only the first step sees the given inputs; every following step reads all
/// outputs of the one before it. Not a step itself: connecting a block adds
/// one view per step and returns the last.
#[derive(Clone)]
pub struct Block {
    steps: Vec<Arc<dyn Step>>,
}

impl Block {
    pub fn new(steps: Vec<Arc<dyn Step>>) -> Self {
        Self { steps }
    }

    pub fn connect(
        &self,
        pipeline: &mut Pipeline,
        inputs: impl Into<Inputs>,
        indices: impl Into<Indices>,
    ) -> pipecore::Result<ViewId> {
        self.connect_with(pipeline, inputs, indices, &Params::new())
    }

    /// Connect the chain, applying `overrides` to every view it creates.
    pub fn connect_with(
        &self,
        pipeline: &mut Pipeline,
        inputs: impl Into<Inputs>,
        indices: impl Into<Indices>,
        overrides: &Params,
    ) -> pipecore::Result<ViewId> {
        let Some((first, rest)) = self.steps.split_first() else {
            return Err(StepError::InvalidParam {
                name: "steps".to_string(),
                expected: "at least one step".to_string(),
            }
            .into());
        };

        let mut view = pipeline.connect_with(Arc::clone(first), inputs, indices, overrides)?;
        for step in rest {
            view = pipeline.connect_with(Arc::clone(step), view, Indices::All, overrides)?;
        }
        Ok(view)
    }
}
