use crate::{Params, PipelineError, Tuple};

/// Position a step may take in a pipeline graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepRole {
    /// No predecessors; may signal `EpochExhausted` at the end of a full pass.
    Source,
    Transform,
    /// Terminal only; nothing may be connected after it.
    Sink,
}

/// Core trait that all computation units implement.
///
/// One step instance is shared by every view that wraps it, so state kept on
/// the step itself (counters, caches) is visible across views and clones.
/// Per-invocation state belongs in the [`Production`] returned by `start`.
pub trait Step: Send + Sync {
    /// Type identifier (e.g. "control.identity", "source.counter")
    fn step_type(&self) -> &str;

    fn role(&self) -> StepRole {
        StepRole::Transform
    }

    /// Parameters every view of this step starts from
    fn defaults(&self) -> Params {
        Params::new()
    }

    /// Begin a new production sequence.
    ///
    /// Called again each time the previous sequence ends.
    fn start(&self) -> Box<dyn Production>;
}

/// A lazy sequence of output tuples produced by one step invocation.
pub trait Production: Send {
    /// Advance to the next output tuple.
    ///
    /// `Ok(None)` ends this sequence; the owning view starts a fresh one and
    /// keeps pulling. `Err(PipelineError::EpochExhausted)` is different: it
    /// travels up to whoever issued the request.
    fn resume(
        &mut self,
        input: &mut dyn Input,
        params: &Params,
    ) -> Result<Option<Tuple>, PipelineError>;
}

/// Pull source handed to a production.
pub trait Input {
    /// One unit from every wired input stream, concatenated in predecessor order.
    fn pull(&mut self) -> Result<Tuple, PipelineError>;
}

/// Production yielding exactly one tuple computed by `f`, then ending.
pub fn once<F>(f: F) -> Box<dyn Production>
where
    F: FnOnce(&mut dyn Input, &Params) -> Result<Tuple, PipelineError> + Send + 'static,
{
    Box::new(Once(Some(f)))
}

/// Production driven by a closure; `Ok(None)` from `f` ends it.
pub fn from_fn<F>(f: F) -> Box<dyn Production>
where
    F: FnMut(&mut dyn Input, &Params) -> Result<Option<Tuple>, PipelineError> + Send + 'static,
{
    Box::new(FromFn(f))
}

struct Once<F>(Option<F>);

impl<F> Production for Once<F>
where
    F: FnOnce(&mut dyn Input, &Params) -> Result<Tuple, PipelineError> + Send,
{
    fn resume(
        &mut self,
        input: &mut dyn Input,
        params: &Params,
    ) -> Result<Option<Tuple>, PipelineError> {
        match self.0.take() {
            Some(f) => f(input, params).map(Some),
            None => Ok(None),
        }
    }
}

struct FromFn<F>(F);

impl<F> Production for FromFn<F>
where
    F: FnMut(&mut dyn Input, &Params) -> Result<Option<Tuple>, PipelineError> + Send,
{
    fn resume(
        &mut self,
        input: &mut dyn Input,
        params: &Params,
    ) -> Result<Option<Tuple>, PipelineError> {
        (self.0)(input, params)
    }
}
