use crate::cache::Replay;
use crate::step::{Input, Production, Step, StepRole};
use crate::wiring::{self, Indices, Inputs, Wire};
use crate::{Params, PipelineError, Result, Tuple, Value, WiringError};
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Handle to a view inside a [`Pipeline`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub(crate) NodeIndex);

impl ViewId {
    pub fn index(&self) -> usize {
        self.0.index()
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view#{}", self.0.index())
    }
}

/// Where a view takes its output from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    /// Computed on demand by the wrapped step
    Active,
    /// Replayed from a loaded cache; the step is no longer consulted
    CacheReplay,
}

/// Configuration for a pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Seed for cache shuffling; entropy when unset
    pub seed: Option<u64>,
    /// Log a warning whenever an output buffer grows to this many values
    pub buffer_warn_len: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seed: None,
            buffer_warn_len: 10_000,
        }
    }
}

/// A node of the graph: one step with its wiring, parameters and buffers.
pub(crate) struct ViewNode {
    pub(crate) step: Arc<dyn Step>,
    pub(crate) inputs: Arc<[Wire]>,
    pub(crate) params: Arc<Params>,
    /// One FIFO per output index. Only ever grows.
    pub(crate) queues: Vec<VecDeque<Value>>,
    /// Output width, fixed by the first tuple produced
    pub(crate) arity: Option<usize>,
    pub(crate) production: Option<Box<dyn Production>>,
    pub(crate) replay: Option<Replay>,
}

impl ViewNode {
    fn new(step: Arc<dyn Step>, inputs: Arc<[Wire]>, params: Params) -> Self {
        Self {
            step,
            inputs,
            params: Arc::new(params),
            queues: Vec::new(),
            arity: None,
            production: None,
            replay: None,
        }
    }

    /// Same step and selections with fresh runtime state.
    pub(crate) fn fork(&self, inputs: Arc<[Wire]>, overrides: &Params) -> Self {
        Self {
            step: Arc::clone(&self.step),
            inputs,
            params: Arc::new(self.params.merged(overrides)),
            queues: Vec::new(),
            arity: self.arity,
            production: None,
            replay: self.replay.as_ref().map(Replay::fork),
        }
    }

    fn violation(&self, reason: impl Into<String>) -> PipelineError {
        PipelineError::contract(self.step.step_type(), reason)
    }

    /// Make room for indices `0..count`.
    fn reserve(&mut self, count: usize) -> Result<()> {
        if let Some(arity) = self.arity {
            if count > arity {
                return Err(self.violation(format!(
                    "index {} requested but the step has {} outputs",
                    count - 1,
                    arity
                )));
            }
        }
        if self.queues.len() < count {
            self.queues.resize_with(count, VecDeque::new);
        }
        Ok(())
    }

    /// Check a freshly produced tuple against the established width.
    fn accept(&mut self, width: usize) -> Result<()> {
        match self.arity {
            Some(arity) if arity != width => {
                return Err(self.violation(format!(
                    "produced {} values after establishing {} outputs",
                    width, arity
                )));
            }
            Some(_) => {}
            None if self.queues.len() > width => {
                return Err(self.violation(format!(
                    "index {} requested but the step produced {} outputs",
                    self.queues.len() - 1,
                    width
                )));
            }
            None => self.arity = Some(width),
        }
        self.reserve(width)
    }

    fn enqueue(&mut self, view: ViewId, tuple: Tuple, warn_len: usize) {
        for (index, (queue, value)) in self.queues.iter_mut().zip(tuple).enumerate() {
            queue.push_back(value);
            if queue.len() == warn_len {
                tracing::warn!(
                    "Output {} of {} ({}) holds {} unread values",
                    index,
                    view,
                    self.step.step_type(),
                    warn_len
                );
            }
        }
    }

    fn dequeue(&mut self, indices: &[usize]) -> Result<Tuple> {
        let mut tuple = Vec::with_capacity(indices.len());
        for &index in indices {
            let value = self.queues.get_mut(index).and_then(VecDeque::pop_front);
            match value {
                Some(value) => tuple.push(value),
                None => return Err(self.violation(format!("output {} has no value", index))),
            }
        }
        Ok(tuple)
    }
}

/// Arena of views forming a demand-driven pipeline graph.
///
/// Views are created with [`connect`](Pipeline::connect) and addressed by
/// [`ViewId`]. Pulling from a view recursively pulls from its predecessors;
/// nothing runs until something is requested.
///
/// A single caller drives one pipeline; independent consumers should work on
/// independent clones obtained with [`get_view`](Pipeline::get_view).
pub struct Pipeline {
    pub(crate) graph: StableDiGraph<ViewNode, usize>,
    pub(crate) rng: StdRng,
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with default settings
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    /// Create a new pipeline with custom configuration
    pub fn with_config(config: PipelineConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            graph: StableDiGraph::new(),
            rng,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Add a view of a step without predecessors
    pub fn source(&mut self, step: Arc<dyn Step>) -> Result<ViewId> {
        self.connect(step, Inputs::None, Indices::All)
    }

    /// Add a view of `step` reading from `inputs`.
    ///
    /// See [`Indices`] for how selections are matched to predecessors.
    pub fn connect(
        &mut self,
        step: Arc<dyn Step>,
        inputs: impl Into<Inputs>,
        indices: impl Into<Indices>,
    ) -> Result<ViewId> {
        self.connect_with(step, inputs, indices, &Params::new())
    }

    /// Like [`connect`](Pipeline::connect), with view-level parameter overrides
    pub fn connect_with(
        &mut self,
        step: Arc<dyn Step>,
        inputs: impl Into<Inputs>,
        indices: impl Into<Indices>,
        overrides: &Params,
    ) -> Result<ViewId> {
        let wires = wiring::resolve(inputs.into(), indices.into())?;

        if step.role() == StepRole::Source && !wires.is_empty() {
            return Err(WiringError::SourceWithPredecessors {
                step: step.step_type().to_string(),
            }
            .into());
        }
        for wire in &wires {
            let predecessor = self.node(wire.from)?;
            if predecessor.step.role() == StepRole::Sink {
                return Err(WiringError::SinkPredecessor {
                    step: predecessor.step.step_type().to_string(),
                }
                .into());
            }
        }

        let params = step.defaults().merged(overrides);
        let step_type = step.step_type().to_string();
        let index = self
            .graph
            .add_node(ViewNode::new(step, wires.clone().into(), params));
        for (slot, wire) in wires.iter().enumerate() {
            self.graph.add_edge(wire.from.0, index, slot);
        }

        let view = ViewId(index);
        tracing::debug!("Connected {} ({}) to {} inputs", view, step_type, wires.len());
        Ok(view)
    }

    /// Pull one tuple from `view`.
    ///
    /// `None` requests every output the view currently knows of. Selected
    /// values come back in ascending index order, whatever order the indices
    /// were given in. Each output index is buffered separately, so consumers
    /// reading different indices of the same view never lose or recompute a
    /// value. Buffers are unbounded: an index nobody reads keeps growing.
    pub fn request(&mut self, view: ViewId, indices: Option<&[usize]>) -> Result<Tuple> {
        self.request_with(view, indices, &Params::new())
    }

    /// Like [`request`](Pipeline::request); `call` overrides the view's
    /// parameters for this pull only.
    pub fn request_with(
        &mut self,
        view: ViewId,
        indices: Option<&[usize]>,
        call: &Params,
    ) -> Result<Tuple> {
        match indices {
            None => self.request_all(view, call),
            Some(indices) => self.request_some(view, indices, call),
        }
    }

    /// Iterate over tuples of `view`; iteration ends at an epoch boundary.
    pub fn stream(&mut self, view: ViewId, indices: Option<Vec<usize>>) -> Stream<'_> {
        Stream {
            pipeline: self,
            view,
            indices,
            done: false,
        }
    }

    pub fn state(&self, view: ViewId) -> Result<ViewState> {
        Ok(match self.node(view)?.replay {
            Some(_) => ViewState::CacheReplay,
            None => ViewState::Active,
        })
    }

    /// Merged parameters of `view`
    pub fn params(&self, view: ViewId) -> Result<&Params> {
        Ok(&*self.node(view)?.params)
    }

    pub fn step(&self, view: ViewId) -> Result<&Arc<dyn Step>> {
        Ok(&self.node(view)?.step)
    }

    /// Ordered predecessor wiring of `view`
    pub fn inputs(&self, view: ViewId) -> Result<&[Wire]> {
        Ok(&*self.node(view)?.inputs)
    }

    /// Number of values waiting in each output buffer of `view`
    pub fn buffered(&self, view: ViewId) -> Result<Vec<usize>> {
        Ok(self.node(view)?.queues.iter().map(VecDeque::len).collect())
    }

    /// Output width of `view`, once it has produced something
    pub fn arity(&self, view: ViewId) -> Result<Option<usize>> {
        Ok(self.node(view)?.arity)
    }

    pub fn view_count(&self) -> usize {
        self.graph.node_count()
    }

    pub(crate) fn node(&self, view: ViewId) -> Result<&ViewNode> {
        self.graph
            .node_weight(view.0)
            .ok_or_else(|| WiringError::UnknownView(view.index()).into())
    }

    pub(crate) fn node_mut(&mut self, view: ViewId) -> Result<&mut ViewNode> {
        self.graph
            .node_weight_mut(view.0)
            .ok_or_else(|| WiringError::UnknownView(view.index()).into())
    }

    fn request_all(&mut self, view: ViewId, call: &Params) -> Result<Tuple> {
        let tuple = self.produce(view, call)?;
        let warn_len = self.config.buffer_warn_len;
        let node = self.node_mut(view)?;

        if node.queues.iter().all(VecDeque::is_empty) {
            return Ok(tuple);
        }
        node.enqueue(view, tuple, warn_len);
        let all: Vec<usize> = (0..node.queues.len()).collect();
        node.dequeue(&all)
    }

    fn request_some(&mut self, view: ViewId, indices: &[usize], call: &Params) -> Result<Tuple> {
        wiring::check_unique(indices)?;
        let mut ascending = indices.to_vec();
        ascending.sort_unstable();
        let Some(&max) = ascending.last() else {
            return Ok(Vec::new());
        };
        let warn_len = self.config.buffer_warn_len;

        let node = self.node_mut(view)?;
        node.reserve(max + 1)?;
        if ascending.iter().any(|&i| node.queues[i].is_empty()) {
            let tuple = self.produce(view, call)?;
            self.node_mut(view)?.enqueue(view, tuple, warn_len);
        }
        self.node_mut(view)?.dequeue(&ascending)
    }

    /// Exactly one tuple from the step or the cache, arity-checked.
    fn produce(&mut self, view: ViewId, call: &Params) -> Result<Tuple> {
        let tuple = if self.node(view)?.replay.is_some() {
            self.replay_next(view, call)?
        } else {
            self.run_step(view, call)?
        };
        self.node_mut(view)?.accept(tuple.len())?;
        Ok(tuple)
    }

    fn replay_next(&mut self, view: ViewId, call: &Params) -> Result<Tuple> {
        let Pipeline { graph, rng, .. } = self;
        let node = graph
            .node_weight_mut(view.0)
            .ok_or(WiringError::UnknownView(view.index()))?;
        let ViewNode { replay, params, .. } = node;

        let merged;
        let params = if call.is_empty() {
            &**params
        } else {
            merged = params.merged(call);
            &merged
        };
        match replay {
            Some(replay) => replay.next(params, rng),
            None => Err(PipelineError::Cache(format!("{} has no cache loaded", view))),
        }
    }

    /// Resume the view's production, restarting it whenever it completes.
    fn run_step(&mut self, view: ViewId, call: &Params) -> Result<Tuple> {
        let node = self.node_mut(view)?;
        let step = Arc::clone(&node.step);
        let wires = Arc::clone(&node.inputs);
        let params = if call.is_empty() {
            Arc::clone(&node.params)
        } else {
            Arc::new(node.params.merged(call))
        };
        let (mut production, mut fresh) = match node.production.take() {
            Some(production) => (production, false),
            None => (step.start(), true),
        };

        loop {
            let mut upstream = Upstream {
                pipeline: self,
                wires: &wires,
                pulls: 0,
            };
            // On error the production is dropped; the next request starts over.
            let outcome = production.resume(&mut upstream, &params)?;
            let pulls = upstream.pulls;

            match outcome {
                Some(tuple) => {
                    self.node_mut(view)?.production = Some(production);
                    return Ok(tuple);
                }
                None if fresh && pulls == 0 => {
                    return Err(PipelineError::contract(
                        step.step_type(),
                        "production ended without pulling input or yielding output",
                    ));
                }
                None => {
                    tracing::trace!("Restarting production of {} ({})", view, step.step_type());
                    production = step.start();
                    fresh = true;
                }
            }
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Pull source for a view's production: one unit from each wired predecessor.
struct Upstream<'a> {
    pipeline: &'a mut Pipeline,
    wires: &'a [Wire],
    pulls: usize,
}

impl Input for Upstream<'_> {
    fn pull(&mut self) -> Result<Tuple> {
        self.pulls += 1;
        let wires = self.wires;
        let mut combined = Vec::new();
        for wire in wires {
            combined.extend(self.pipeline.request(wire.from, wire.select.as_deref())?);
        }
        Ok(combined)
    }
}

/// Iterator over the tuples of one view.
///
/// Yields `Ok` tuples until the view reports `EpochExhausted`, which ends the
/// iteration. Any other error is yielded once and also ends it.
pub struct Stream<'a> {
    pipeline: &'a mut Pipeline,
    view: ViewId,
    indices: Option<Vec<usize>>,
    done: bool,
}

impl Iterator for Stream<'_> {
    type Item = Result<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.pipeline.request(self.view, self.indices.as_deref()) {
            Ok(tuple) => Some(Ok(tuple)),
            Err(PipelineError::EpochExhausted) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
