#![allow(dead_code)]

use pipecore::production::{from_fn, once};
use pipecore::{
    Params, PipelineError, Production, Step, StepError, StepRole, Tuple, Value, BOUNDED_EPOCH,
};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

pub fn nums(values: &[f64]) -> Tuple {
    values.iter().map(|&v| Value::from(v)).collect()
}

/// Emits 1, 2, 3, ... on `width` identical streams. The counter is shared by
/// every view of the step.
pub struct IntegerStream {
    width: usize,
    next: Arc<AtomicI64>,
}

impl IntegerStream {
    pub fn new(width: usize) -> Arc<Self> {
        Arc::new(Self {
            width,
            next: Arc::new(AtomicI64::new(0)),
        })
    }
}

impl Step for IntegerStream {
    fn step_type(&self) -> &str {
        "test.integers"
    }

    fn role(&self) -> StepRole {
        StepRole::Source
    }

    fn start(&self) -> Box<dyn Production> {
        let next = Arc::clone(&self.next);
        let width = self.width;
        once(move |_, _| {
            let n = next.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(vec![Value::from(n); width])
        })
    }
}

/// Emits `[n, 10n, 100n]` for n = 1, 2, 3, ...
pub struct Spread {
    next: Arc<AtomicI64>,
}

impl Spread {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next: Arc::new(AtomicI64::new(0)),
        })
    }
}

impl Step for Spread {
    fn step_type(&self) -> &str {
        "test.spread"
    }

    fn role(&self) -> StepRole {
        StepRole::Source
    }

    fn start(&self) -> Box<dyn Production> {
        let next = Arc::clone(&self.next);
        once(move |_, _| {
            let n = (next.fetch_add(1, Ordering::SeqCst) + 1) as f64;
            Ok(vec![Value::from(n), Value::from(n * 10.0), Value::from(n * 100.0)])
        })
    }
}

/// Replays `items` in order. Loops when unbounded; with `bounded_epoch` set it
/// reports `EpochExhausted` after the last item.
pub struct Finite {
    items: Vec<Tuple>,
    starts: AtomicUsize,
}

impl Finite {
    pub fn new(items: Vec<Tuple>) -> Arc<Self> {
        Arc::new(Self {
            items,
            starts: AtomicUsize::new(0),
        })
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }
}

impl Step for Finite {
    fn step_type(&self) -> &str {
        "test.finite"
    }

    fn role(&self) -> StepRole {
        StepRole::Source
    }

    fn start(&self) -> Box<dyn Production> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let items = self.items.clone();
        let mut position = 0;
        from_fn(move |_, params| {
            let Some(item) = items.get(position) else {
                if params.flag(BOUNDED_EPOCH) {
                    return Err(PipelineError::EpochExhausted);
                }
                return Ok(None);
            };
            position += 1;
            Ok(Some(item.clone()))
        })
    }
}

/// Passes every input tuple through.
pub struct Identity;

impl Identity {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

impl Step for Identity {
    fn step_type(&self) -> &str {
        "test.identity"
    }

    fn start(&self) -> Box<dyn Production> {
        once(|input, _| input.pull())
    }
}

/// Adds the `increment` parameter to every numeric input.
pub struct Adder;

impl Adder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

impl Step for Adder {
    fn step_type(&self) -> &str {
        "test.adder"
    }

    fn defaults(&self) -> Params {
        Params::new().with("increment", 0.0)
    }

    fn start(&self) -> Box<dyn Production> {
        once(|input, params| {
            let increment = params.f64_or("increment", 0.0)?;
            let mut out = Vec::new();
            for value in input.pull()? {
                let n = value.as_f64().ok_or_else(|| StepError::InvalidInput {
                    step: "test.adder".to_string(),
                    expected: "number".to_string(),
                    actual: value.kind().to_string(),
                })?;
                out.push(Value::from(n + increment));
            }
            Ok(out)
        })
    }
}

/// Yields every input tuple `copies` times.
pub struct Duplicator {
    copies: usize,
}

impl Duplicator {
    pub fn new(copies: usize) -> Arc<Self> {
        Arc::new(Self { copies })
    }
}

impl Step for Duplicator {
    fn step_type(&self) -> &str {
        "test.duplicator"
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

/// Sums the first value of two consecutive inputs.
pub struct PairSum;

impl Step for PairSum {
    fn step_type(&self) -> &str {
        "test.pair_sum"
    }

    fn start(&self) -> Box<dyn Production> {
        once(|input, _| {
            let a = input.pull()?[0].as_f64().unwrap_or_default();
            let b = input.pull()?[0].as_f64().unwrap_or_default();
            Ok(vec![Value::from(a + b)])
        })
    }
}

/// Terminal step collecting its input.
pub struct Collect;

impl Step for Collect {
    fn step_type(&self) -> &str {
        "test.collect"
    }

    fn role(&self) -> StepRole {
        StepRole::Sink
    }

    fn start(&self) -> Box<dyn Production> {
        once(|input, _| Ok(vec![Value::Array(input.pull()?)]))
    }
}
