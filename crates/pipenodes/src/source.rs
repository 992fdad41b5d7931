use pipecore::production::{from_fn, once};
use pipecore::{
    Params, PipelineError, Production, Step, StepError, StepFactory, StepMetadata, StepRole,
    Tuple, Value, BOUNDED_EPOCH,
};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Emits 1, 2, 3, ... on `width` identical streams.
///
/// The counter lives on the step, so every view and clone of one `Counter`
/// draws from the same sequence.
pub struct Counter {
    width: usize,
    last: Arc<AtomicI64>,
}

impl Counter {
    pub fn new(width: usize) -> Self {
        Self::starting_at(width, 1)
    }

    pub fn starting_at(width: usize, first: i64) -> Self {
        Self {
            width,
            last: Arc::new(AtomicI64::new(first - 1)),
        }
    }
}

impl Step for Counter {
    fn step_type(&self) -> &str {
        "source.counter"
    }

    fn role(&self) -> StepRole {
        StepRole::Source
    }

    fn start(&self) -> Box<dyn Production> {
        let last = Arc::clone(&self.last);
        let width = self.width;
        once(move |_, _| {
            let n = last.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(vec![Value::from(n); width])
        })
    }
}

pub struct CounterFactory;

impl StepFactory for CounterFactory {
    fn create(&self, params: &Params) -> Result<Arc<dyn Step>, StepError> {
        let width = params.usize_or("width", 1)?;
        let first = params.i64_or("first", 1)?;
        Ok(Arc::new(Counter::starting_at(width, first)))
    }

    fn step_type(&self) -> &str {
        "source.counter"
    }

    fn metadata(&self) -> StepMetadata {
        StepMetadata {
            description: "Consecutive integers on one or more streams".to_string(),
            category: "source".to_string(),
            role: StepRole::Source,
        }
    }
}

/// Replays an in-memory list of tuples.
///
/// Loops forever by default. With `bounded_epoch` set, the request after the
/// last tuple fails with `EpochExhausted` and the following one starts over.
pub struct Sequence {
    items: Arc<[Tuple]>,
}

impl Sequence {
    pub fn new(items: Vec<Tuple>) -> Result<Self, StepError> {
        if items.is_empty() {
            return Err(StepError::InvalidParam {
                name: "items".to_string(),
                expected: "at least one tuple".to_string(),
            });
        }
        Ok(Self {
            items: items.into(),
        })
    }
}

impl Step for Sequence {
    fn step_type(&self) -> &str {
        "source.sequence"
    }

    fn role(&self) -> StepRole {
        StepRole::Source
    }

    fn start(&self) -> Box<dyn Production> {
        let items = Arc::clone(&self.items);
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

pub struct SequenceFactory;

impl StepFactory for SequenceFactory {
    fn create(&self, params: &Params) -> Result<Arc<dyn Step>, StepError> {
        let expected = || StepError::InvalidParam {
            name: "items".to_string(),
            expected: "array of arrays".to_string(),
        };
        let items = params
            .require("items")?
            .as_array()
            .ok_or_else(expected)?
            .iter()
            .map(|item| item.as_array().map(<[Value]>::to_vec).ok_or_else(expected))
            .collect::<Result<Vec<Tuple>, _>>()?;
        Ok(Arc::new(Sequence::new(items)?))
    }

    fn step_type(&self) -> &str {
        "source.sequence"
    }

    fn metadata(&self) -> StepMetadata {
        StepMetadata {
            description: "Replays a fixed list of tuples".to_string(),
            category: "source".to_string(),
            role: StepRole::Source,
        }
    }
}
