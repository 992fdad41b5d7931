use crate::tensor::{self, Axis};
use pipecore::production::once;
use pipecore::{
    Params, Production, Step, StepError, StepFactory, StepMetadata, StepRole, Tensor, Tuple,
    Value,
};
use std::sync::Arc;

type ValueFn = dyn Fn(Value, &Params) -> Result<Value, StepError> + Send + Sync;

fn invalid_input(step: &str, expected: &str, value: &Value) -> StepError {
    StepError::InvalidInput {
        step: step.to_string(),
        expected: expected.to_string(),
        actual: value.kind().to_string(),
    }
}

/// Applies a function to every value of every input tuple.
///
/// The function receives the view's merged parameters, so clones with
/// different overrides transform differently.
pub struct FunctionTransformer {
    step_type: String,
    defaults: Params,
    function: Arc<ValueFn>,
}

impl FunctionTransformer {
    pub fn new<F>(step_type: impl Into<String>, function: F) -> Self
    where
        F: Fn(Value, &Params) -> Result<Value, StepError> + Send + Sync + 'static,
    {
        Self {
            step_type: step_type.into(),
            defaults: Params::new(),
            function: Arc::new(function),
        }
    }

    pub fn with_defaults(mut self, defaults: Params) -> Self {
        self.defaults = defaults;
        self
    }
}

impl Step for FunctionTransformer {
    fn step_type(&self) -> &str {
        &self.step_type
    }

    fn defaults(&self) -> Params {
        self.defaults.clone()
    }

    fn start(&self) -> Box<dyn Production> {
        let function = Arc::clone(&self.function);
        once(move |input, params| {
            let mut out = Vec::new();
            for value in input.pull()? {
                out.push(function(value, params)?);
            }
            Ok(out)
        })
    }
}

/// Collapses all input streams into one array value.
pub struct StreamsToList;

impl Step for StreamsToList {
    fn step_type(&self) -> &str {
        "transform.streams_to_list"
    }

    fn start(&self) -> Box<dyn Production> {
        once(|input, _| Ok(vec![Value::Array(input.pull()?)]))
    }
}

/// Spreads array values over separate streams; inverse of [`StreamsToList`].
pub struct ListToStreams;

impl Step for ListToStreams {
    fn step_type(&self) -> &str {
        "transform.list_to_streams"
    }

    fn start(&self) -> Box<dyn Production> {
        once(|input, _| {
            let mut out = Vec::new();
            for value in input.pull()? {
                match value {
                    Value::Array(items) => out.extend(items),
                    other => {
                        return Err(
                            invalid_input("transform.list_to_streams", "array", &other).into()
                        )
                    }
                }
            }
            Ok(out)
        })
    }
}

/// Terminal step handing the combined input tuple to the consumer.
pub struct StreamsToTuple;

impl Step for StreamsToTuple {
    fn step_type(&self) -> &str {
        "transform.streams_to_tuple"
    }

    fn role(&self) -> StepRole {
        StepRole::Sink
    }

    fn start(&self) -> Box<dyn Production> {
        once(|input, _| input.pull())
    }
}

/// Stacks all numeric input streams into one tensor along a new last axis.
pub struct StackStreams;

impl Step for StackStreams {
    fn step_type(&self) -> &str {
        "transform.stack_streams"
    }

    fn start(&self) -> Box<dyn Production> {
        once(|input, _| {
            let tuple = input.pull()?;
            let stacked = numeric(&tuple, "transform.stack_streams")
                .and_then(|parts| {
                    tensor::stack(&parts, Axis::Last).ok_or_else(|| StepError::InvalidInput {
                        step: "transform.stack_streams".to_string(),
                        expected: "streams of equal shape".to_string(),
                        actual: shapes(&parts),
                    })
                })?;
            Ok(vec![Value::Tensor(stacked)])
        })
    }
}

fn numeric(values: &[Value], step: &str) -> Result<Vec<Tensor>, StepError> {
    values
        .iter()
        .map(|v| tensor::from_value(v).ok_or_else(|| invalid_input(step, "numeric value", v)))
        .collect()
}

fn shapes(parts: &[Tensor]) -> String {
    format!("{:?}", parts.iter().map(|t| &t.shape).collect::<Vec<_>>())
}

/// Pulls `batch_size` tuples and emits one tensor per stream with the batch
/// along the first axis.
pub struct Batcher;

impl Step for Batcher {
    fn step_type(&self) -> &str {
        "transform.batcher"
    }

    fn defaults(&self) -> Params {
        Params::new().with("batch_size", 32usize)
    }

    fn start(&self) -> Box<dyn Production> {
        once(|input, params| {
            let batch_size = params.usize_or("batch_size", 32)?;
            if batch_size == 0 {
                return Err(StepError::InvalidParam {
                    name: "batch_size".to_string(),
                    expected: "positive integer".to_string(),
                }
                .into());
            }

            let first = input.pull()?;
            let mut columns: Vec<Vec<Tensor>> = numeric(&first, "transform.batcher")?
                .into_iter()
                .map(|t| vec![t])
                .collect();
            for _ in 1..batch_size {
                let next = input.pull()?;
                if next.len() != columns.len() {
                    return Err(StepError::InvalidInput {
                        step: "transform.batcher".to_string(),
                        expected: format!("{} streams", columns.len()),
                        actual: format!("{} streams", next.len()),
                    }
                    .into());
                }
                for (column, t) in columns.iter_mut().zip(numeric(&next, "transform.batcher")?) {
                    column.push(t);
                }
            }

            let mut out = Vec::with_capacity(columns.len());
            for column in columns {
                let batch = tensor::stack(&column, Axis::First).ok_or_else(|| {
                    StepError::InvalidInput {
                        step: "transform.batcher".to_string(),
                        expected: "values of equal shape within a stream".to_string(),
                        actual: shapes(&column),
                    }
                })?;
                out.push(Value::Tensor(batch));
            }
            Ok(out)
        })
    }
}

/// Replaces every object value with its entry under the `key` parameter.
pub struct DictToValue;

impl Step for DictToValue {
    fn step_type(&self) -> &str {
        "transform.dict_to_value"
    }

    fn start(&self) -> Box<dyn Production> {
        once(|input, params| {
            let key = params
                .require("key")?
                .as_str()
                .ok_or_else(|| StepError::InvalidParam {
                    name: "key".to_string(),
                    expected: "string".to_string(),
                })?;
            let mut out = Vec::new();
            for value in input.pull()? {
                let entry = value.as_object().and_then(|map| map.get(key)).cloned();
                match entry {
                    Some(entry) => out.push(entry),
                    None => {
                        let expected = format!("object with key '{}'", key);
                        return Err(invalid_input("transform.dict_to_value", &expected, &value).into());
                    }
                }
            }
            Ok(out)
        })
    }
}

/// Converts every value to a tensor. Plain numbers become one-element vectors.
pub struct ToTensor;

impl Step for ToTensor {
    fn step_type(&self) -> &str {
        "transform.to_tensor"
    }

    fn start(&self) -> Box<dyn Production> {
        once(|input, _| {
            let tuple: Tuple = input.pull()?;
            let mut out = Vec::with_capacity(tuple.len());
            for value in &tuple {
                let converted = match value {
                    Value::Number(n) => Some(Tensor::vector(vec![*n])),
                    other => tensor::from_value(other),
                };
                match converted {
                    Some(t) => out.push(Value::Tensor(t)),
                    None => {
                        return Err(
                            invalid_input("transform.to_tensor", "numeric value", value).into()
                        )
                    }
                }
            }
            Ok(out)
        })
    }
}

macro_rules! unit_factory {
    ($factory:ident, $step:ident, $name:literal, $description:literal, $role:expr) => {
        pub struct $factory;

        impl StepFactory for $factory {
            fn create(&self, _params: &Params) -> Result<Arc<dyn Step>, StepError> {
                Ok(Arc::new($step))
            }

            fn step_type(&self) -> &str {
                $name
            }

            fn metadata(&self) -> StepMetadata {
                StepMetadata {
                    description: $description.to_string(),
                    category: "transform".to_string(),
                    role: $role,
                }
            }
        }
    };
}

unit_factory!(
    StreamsToListFactory,
    StreamsToList,
    "transform.streams_to_list",
    "Collapses all streams into one array",
    StepRole::Transform
);
unit_factory!(
    ListToStreamsFactory,
    ListToStreams,
    "transform.list_to_streams",
    "Spreads arrays over separate streams",
    StepRole::Transform
);
unit_factory!(
    StreamsToTupleFactory,
    StreamsToTuple,
    "transform.streams_to_tuple",
    "Hands the combined tuple to the consumer",
    StepRole::Sink
);
unit_factory!(
    StackStreamsFactory,
    StackStreams,
    "transform.stack_streams",
    "Stacks numeric streams into one tensor",
    StepRole::Transform
);
unit_factory!(
    BatcherFactory,
    Batcher,
    "transform.batcher",
    "Groups consecutive tuples into batches",
    StepRole::Transform
);
unit_factory!(
    DictToValueFactory,
    DictToValue,
    "transform.dict_to_value",
    "Extracts one entry from object values",
    StepRole::Transform
);
unit_factory!(
    ToTensorFactory,
    ToTensor,
    "transform.to_tensor",
    "Converts numeric values to tensors",
    StepRole::Transform
);
