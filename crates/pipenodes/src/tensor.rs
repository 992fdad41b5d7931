use pipecore::{Tensor, Value};

/// Numeric content of `value` as a tensor. Numbers are rank 0, arrays nest.
///
/// `None` for non-numeric values and ragged arrays.
pub(crate) fn from_value(value: &Value) -> Option<Tensor> {
    match value {
        Value::Number(n) => Tensor::new(Vec::new(), vec![*n]),
        Value::Tensor(t) => Some(t.clone()),
        Value::Array(items) => {
            let parts = items.iter().map(from_value).collect::<Option<Vec<_>>>()?;
            if parts.is_empty() {
                return Some(Tensor::vector(Vec::new()));
            }
            stack(&parts, Axis::First)
        }
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Axis {
    First,
    Last,
}

/// Stack equally shaped tensors along a new axis.
///
/// `None` when the parts differ in shape or in number of values.
pub(crate) fn stack(parts: &[Tensor], axis: Axis) -> Option<Tensor> {
    let first = parts.first()?;
    let (inner, len) = (&first.shape, first.len());
    if parts.iter().any(|t| &t.shape != inner || t.len() != len) {
        return None;
    }

    let count = parts.len();
    let (shape, data) = match axis {
        Axis::First => {
            let shape = std::iter::once(count).chain(inner.iter().copied()).collect();
            let data = parts.iter().flat_map(|t| t.data.iter().copied()).collect();
            (shape, data)
        }
        Axis::Last => {
            let shape = inner.iter().copied().chain(std::iter::once(count)).collect();
            let data = (0..len)
                .flat_map(|i| parts.iter().map(move |t| t.data.get(i).copied()))
                .collect::<Option<Vec<f64>>>()?;
            (shape, data)
        }
    };
    Tensor::new(shape, data)
}
