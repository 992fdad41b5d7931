use crate::{StepError, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Reshuffle a replayed cache at the start of every pass.
pub const SHUFFLE: &str = "shuffle";

/// Stop with `EpochExhausted` after one full pass instead of looping.
pub const BOUNDED_EPOCH: &str = "bounded_epoch";

/// Named parameters handed to a step.
///
/// Layers merge with a fixed precedence: step defaults, then view overrides,
/// then per-call overrides. The later layer wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Params {
    values: HashMap<String, Value>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Copy of `self` with every entry of `overrides` taking precedence.
    pub fn merged(&self, overrides: &Params) -> Params {
        let mut values = self.values.clone();
        values.extend(overrides.values.iter().map(|(k, v)| (k.clone(), v.clone())));
        Params { values }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Get required parameter or return error
    pub fn require(&self, name: &str) -> Result<&Value, StepError> {
        self.values
            .get(name)
            .ok_or_else(|| StepError::MissingParam(name.to_string()))
    }

    /// Get parameter with default
    pub fn get_or(&self, name: &str, default: Value) -> Value {
        self.values.get(name).cloned().unwrap_or(default)
    }

    /// Missing or non-boolean flags read as `false`.
    pub fn flag(&self, name: &str) -> bool {
        self.get(name).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn f64_or(&self, name: &str, default: f64) -> Result<f64, StepError> {
        match self.get(name) {
            None => Ok(default),
            Some(v) => v.as_f64().ok_or_else(|| invalid(name, "number")),
        }
    }

    pub fn i64_or(&self, name: &str, default: i64) -> Result<i64, StepError> {
        match self.get(name) {
            None => Ok(default),
            Some(v) => v.as_i64().ok_or_else(|| invalid(name, "integer")),
        }
    }

    pub fn usize_or(&self, name: &str, default: usize) -> Result<usize, StepError> {
        match self.get(name) {
            None => Ok(default),
            Some(v) => v.as_usize().ok_or_else(|| invalid(name, "non-negative integer")),
        }
    }

    pub fn str_or<'a>(&'a self, name: &str, default: &'a str) -> Result<&'a str, StepError> {
        match self.get(name) {
            None => Ok(default),
            Some(v) => v.as_str().ok_or_else(|| invalid(name, "string")),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}

fn invalid(name: &str, expected: &str) -> StepError {
    StepError::InvalidParam {
        name: name.to_string(),
        expected: expected.to_string(),
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Params {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_layer_wins() {
        let defaults = Params::new().with("increment", 1.0).with("width", 3usize);
        let view = Params::new().with("increment", 2.0);
        let call = Params::new().with("width", 5usize);

        let merged = defaults.merged(&view).merged(&call);
        assert_eq!(merged.f64_or("increment", 0.0), Ok(2.0));
        assert_eq!(merged.usize_or("width", 0), Ok(5));
        assert_eq!(defaults.f64_or("increment", 0.0), Ok(1.0));
    }

    #[test]
    fn typed_getters_reject_wrong_kinds() {
        let params = Params::new().with("width", "wide").with(SHUFFLE, 1.0);
        assert!(params.usize_or("width", 1).is_err());
        assert!(!params.flag(SHUFFLE));
        assert_eq!(params.usize_or("missing", 7), Ok(7));

        let params = Params::new().with("first", 1.5).with("offset", -3.0);
        assert!(params.i64_or("first", 1).is_err());
        assert_eq!(params.i64_or("offset", 0), Ok(-3));
        assert_eq!(
            params.require("missing"),
            Err(StepError::MissingParam("missing".to_string()))
        );
    }
}
