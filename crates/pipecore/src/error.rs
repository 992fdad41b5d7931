use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Wiring error: {0}")]
    Wiring(#[from] WiringError),

    #[error("Step error: {0}")]
    Step(#[from] StepError),

    /// End of one full pass over a bounded source or cache. A signal, not a fault.
    #[error("Epoch exhausted")]
    EpochExhausted,

    #[error("Step contract violated by '{step}': {reason}")]
    ContractViolation { step: String, reason: String },

    #[error("Corrupt cache at {}: {reason}", .path.display())]
    CacheCorruption { path: PathBuf, reason: String },

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn is_epoch_exhausted(&self) -> bool {
        matches!(self, PipelineError::EpochExhausted)
    }

    pub(crate) fn contract(step: &str, reason: impl Into<String>) -> Self {
        PipelineError::ContractViolation {
            step: step.to_string(),
            reason: reason.into(),
        }
    }
}

/// Raised synchronously while connecting views
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WiringError {
    #[error("{selectors} index selections given for {predecessors} predecessors")]
    ArityMismatch {
        predecessors: usize,
        selectors: usize,
    },

    #[error("Index selection given without any predecessor")]
    SelectorWithoutPredecessor,

    #[error("'{step}' is a sink and must stay at the end of a pipeline")]
    SinkPredecessor { step: String },

    #[error("Source step '{step}' cannot have predecessors")]
    SourceWithPredecessors { step: String },

    #[error("Index {index} selected more than once")]
    DuplicateIndex { index: usize },

    #[error("Unknown view: {0}")]
    UnknownView(usize),

    #[error("View {0} still feeds other views")]
    ViewInUse(usize),
}

/// Faults raised by concrete step logic
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StepError {
    #[error("Missing required parameter: {0}")]
    MissingParam(String),

    #[error("Invalid parameter '{name}': expected {expected}")]
    InvalidParam { name: String, expected: String },

    #[error("Invalid input for '{step}': expected {expected}, got {actual}")]
    InvalidInput {
        step: String,
        expected: String,
        actual: String,
    },

    #[error("Unknown step type: {0}")]
    UnknownStepType(String),

    #[error("Step failed: {0}")]
    Failed(String),
}
