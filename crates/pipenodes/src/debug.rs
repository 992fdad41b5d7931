use pipecore::production::once;
use pipecore::{Params, Production, Step, StepError, StepFactory, StepMetadata, Tuple, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type Callback = dyn Fn(&Tuple) + Send + Sync;

/// Logs every tuple passing through
pub struct DebugStep {
    callback: Option<Arc<Callback>>,
}

impl DebugStep {
    pub fn new() -> Self {
        Self { callback: None }
    }

    /// Hand every tuple to `callback` instead of the log.
    pub fn with_callback<F>(callback: F) -> Self
    where
        F: Fn(&Tuple) + Send + Sync + 'static,
    {
        Self {
            callback: Some(Arc::new(callback)),
        }
    }
}

impl Default for DebugStep {
    fn default() -> Self {
        Self::new()
    }
}

impl Step for DebugStep {
    fn step_type(&self) -> &str {
        "debug.log"
    }

    fn start(&self) -> Box<dyn Production> {
        let callback = self.callback.clone();
        once(move |input, params| {
            let tuple = input.pull()?;
            match &callback {
                Some(callback) => callback(&tuple),
                None => {
                    let label = params.str_or("label", "debug")?;
                    let rendered = serde_json::to_string(&tuple)?;
                    tracing::debug!("{}: {}", label, rendered);
                }
            }
            Ok(tuple)
        })
    }
}

pub struct DebugStepFactory;

impl StepFactory for DebugStepFactory {
    fn create(&self, _params: &Params) -> Result<Arc<dyn Step>, StepError> {
        Ok(Arc::new(DebugStep::new()))
    }

    fn step_type(&self) -> &str {
        "debug.log"
    }

    fn metadata(&self) -> StepMetadata {
        StepMetadata {
            description: "Logs tuples for debugging".to_string(),
            category: "debug".to_string(),
            ..StepMetadata::default()
        }
    }
}

/// How much of the first tuple a [`PreviewIdentity`] logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreviewKind {
    /// Tensor shapes and short text forms
    #[default]
    Minimal,
    /// The whole tuple
    Extended,
}

/// Passes input through, logging a preview of the first tuple only.
///
/// The first tuple is previewed once per step, not once per view.
pub struct PreviewIdentity {
    description: String,
    kind: PreviewKind,
    previewed: Arc<AtomicBool>,
}

impl PreviewIdentity {
    pub fn new(description: impl Into<String>, kind: PreviewKind) -> Self {
        Self {
            description: description.into(),
            kind,
            previewed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn has_previewed(&self) -> bool {
        self.previewed.load(Ordering::SeqCst)
    }
}

impl Step for PreviewIdentity {
    fn step_type(&self) -> &str {
        "debug.preview"
    }

    fn start(&self) -> Box<dyn Production> {
        let previewed = Arc::clone(&self.previewed);
        let description = self.description.clone();
        let kind = self.kind;
        once(move |input, _| {
            let tuple = input.pull()?;
            if !previewed.swap(true, Ordering::SeqCst) {
                let preview = match kind {
                    PreviewKind::Minimal => minimal_preview(&tuple),
                    PreviewKind::Extended => format!("{:?}", tuple),
                };
                tracing::info!("Preview of {}: {}", description, preview);
            }
            Ok(tuple)
        })
    }
}

/// Shapes for tensors, nested lists for arrays, text for the rest.
pub fn minimal_preview(tuple: &[Value]) -> String {
    let parts: Vec<String> = tuple.iter().map(preview_value).collect();
    format!("[{}]", parts.join(", "))
}

fn preview_value(value: &Value) -> String {
    match value {
        Value::Tensor(t) => format!("{:?}", t.shape),
        Value::Array(items) => minimal_preview(items),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
        Value::Object(map) => {
            let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
            keys.sort_unstable();
            format!("{{{}}}", keys.join(", "))
        }
    }
}

pub struct PreviewIdentityFactory;

impl StepFactory for PreviewIdentityFactory {
    fn create(&self, params: &Params) -> Result<Arc<dyn Step>, StepError> {
        let description = params.str_or("description", "")?;
        let kind = match params.str_or("kind", "minimal")? {
            "minimal" => PreviewKind::Minimal,
            "extended" => PreviewKind::Extended,
            _ => {
                return Err(StepError::InvalidParam {
                    name: "kind".to_string(),
                    expected: "'minimal' or 'extended'".to_string(),
                })
            }
        };
        Ok(Arc::new(PreviewIdentity::new(description, kind)))
    }

    fn step_type(&self) -> &str {
        "debug.preview"
    }

    fn metadata(&self) -> StepMetadata {
        StepMetadata {
            description: "Logs a preview of the first tuple".to_string(),
            category: "debug".to_string(),
            ..StepMetadata::default()
        }
    }
}
