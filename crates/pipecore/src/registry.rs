use crate::{Params, Step, StepError, StepRole};
use std::collections::HashMap;
use std::sync::Arc;

/// Factory trait for creating step instances
pub trait StepFactory: Send + Sync {
    /// Create a new step with the given construction parameters
    fn create(&self, params: &Params) -> Result<Arc<dyn Step>, StepError>;

    /// Get step type identifier
    fn step_type(&self) -> &str;

    /// Optional: description, category and role of the step type
    fn metadata(&self) -> StepMetadata {
        StepMetadata::default()
    }
}

/// Metadata about a step type
#[derive(Debug, Clone)]
pub struct StepMetadata {
    pub description: String,
    pub category: String,
    pub role: StepRole,
}

impl Default for StepMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            category: "general".to_string(),
            role: StepRole::Transform,
        }
    }
}

/// Registry of available step types
pub struct StepRegistry {
    factories: HashMap<String, Arc<dyn StepFactory>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a step factory
    pub fn register(&mut self, factory: Arc<dyn StepFactory>) {
        let step_type = factory.step_type().to_string();
        tracing::info!("Registering step type: {}", step_type);
        self.factories.insert(step_type, factory);
    }

    /// Create a step from its type name and construction parameters
    pub fn create_step(&self, step_type: &str, params: &Params) -> Result<Arc<dyn Step>, StepError> {
        let factory = self
            .factories
            .get(step_type)
            .ok_or_else(|| StepError::UnknownStepType(step_type.to_string()))?;

        factory.create(params)
    }

    /// Get all registered step types, sorted
    pub fn list_step_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.keys().cloned().collect();
        types.sort();
        types
    }

    /// Get metadata for a step type
    pub fn get_metadata(&self, step_type: &str) -> Option<StepMetadata> {
        self.factories.get(step_type).map(|f| f.metadata())
    }
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::new()
    }
}
