//! Step catalog — the authored, ordered list of funnel steps.

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{FunnelError, FunnelResult};
use crate::types::{StepDefinition, StepType};

const BUILTIN_CATALOG: &str = include_str!("../catalog/default_quiz.json");

/// An immutable, validated catalog. Step ids are unique and non-empty.
#[derive(Debug, Clone)]
pub struct StepCatalog {
    steps: Vec<StepDefinition>,
}

impl StepCatalog {
    pub fn new(steps: Vec<StepDefinition>) -> FunnelResult<Self> {
        let mut seen = HashSet::with_capacity(steps.len());
        for step in &steps {
            if step.id.trim().is_empty() {
                return Err(FunnelError::Catalog("step with an empty id".to_string()));
            }
            if !seen.insert(step.id.as_str()) {
                return Err(FunnelError::Catalog(format!(
                    "duplicate step id '{}'",
                    step.id
                )));
            }
        }
        debug!(steps = steps.len(), "step catalog validated");
        Ok(Self { steps })
    }

    pub fn from_json(json: &str) -> FunnelResult<Self> {
        let steps: Vec<StepDefinition> = serde_json::from_str(json)?;
        Self::new(steps)
    }

    pub fn from_file(path: impl AsRef<Path>) -> FunnelResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let catalog = Self::from_json(&content)?;
        info!(path = %path.display(), steps = catalog.len(), "loaded step catalog");
        Ok(catalog)
    }

    /// The catalog compiled into the crate.
    pub fn builtin() -> FunnelResult<Self> {
        Self::from_json(BUILTIN_CATALOG)
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn get(&self, id: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.id.clone()).collect()
    }

    pub fn count_of(&self, step_type: StepType) -> usize {
        self.steps.iter().filter(|s| s.step_type == step_type).count()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
