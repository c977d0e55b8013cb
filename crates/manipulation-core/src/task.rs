//! Task and TaskTemplate types.

use crate::{Stage, StageKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Immutable task-level settings every goal's Task starts from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTemplate {
    /// Task name shown in introspection.
    pub name: String,

    /// Task-level properties (e.g. `ik_frame`).
    pub properties: HashMap<String, String>,
}

impl TaskTemplate {
    /// Create a new template.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: HashMap::new(),
        }
    }

    /// Builder method to add a property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Create a fresh, empty Task from this template.
    pub fn instantiate(&self) -> Task {
        Task {
            name: self.name.clone(),
            properties: self.properties.clone(),
            stages: Vec::new(),
        }
    }
}

/// An ordered pipeline of Stages for one goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    name: String,
    properties: HashMap<String, String>,
    stages: Vec<Stage>,
}

impl Task {
    /// Create an empty task with no properties.
    pub fn new(name: impl Into<String>) -> Self {
        TaskTemplate::new(name).instantiate()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get a task-level property.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Append a stage. Order of `add` calls is the motion order.
    pub fn add(&mut self, stage: Stage) {
        self.stages.push(stage);
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Drop all stages, keeping name and properties.
    pub fn clear(&mut self) {
        self.stages.clear();
    }

    /// Names of the stages in order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(Stage::name).collect()
    }

    /// Upper bound for one planning attempt: the sum of stage timeouts.
    pub fn planning_budget(&self) -> Duration {
        self.stages.iter().map(Stage::timeout).sum()
    }

    /// Groups moved by this task, in stage order.
    pub fn move_groups(&self) -> impl Iterator<Item = &str> {
        self.stages
            .iter()
            .filter(|s| s.kind() == StageKind::MoveTo)
            .filter_map(Stage::group)
    }
}
