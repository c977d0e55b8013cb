//! Goal lifecycle events for observers and introspection.

use crate::{GoalId, GoalStatus, Solution};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An event emitted while a goal moves through its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalEvent {
    /// Goal this event belongs to.
    pub goal_id: GoalId,
    /// Type of event.
    pub event_type: GoalEventType,
    /// Unix timestamp (milliseconds) when event occurred.
    pub timestamp_ms: i64,
    /// Event-specific metadata (group, cost, error, etc.).
    pub metadata: HashMap<String, String>,
}

impl GoalEvent {
    /// Create a new goal event.
    pub fn new(
        goal_id: GoalId,
        event_type: GoalEventType,
        metadata: HashMap<String, String>,
    ) -> Self {
        Self {
            goal_id,
            event_type,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            metadata,
        }
    }

    /// Create an Accepted event.
    pub fn accepted(goal_id: GoalId, group_name: &str) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert("group".to_string(), group_name.to_string());
        Self::new(goal_id, GoalEventType::Accepted, metadata)
    }

    /// Create a Rejected event.
    pub fn rejected(goal_id: GoalId, reason: &str) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert("reason".to_string(), reason.to_string());
        Self::new(goal_id, GoalEventType::Rejected, metadata)
    }

    /// Create an Executing event.
    pub fn executing(goal_id: GoalId) -> Self {
        Self::new(goal_id, GoalEventType::Executing, HashMap::new())
    }

    /// Create a SolutionPublished event for the chosen solution.
    pub fn solution_published(goal_id: GoalId, task_name: &str, solution: &Solution) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert("task".to_string(), task_name.to_string());
        metadata.insert("solution".to_string(), solution.id().to_string());
        metadata.insert("cost".to_string(), solution.cost().to_string());
        metadata.insert(
            "waypoints".to_string(),
            solution.trajectory().len().to_string(),
        );
        Self::new(goal_id, GoalEventType::SolutionPublished, metadata)
    }

    /// Create a Finished event.
    pub fn finished(goal_id: GoalId, status: GoalStatus, message: Option<&str>) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert("status".to_string(), status.to_string());
        if let Some(m) = message {
            metadata.insert("message".to_string(), m.to_string());
        }
        Self::new(goal_id, GoalEventType::Finished, metadata)
    }
}

/// Type of goal event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GoalEventType {
    /// Goal admitted.
    Accepted,
    /// Goal refused at submission.
    Rejected,
    /// Goal acquired the controller and started planning.
    Executing,
    /// Best solution published for introspection.
    SolutionPublished,
    /// Terminal result delivered.
    Finished,
}
