//! Introspection sink for planned solutions.

use thiserror::Error;
use tokio::sync::broadcast;

use manipulation_core::{GoalEvent, GoalId, Solution, Task};

/// Errors from publishing to an introspection sink.
#[derive(Debug, Error)]
pub enum IntrospectionError {
    #[error("No introspection subscribers")]
    NoSubscribers,
}

/// Receives the best solution of every successful planning run.
///
/// Publishing is fire-and-forget: callers log failures and carry on.
pub trait IntrospectionSink: Send + Sync {
    fn publish_solution(
        &self,
        goal_id: &GoalId,
        task: &Task,
        solution: &Solution,
    ) -> Result<(), IntrospectionError>;
}

/// Publishes solutions as [`GoalEvent`]s on the server's event channel.
pub struct BroadcastIntrospection {
    tx: broadcast::Sender<GoalEvent>,
}

impl BroadcastIntrospection {
    pub fn new(tx: broadcast::Sender<GoalEvent>) -> Self {
        Self { tx }
    }
}

impl IntrospectionSink for BroadcastIntrospection {
    fn publish_solution(
        &self,
        goal_id: &GoalId,
        task: &Task,
        solution: &Solution,
    ) -> Result<(), IntrospectionError> {
        let event = GoalEvent::solution_published(goal_id.clone(), task.name(), solution);
        self.tx
            .send(event)
            .map(|_| ())
            .map_err(|_| IntrospectionError::NoSubscribers)
    }
}
