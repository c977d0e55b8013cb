//! Task graph builder - turns a goal into motion stages.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use tracing::debug;

use manipulation_core::{CoreError, Goal, SolverKind, Stage, Task};

/// Name of the anchor stage.
pub const CURRENT_STATE_STAGE: &str = "current";

/// Name of the move stage.
pub const PREDEFINED_POSITION_STAGE: &str = "predefined_position";

/// Builds the fixed two-stage pipeline for a goal:
/// current state, then a move of the goal's group to its predefined pose.
#[derive(Debug, Clone)]
pub struct TaskGraphBuilder {
    known_groups: BTreeSet<String>,
    stage_timeout: Duration,
    group_timeouts: BTreeMap<String, Duration>,
}

impl TaskGraphBuilder {
    /// Create a builder accepting the given groups.
    pub fn new<I, S>(known_groups: I, stage_timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            known_groups: known_groups.into_iter().map(Into::into).collect(),
            stage_timeout,
            group_timeouts: BTreeMap::new(),
        }
    }

    /// Builder method to give one group's move stage its own timeout.
    pub fn with_group_timeout(mut self, group: impl Into<String>, timeout: Duration) -> Self {
        self.group_timeouts.insert(group.into(), timeout);
        self
    }

    /// Move stage timeout used for `group`.
    pub fn stage_timeout(&self, group: &str) -> Duration {
        self.group_timeouts
            .get(group)
            .copied()
            .unwrap_or(self.stage_timeout)
    }

    pub fn known_groups(&self) -> impl Iterator<Item = &str> {
        self.known_groups.iter().map(String::as_str)
    }

    /// Check that a goal names a known, non-empty group.
    pub fn validate(&self, goal: &Goal) -> Result<(), CoreError> {
        if goal.group_name.trim().is_empty() {
            return Err(CoreError::InvalidGoal("group_name is required".to_string()));
        }
        if !self.known_groups.contains(&goal.group_name) {
            return Err(CoreError::InvalidGoal(format!(
                "unknown group '{}'",
                goal.group_name
            )));
        }
        Ok(())
    }

    /// Append the goal's stages to an empty task.
    pub fn build(&self, task: &mut Task, goal: &Goal) -> Result<(), CoreError> {
        self.validate(goal)?;
        if !task.is_empty() {
            return Err(CoreError::InvalidStageSequence(format!(
                "task '{}' still holds {} stage(s) from a previous goal",
                task.name(),
                task.len()
            )));
        }

        task.add(Stage::current_state(CURRENT_STATE_STAGE));
        task.add(Stage::move_to(
            PREDEFINED_POSITION_STAGE,
            goal.group_name.as_str(),
            goal.group_name.as_str(),
            SolverKind::JointInterpolation,
            self.stage_timeout(&goal.group_name),
        ));

        debug!(
            goal_id = %goal.id,
            group = %goal.group_name,
            stages = ?task.stage_names(),
            "Built task stages"
        );
        Ok(())
    }
}
