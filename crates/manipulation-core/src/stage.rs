//! Motion stages: the units of planning work inside a Task.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What a stage contributes to the motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Anchors the pipeline at the robot's current state.
    CurrentState,
    /// Moves a group to a named target pose.
    MoveTo,
}

/// Planning strategy a stage asks the backend for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverKind {
    /// Straight interpolation in joint space.
    #[default]
    JointInterpolation,
}

/// A named unit of planning work.
///
/// Stages have no setters: once a stage is added to a Task it is only
/// reachable by shared reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    name: String,
    kind: StageKind,
    group: Option<String>,
    target: Option<String>,
    timeout: Duration,
    solver: Option<SolverKind>,
}

impl Stage {
    /// Anchor stage representing the robot's current state.
    pub fn current_state(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: StageKind::CurrentState,
            group: None,
            target: None,
            timeout: Duration::ZERO,
            solver: None,
        }
    }

    /// Stage moving `group` to the named `target` pose using `solver`.
    pub fn move_to(
        name: impl Into<String>,
        group: impl Into<String>,
        target: impl Into<String>,
        solver: SolverKind,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            kind: StageKind::MoveTo,
            group: Some(group.into()),
            target: Some(target.into()),
            timeout,
            solver: Some(solver),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StageKind {
        self.kind
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn solver(&self) -> Option<SolverKind> {
        self.solver
    }

    pub fn is_anchor(&self) -> bool {
        self.kind == StageKind::CurrentState
    }
}
