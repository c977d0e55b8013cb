//! Goal and GoalResult types.

use crate::{GoalId, GoalStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A client request to move a kinematic group to its predefined pose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    /// Unique goal identifier.
    pub id: GoalId,

    /// Kinematic group to move; also names the predefined target pose.
    pub group_name: String,

    /// When the goal was submitted.
    pub submitted_at: DateTime<Utc>,
}

impl Goal {
    /// Create a new Goal for the given group.
    pub fn new(group_name: impl Into<String>) -> Self {
        Self {
            id: GoalId::generate(),
            group_name: group_name.into(),
            submitted_at: Utc::now(),
        }
    }
}

/// Why a goal did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Goal parameters were rejected.
    InvalidGoal,
    /// Stage wiring or model load failed.
    Initialization,
    /// No solution within the attempt budget.
    PlanningExhausted,
    /// The execution backend reported a non-success status.
    Execution,
    /// Controller operations were called out of order.
    Sequence,
    /// The client canceled the goal.
    Canceled,
    /// The execution flow aborted unexpectedly.
    Internal,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidGoal => "invalid_goal",
            Self::Initialization => "initialization",
            Self::PlanningExhausted => "planning_exhausted",
            Self::Execution => "execution",
            Self::Sequence => "sequence",
            Self::Canceled => "canceled",
            Self::Internal => "internal",
        }
    }
}

/// Terminal result of a goal, delivered exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalResult {
    /// Goal this result belongs to.
    pub goal_id: GoalId,

    /// Whether the robot reached the requested pose.
    pub success: bool,

    /// Terminal status.
    pub status: GoalStatus,

    /// Failure classification, if the goal did not succeed.
    pub reason: Option<FailureReason>,

    /// Human-readable diagnostic.
    pub message: Option<String>,

    /// When the result was produced.
    pub finished_at: DateTime<Utc>,
}

impl GoalResult {
    /// A successful result.
    pub fn succeeded(goal_id: GoalId) -> Self {
        Self {
            goal_id,
            success: true,
            status: GoalStatus::Succeeded,
            reason: None,
            message: None,
            finished_at: Utc::now(),
        }
    }

    /// A failed result with a reason and diagnostic.
    pub fn failed(goal_id: GoalId, reason: FailureReason, message: impl Into<String>) -> Self {
        let status = if reason == FailureReason::Canceled {
            GoalStatus::Canceled
        } else {
            GoalStatus::Failed
        };
        Self {
            goal_id,
            success: false,
            status,
            reason: Some(reason),
            message: Some(message.into()),
            finished_at: Utc::now(),
        }
    }

    /// A canceled result.
    pub fn canceled(goal_id: GoalId) -> Self {
        Self::failed(goal_id, FailureReason::Canceled, "goal canceled by client")
    }
}

/// Snapshot of a goal as tracked by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalRecord {
    pub goal_id: GoalId,
    pub group_name: String,
    pub status: GoalStatus,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub result: Option<GoalResult>,
}
