//! Status enums for Goals and the task execution controller.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a Goal in the goal server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GoalStatus {
    /// Goal received but not yet admitted.
    #[default]
    Submitted,
    /// Goal admitted, waiting for the shared controller.
    Accepted,
    /// Goal refused at submission.
    Rejected,
    /// Goal is being planned or executed.
    Executing,
    /// Motion completed successfully.
    Succeeded,
    /// Planning or execution failed.
    Failed,
    /// Goal was canceled by the client.
    Canceled,
}

impl GoalStatus {
    /// Returns true if the goal is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Rejected | Self::Succeeded | Self::Failed | Self::Canceled
        )
    }

    /// Returns true if the goal is still active (not terminal).
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Lowercase label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Executing => "executing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }

    /// Returns true if moving from `self` to `next` is a legal lifecycle step.
    pub fn can_transition_to(&self, next: GoalStatus) -> bool {
        use GoalStatus::{Accepted, Canceled, Executing, Failed, Rejected, Submitted, Succeeded};
        matches!(
            (self, next),
            (Submitted, Accepted)
                | (Submitted, Rejected)
                | (Accepted, Executing)
                | (Accepted, Failed)
                | (Accepted, Canceled)
                | (Executing, Succeeded)
                | (Executing, Failed)
                | (Executing, Canceled)
        )
    }
}

impl fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of the task held by the execution controller.
///
/// `Empty -> Built -> Initialized -> Planned -> Executed`, with `Failed`
/// reachable from every state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControllerState {
    #[default]
    Empty,
    Built,
    Initialized,
    Planned,
    Executed,
    Failed,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Empty => "empty",
            Self::Built => "built",
            Self::Initialized => "initialized",
            Self::Planned => "planned",
            Self::Executed => "executed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Decision on an incoming goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GoalResponse {
    /// Accept the goal and execute it.
    Accept,
    /// Refuse the goal.
    Reject {
        /// Reason for rejection
        reason: String,
    },
}

impl GoalResponse {
    /// Create a reject decision.
    pub fn reject(reason: impl Into<String>) -> Self {
        Self::Reject {
            reason: reason.into(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accept)
    }
}

/// Decision on a cancel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelResponse {
    Accept,
    Reject,
}

impl CancelResponse {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accept)
    }
}
