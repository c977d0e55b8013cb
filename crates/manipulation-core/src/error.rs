//! Core domain errors.

use thiserror::Error;

/// Core domain errors for the goal server.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Goal parameters are malformed or name an unsupported group.
    #[error("Invalid goal: {0}")]
    InvalidGoal(String),

    /// Goal not found.
    #[error("Goal not found: {0}")]
    GoalNotFound(String),

    /// Invalid state transition.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    /// Stage wiring is malformed.
    #[error("Invalid stage sequence: {0}")]
    InvalidStageSequence(String),
}
