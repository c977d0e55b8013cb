//! Manipulation Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network transports
//! - Planning backends
//! - Runtime specifics
//!
//! All types here describe goals, motion stages, tasks and solutions as
//! the goal server sees them.

pub mod error;
pub mod event;
pub mod goal;
pub mod ids;
pub mod solution;
pub mod stage;
pub mod status;
pub mod task;

// Re-export commonly used types
pub use error::CoreError;
pub use event::{GoalEvent, GoalEventType};
pub use goal::{FailureReason, Goal, GoalRecord, GoalResult};
pub use ids::{GoalId, SolutionId};
pub use solution::{ExecutionStatus, JointWaypoint, Solution};
pub use stage::{SolverKind, Stage, StageKind};
pub use status::{CancelResponse, ControllerState, GoalResponse, GoalStatus};
pub use task::{Task, TaskTemplate};
