//! Planning backend capability.
//!
//! The goal server never plans or moves the robot itself. Kinematics,
//! collision checking and trajectory execution live behind the
//! [`PlannerBackend`] trait; the controller only sequences calls into it.

pub mod sim;

use async_trait::async_trait;
use thiserror::Error;

use manipulation_core::{ExecutionStatus, Solution, Task};

pub use sim::SimulatedPlanner;

/// Errors reported by a planning backend.
#[derive(Debug, Error)]
pub enum PlannerError {
    /// No robot model has been loaded yet.
    #[error("Robot model not loaded")]
    ModelNotLoaded,

    /// The robot model descriptor could not be loaded.
    #[error("Failed to load robot model '{descriptor}': {reason}")]
    ModelLoad { descriptor: String, reason: String },

    /// A stage names a group or target the model does not know.
    #[error("Unknown target '{target}' for group '{group}'")]
    UnknownTarget { group: String, target: String },

    /// Stage initialization failed inside the backend.
    #[error("Stage initialization failed: {0}")]
    Init(String),

    /// The planning search itself failed.
    #[error("Planning search failed: {0}")]
    Search(String),

    /// The execution backend could not be reached.
    #[error("Execution backend error: {0}")]
    Execution(String),
}

/// Opaque motion-planning and execution capability.
///
/// Implementations must be safe to share across goal flows; the server
/// guarantees that at most one flow calls into a backend at a time.
#[async_trait]
pub trait PlannerBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Load the robot model described by `descriptor`.
    async fn load_model(&self, descriptor: &str) -> Result<(), PlannerError>;

    /// Prepare the backend for planning `task` (resolve groups, targets, solvers).
    async fn init(&self, task: &Task) -> Result<(), PlannerError>;

    /// Run one planning search over the whole task.
    ///
    /// Returns every candidate found, in no particular order. An empty
    /// vector means the search found nothing.
    async fn plan(&self, task: &Task) -> Result<Vec<Solution>, PlannerError>;

    /// Execute a solution on the robot and wait for its terminal status.
    async fn execute(&self, solution: &Solution) -> Result<ExecutionStatus, PlannerError>;
}
