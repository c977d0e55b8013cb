//! Manipulation Goal Server Library
//!
//! Accepts "move group to its predefined pose" goals, plans them through a
//! [`PlannerBackend`](planner::PlannerBackend) and executes the best
//! solution, one goal at a time.

pub mod builder;
pub mod config;
pub mod controller;
pub mod http;
pub mod introspection;
pub mod metrics;
pub mod planner;
pub mod service;
pub mod state;

#[cfg(test)]
mod testing;

pub use builder::TaskGraphBuilder;
pub use config::{AdmissionPolicy, Config};
pub use controller::{ControllerError, SelectionOrder, TaskExecutionController};
pub use planner::{PlannerBackend, PlannerError, SimulatedPlanner};
pub use service::{GoalError, GoalLifecycleManager};
pub use state::AppState;
