//! Goal service implementation.

mod goal_service;

pub use goal_service::{GoalError, GoalLifecycleManager};
