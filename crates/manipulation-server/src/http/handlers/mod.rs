//! HTTP request handlers.

mod goals;
mod health;

pub use goals::{cancel_goal, get_goal, get_result, list_goals, submit_goal};
pub use health::{health_check, metrics_handler};
