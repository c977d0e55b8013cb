//! Planning solutions and execution status codes.

use crate::SolutionId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One point of a joint-space trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointWaypoint {
    /// Joint positions (radians / meters), in the group's joint order.
    pub positions: Vec<f64>,

    /// Offset from trajectory start.
    pub time_from_start: Duration,
}

/// A scored, executable candidate motion plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    id: SolutionId,
    cost: f64,
    trajectory: Vec<JointWaypoint>,
    valid: bool,
}

impl Solution {
    /// Create a valid solution.
    pub fn new(id: SolutionId, cost: f64, trajectory: Vec<JointWaypoint>) -> Self {
        Self {
            id,
            cost,
            trajectory,
            valid: true,
        }
    }

    /// Create a solution the backend flagged as invalid.
    pub fn invalid(id: SolutionId, cost: f64) -> Self {
        Self {
            id,
            cost,
            trajectory: Vec::new(),
            valid: false,
        }
    }

    pub fn id(&self) -> SolutionId {
        self.id
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn trajectory(&self) -> &[JointWaypoint] {
        &self.trajectory
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Duration of the trajectory (time of the last waypoint).
    pub fn duration(&self) -> Duration {
        self.trajectory
            .last()
            .map(|w| w.time_from_start)
            .unwrap_or_default()
    }
}

/// Terminal status code reported by the execution backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionStatus(i32);

impl ExecutionStatus {
    pub const SUCCESS: Self = Self(1);
    pub const FAILURE: Self = Self(99999);
    pub const PLANNING_FAILED: Self = Self(-1);
    pub const INVALID_MOTION_PLAN: Self = Self(-2);
    pub const CONTROL_FAILED: Self = Self(-4);
    pub const TIMED_OUT: Self = Self(-6);
    pub const PREEMPTED: Self = Self(-7);

    pub fn new(code: i32) -> Self {
        Self(code)
    }

    pub fn code(&self) -> i32 {
        self.0
    }

    pub fn is_success(&self) -> bool {
        *self == Self::SUCCESS
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Self::SUCCESS => "SUCCESS",
            Self::FAILURE => "FAILURE",
            Self::PLANNING_FAILED => "PLANNING_FAILED",
            Self::INVALID_MOTION_PLAN => "INVALID_MOTION_PLAN",
            Self::CONTROL_FAILED => "CONTROL_FAILED",
            Self::TIMED_OUT => "TIMED_OUT",
            Self::PREEMPTED => "PREEMPTED",
            _ => return write!(f, "code {}", self.0),
        };
        write!(f, "{} ({})", name, self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solution_duration() {
        let trajectory = vec![
            JointWaypoint {
                positions: vec![0.0, 0.0],
                time_from_start: Duration::ZERO,
            },
            JointWaypoint {
                positions: vec![0.5, 1.0],
                time_from_start: Duration::from_millis(1500),
            },
        ];
        let solution = Solution::new(SolutionId::new(1), 3.0, trajectory);
        assert!(solution.is_valid());
        assert_eq!(solution.duration(), Duration::from_millis(1500));
        assert!(!Solution::invalid(SolutionId::new(2), 1.0).is_valid());
    }

    #[test]
    fn test_execution_status() {
        assert!(ExecutionStatus::SUCCESS.is_success());
        assert!(!ExecutionStatus::CONTROL_FAILED.is_success());
        assert_eq!(ExecutionStatus::TIMED_OUT.to_string(), "TIMED_OUT (-6)");
        assert_eq!(ExecutionStatus::new(42).to_string(), "code 42");
    }
}
