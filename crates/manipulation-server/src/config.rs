//! Goal server configuration.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::controller::SelectionOrder;
use crate::state::DEFAULT_RESULT_RETENTION;

/// What to do with a valid goal while another goal is active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AdmissionPolicy {
    /// Accept and run after the active goals finish.
    #[default]
    Queue,
    /// Reject while any goal is active.
    RejectWhenBusy,
}

impl FromStr for AdmissionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queue" => Ok(Self::Queue),
            "reject-when-busy" => Ok(Self::RejectWhenBusy),
            other => Err(format!(
                "unknown admission policy '{}' (expected queue or reject-when-busy)",
                other
            )),
        }
    }
}

impl fmt::Display for AdmissionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queue => f.write_str("queue"),
            Self::RejectWhenBusy => f.write_str("reject-when-busy"),
        }
    }
}

/// Parse a timeout given in seconds.
///
/// Rejects negative, infinite and NaN values.
pub fn parse_timeout_secs(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .trim()
        .parse()
        .map_err(|e| format!("invalid timeout '{}': {}", s, e))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid timeout '{}': {}", s, e))
}

/// Parse a `GROUP=SECONDS` timeout override.
pub fn parse_group_timeout(s: &str) -> Result<(String, Duration), String> {
    let (group, secs) = s
        .split_once('=')
        .ok_or_else(|| format!("expected GROUP=SECONDS, got '{}'", s))?;
    let group = group.trim();
    if group.is_empty() {
        return Err(format!("missing group name in '{}'", s));
    }
    Ok((group.to_string(), parse_timeout_secs(secs)?))
}

/// Goal server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server bind address.
    pub http_addr: String,

    /// Robot model descriptor handed to the planning backend.
    pub robot_model: String,

    /// Name given to every goal's task.
    pub task_name: String,

    /// Frame used for inverse kinematics.
    pub ik_frame: String,

    /// Groups goals may name.
    pub known_groups: Vec<String>,

    /// Timeout of the move stage.
    pub stage_timeout: Duration,

    /// Per-group overrides of `stage_timeout`.
    pub group_timeouts: BTreeMap<String, Duration>,

    /// Planning attempts per goal.
    pub max_planning_attempts: u32,

    /// Which end of the cost scale wins.
    pub selection_order: SelectionOrder,

    /// What to do with goals arriving while another is active.
    pub admission_policy: AdmissionPolicy,

    /// Goal flows allowed in flight at once.
    pub max_concurrent_goals: usize,

    /// Finished goals kept for result lookups.
    pub result_retention: usize,

    /// Simulated backend search time.
    pub sim_planning_delay: Duration,

    /// Simulated backend motion time.
    pub sim_execution_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: "127.0.0.1:50061".to_string(),
            robot_model: "robot_description".to_string(),
            task_name: "move to predefined".to_string(),
            ik_frame: "gripper_grasping_frame".to_string(),
            known_groups: vec!["arm_torso".to_string(), "gripper".to_string()],
            stage_timeout: Duration::from_secs_f64(8.0),
            group_timeouts: BTreeMap::new(),
            max_planning_attempts: 5,
            selection_order: SelectionOrder::HighestCost,
            admission_policy: AdmissionPolicy::Queue,
            max_concurrent_goals: 4,
            result_retention: DEFAULT_RESULT_RETENTION,
            sim_planning_delay: Duration::from_millis(200),
            sim_execution_delay: Duration::from_secs(1),
        }
    }
}
