//! Simulated planning backend.
//!
//! Plans straight joint-space interpolations between the simulated robot's
//! current joint state and named poses, and "executes" a solution by
//! committing its end state. Used by the server binary when no hardware
//! backend is attached, and by tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use manipulation_core::{
    ExecutionStatus, JointWaypoint, Solution, SolutionId, StageKind, Task,
};

use super::{PlannerBackend, PlannerError};

/// Waypoints generated per move segment (excluding the start point).
const SEGMENT_STEPS: u32 = 10;

/// Shortest duration given to any move segment.
const MIN_SEGMENT_SECS: f64 = 0.1;

/// Weight of trajectory duration (seconds) in the solution cost.
const DURATION_COST_WEIGHT: f64 = 0.1;

/// Simulated joint-interpolation planner with an in-memory robot state.
pub struct SimulatedPlanner {
    /// Named poses per group: group -> target -> joint positions.
    poses: HashMap<String, HashMap<String, Vec<f64>>>,
    /// Current joint state of every group.
    world: Mutex<HashMap<String, Vec<f64>>>,
    /// Loaded robot model descriptor.
    model: Mutex<Option<String>>,
    /// End states of the candidates from the last planning search.
    pending: Mutex<HashMap<SolutionId, Vec<(String, Vec<f64>)>>>,
    /// One candidate is produced per velocity scaling factor.
    velocity_scalings: Vec<f64>,
    /// Joint velocity limit at scaling 1.0 (rad/s).
    max_joint_velocity: f64,
    planning_delay: Duration,
    execution_delay: Duration,
    next_id: AtomicU64,
}

impl SimulatedPlanner {
    /// Create a planner with the default `arm_torso` and `gripper` poses.
    pub fn new() -> Self {
        let home = vec![0.15, 0.20, -1.34, -0.20, 1.94, -1.57, 1.37, 0.0];
        let open = vec![0.044, 0.044];

        Self::empty()
            .with_group("arm_torso", vec![0.0; 8])
            .with_pose("arm_torso", "arm_torso", home.clone())
            .with_pose("arm_torso", "home", home)
            .with_group("gripper", vec![0.0; 2])
            .with_pose("gripper", "gripper", open.clone())
            .with_pose("gripper", "open", open)
            .with_pose("gripper", "closed", vec![0.0, 0.0])
    }

    /// Create a planner that knows no groups.
    pub fn empty() -> Self {
        Self {
            poses: HashMap::new(),
            world: Mutex::new(HashMap::new()),
            model: Mutex::new(None),
            pending: Mutex::new(HashMap::new()),
            velocity_scalings: vec![1.0, 0.5],
            max_joint_velocity: 1.0,
            planning_delay: Duration::ZERO,
            execution_delay: Duration::ZERO,
            next_id: AtomicU64::new(1),
        }
    }

    /// Builder method to add a group with its initial joint state.
    pub fn with_group(self, group: impl Into<String>, initial: Vec<f64>) -> Self {
        lock(&self.world).insert(group.into(), initial);
        self
    }

    /// Builder method to add a named pose for a group.
    pub fn with_pose(
        mut self,
        group: impl Into<String>,
        target: impl Into<String>,
        positions: Vec<f64>,
    ) -> Self {
        self.poses
            .entry(group.into())
            .or_default()
            .insert(target.into(), positions);
        self
    }

    /// Builder method to set the simulated search time.
    pub fn with_planning_delay(mut self, delay: Duration) -> Self {
        self.planning_delay = delay;
        self
    }

    /// Builder method to set the simulated motion time.
    pub fn with_execution_delay(mut self, delay: Duration) -> Self {
        self.execution_delay = delay;
        self
    }

    /// Builder method to set the velocity scalings candidates are planned at.
    ///
    /// Factors that are not finite and positive are ignored.
    pub fn with_velocity_scalings(mut self, scalings: Vec<f64>) -> Self {
        self.velocity_scalings = scalings
            .into_iter()
            .filter(|s| s.is_finite() && *s > 0.0)
            .collect();
        self
    }

    /// Current joint positions of a group.
    pub fn current_positions(&self, group: &str) -> Option<Vec<f64>> {
        lock(&self.world).get(group).cloned()
    }

    fn target_positions(&self, group: &str, target: &str) -> Result<&Vec<f64>, PlannerError> {
        self.poses
            .get(group)
            .and_then(|targets| targets.get(target))
            .ok_or_else(|| PlannerError::UnknownTarget {
                group: group.to_string(),
                target: target.to_string(),
            })
    }

    /// Interpolate every move stage of `task` at one velocity scaling.
    fn interpolate(
        &self,
        task: &Task,
        scaling: f64,
    ) -> Result<(Solution, Vec<(String, Vec<f64>)>), PlannerError> {
        let mut state = lock(&self.world).clone();
        let mut waypoints = Vec::new();
        let mut end_states = Vec::new();
        let mut distance = 0.0;
        let mut elapsed = 0.0;

        for stage in task.stages() {
            if stage.kind() != StageKind::MoveTo {
                continue;
            }
            let (group, target) = match (stage.group(), stage.target()) {
                (Some(g), Some(t)) => (g, t),
                _ => {
                    return Err(PlannerError::Search(format!(
                        "stage '{}' has no group or target",
                        stage.name()
                    )))
                }
            };
            let goal = self.target_positions(group, target)?;
            let start = state
                .get(group)
                .cloned()
                .ok_or_else(|| PlannerError::Search(format!("no joint state for group '{}'", group)))?;
            if start.len() != goal.len() {
                return Err(PlannerError::Search(format!(
                    "pose '{}' has {} joints, group '{}' has {}",
                    target,
                    goal.len(),
                    group,
                    start.len()
                )));
            }

            let max_delta = start
                .iter()
                .zip(goal)
                .map(|(a, b)| (b - a).abs())
                .fold(0.0, f64::max);
            distance += start.iter().zip(goal).map(|(a, b)| (b - a).abs()).sum::<f64>();

            let segment_secs =
                (max_delta / (self.max_joint_velocity * scaling)).max(MIN_SEGMENT_SECS);
            for step in 0..=SEGMENT_STEPS {
                let fraction = f64::from(step) / f64::from(SEGMENT_STEPS);
                let positions = start
                    .iter()
                    .zip(goal)
                    .map(|(a, b)| a + (b - a) * fraction)
                    .collect();
                waypoints.push(JointWaypoint {
                    positions,
                    time_from_start: Duration::from_secs_f64(elapsed + segment_secs * fraction),
                });
            }
            elapsed += segment_secs;

            state.insert(group.to_string(), goal.clone());
            end_states.push((group.to_string(), goal.clone()));
        }

        let id = SolutionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let cost = distance + DURATION_COST_WEIGHT * elapsed;
        Ok((Solution::new(id, cost, waypoints), end_states))
    }
}

impl Default for SimulatedPlanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlannerBackend for SimulatedPlanner {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn load_model(&self, descriptor: &str) -> Result<(), PlannerError> {
        if descriptor.trim().is_empty() {
            return Err(PlannerError::ModelLoad {
                descriptor: descriptor.to_string(),
                reason: "empty descriptor".to_string(),
            });
        }
        info!(model = %descriptor, groups = self.poses.len(), "Loaded simulated robot model");
        *lock(&self.model) = Some(descriptor.to_string());
        Ok(())
    }

    async fn init(&self, task: &Task) -> Result<(), PlannerError> {
        if lock(&self.model).is_none() {
            return Err(PlannerError::ModelNotLoaded);
        }
        for stage in task.stages() {
            if stage.kind() != StageKind::MoveTo {
                continue;
            }
            if stage.solver().is_none() {
                return Err(PlannerError::Init(format!(
                    "stage '{}' has no solver",
                    stage.name()
                )));
            }
            let group = stage.group().unwrap_or_default();
            let target = stage.target().unwrap_or_default();
            self.target_positions(group, target)?;
        }
        Ok(())
    }

    async fn plan(&self, task: &Task) -> Result<Vec<Solution>, PlannerError> {
        if lock(&self.model).is_none() {
            return Err(PlannerError::ModelNotLoaded);
        }
        if !self.planning_delay.is_zero() {
            tokio::time::sleep(self.planning_delay).await;
        }

        let mut solutions = Vec::with_capacity(self.velocity_scalings.len());
        let mut pending = HashMap::new();
        for &scaling in &self.velocity_scalings {
            let (solution, end_states) = self.interpolate(task, scaling)?;
            debug!(
                solution = %solution.id(),
                cost = solution.cost(),
                scaling,
                "Simulated candidate"
            );
            pending.insert(solution.id(), end_states);
            solutions.push(solution);
        }
        *lock(&self.pending) = pending;
        Ok(solutions)
    }

    async fn execute(&self, solution: &Solution) -> Result<ExecutionStatus, PlannerError> {
        let end_states = match lock(&self.pending).remove(&solution.id()) {
            Some(states) => states,
            None => return Ok(ExecutionStatus::INVALID_MOTION_PLAN),
        };
        if !self.execution_delay.is_zero() {
            tokio::time::sleep(self.execution_delay).await;
        }

        let mut world = lock(&self.world);
        for (group, positions) in end_states {
            world.insert(group, positions);
        }
        // Remaining candidates started from the old state.
        lock(&self.pending).clear();
        Ok(ExecutionStatus::SUCCESS)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
