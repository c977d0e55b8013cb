//! Task execution controller.
//!
//! Owns the task of the goal currently holding the planner and drives it
//! through `Empty -> Built -> Initialized -> Planned -> Executed`. Every
//! operation checks the current state first; calling one out of order is a
//! [`ControllerError::Sequence`] and leaves the state untouched.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use manipulation_core::{
    ControllerState, ExecutionStatus, FailureReason, GoalId, Solution, SolutionId, StageKind, Task,
};

use crate::introspection::IntrospectionSink;
use crate::planner::PlannerBackend;

/// Controller errors.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Stage wiring or backend initialization failed.
    #[error("Initialization failed: {0}")]
    Initialization(String),

    /// The execution backend reported a non-success status.
    #[error("Execution failed with status {status}: {detail}")]
    Execution {
        status: ExecutionStatus,
        detail: String,
    },

    /// An operation was called in the wrong state.
    #[error("Cannot {operation} while controller is {state}")]
    Sequence {
        operation: &'static str,
        state: ControllerState,
    },

    /// `execute` was given a solution the last plan did not produce.
    #[error("Solution {0} was not produced by the current plan")]
    ForeignSolution(SolutionId),

    /// The goal was canceled at a stage boundary.
    #[error("Canceled")]
    Canceled,
}

impl ControllerError {
    /// How this error is reported in a goal result.
    pub fn failure_reason(&self) -> FailureReason {
        match self {
            Self::Initialization(_) => FailureReason::Initialization,
            Self::Execution { .. } => FailureReason::Execution,
            Self::Sequence { .. } | Self::ForeignSolution(_) => FailureReason::Sequence,
            Self::Canceled => FailureReason::Canceled,
        }
    }
}

/// Which end of the cost scale wins when picking a solution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelectionOrder {
    /// Highest cost first.
    #[default]
    HighestCost,
    /// Lowest cost first.
    LowestCost,
}

impl FromStr for SelectionOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "highest-cost" => Ok(Self::HighestCost),
            "lowest-cost" => Ok(Self::LowestCost),
            other => Err(format!(
                "unknown selection order '{}' (expected highest-cost or lowest-cost)",
                other
            )),
        }
    }
}

impl fmt::Display for SelectionOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HighestCost => f.write_str("highest-cost"),
            Self::LowestCost => f.write_str("lowest-cost"),
        }
    }
}

/// Order `solutions` best-first. The sort is stable, so equal costs keep
/// the order the planner produced them in. Solutions without a finite cost
/// are left out.
pub fn rank_solutions(solutions: &[Solution], order: SelectionOrder) -> Vec<&Solution> {
    let mut ranked: Vec<&Solution> = solutions.iter().filter(|s| s.cost().is_finite()).collect();
    match order {
        SelectionOrder::HighestCost => ranked.sort_by(|a, b| b.cost().total_cmp(&a.cost())),
        SelectionOrder::LowestCost => ranked.sort_by(|a, b| a.cost().total_cmp(&b.cost())),
    }
    ranked
}

/// Drives one task at a time against the shared planning backend.
pub struct TaskExecutionController {
    backend: Arc<dyn PlannerBackend>,
    introspection: Arc<dyn IntrospectionSink>,
    selection: SelectionOrder,
    state: ControllerState,
    goal_id: Option<GoalId>,
    task: Option<Task>,
    solutions: Vec<Solution>,
}

impl TaskExecutionController {
    /// Create a new controller in the `Empty` state.
    pub fn new(
        backend: Arc<dyn PlannerBackend>,
        introspection: Arc<dyn IntrospectionSink>,
        selection: SelectionOrder,
    ) -> Self {
        Self {
            backend,
            introspection,
            selection,
            state: ControllerState::Empty,
            goal_id: None,
            task: None,
            solutions: Vec::new(),
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn task(&self) -> Option<&Task> {
        self.task.as_ref()
    }

    pub fn solutions(&self) -> &[Solution] {
        &self.solutions
    }

    pub fn selection_order(&self) -> SelectionOrder {
        self.selection
    }

    /// Drop the task and all solutions and return to `Empty`.
    pub fn reset(&mut self) {
        self.state = ControllerState::Empty;
        self.goal_id = None;
        self.task = None;
        self.solutions.clear();
    }

    /// Take ownership of a freshly built task for `goal_id`.
    pub fn load(&mut self, goal_id: GoalId, task: Task) -> Result<(), ControllerError> {
        self.expect_state("load a task", ControllerState::Empty)?;
        if task.is_empty() {
            self.state = ControllerState::Failed;
            return Err(ControllerError::Initialization(
                "task has no stages".to_string(),
            ));
        }
        debug!(goal_id = %goal_id, task = %task.name(), stages = task.len(), "Task loaded");
        self.goal_id = Some(goal_id);
        self.task = Some(task);
        self.state = ControllerState::Built;
        Ok(())
    }

    /// Validate stage wiring and initialize the backend for the task.
    pub async fn initialize(&mut self) -> Result<(), ControllerError> {
        self.expect_state("initialize", ControllerState::Built)?;
        let task = match self.task.as_ref() {
            Some(task) => task,
            None => return Err(self.sequence_error("initialize")),
        };

        let checked = match validate_wiring(task) {
            Ok(()) => self.backend.init(task).await.map_err(|e| e.to_string()),
            Err(e) => Err(e),
        };
        match checked {
            Ok(()) => {
                info!(task = %task.name(), stages = ?task.stage_names(), "Task initialized");
                self.state = ControllerState::Initialized;
                Ok(())
            }
            Err(diagnostic) => {
                self.state = ControllerState::Failed;
                Err(ControllerError::Initialization(diagnostic))
            }
        }
    }

    /// Search for solutions, trying at most `max_attempts` times.
    ///
    /// Returns the number of valid solutions found. Zero is a normal
    /// outcome: the attempt budget was spent without a plan, and the
    /// controller moves to `Failed`.
    pub async fn plan(
        &mut self,
        max_attempts: u32,
        cancel: &CancellationToken,
    ) -> Result<usize, ControllerError> {
        self.expect_state("plan", ControllerState::Initialized)?;
        let task = match self.task.clone() {
            Some(task) => task,
            None => return Err(self.sequence_error("plan")),
        };
        let budget = task.planning_budget();
        let backend = Arc::clone(&self.backend);

        let mut found = Vec::new();
        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                self.state = ControllerState::Failed;
                return Err(ControllerError::Canceled);
            }

            let outcome = tokio::select! {
                _ = cancel.cancelled() => None,
                result = tokio::time::timeout(budget, backend.plan(&task)) => Some(result),
            };
            match outcome {
                None => {
                    info!(attempt, "Planning interrupted by cancel request");
                    self.state = ControllerState::Failed;
                    return Err(ControllerError::Canceled);
                }
                Some(Ok(Ok(solutions))) => {
                    let total = solutions.len();
                    let valid: Vec<Solution> = solutions
                        .into_iter()
                        .filter(|s| s.is_valid() && s.cost().is_finite())
                        .collect();
                    if !valid.is_empty() {
                        info!(attempt, solutions = valid.len(), "Planning attempt found solutions");
                        found = valid;
                        break;
                    }
                    debug!(attempt, candidates = total, "Planning attempt found no valid solution");
                }
                Some(Ok(Err(e))) => {
                    warn!(attempt, error = %e, "Planning attempt failed");
                }
                Some(Err(_)) => {
                    warn!(
                        attempt,
                        budget_ms = budget.as_millis() as u64,
                        "Planning attempt timed out"
                    );
                }
            }
        }

        if found.is_empty() {
            warn!(max_attempts, "Planning exhausted without a solution");
            self.state = ControllerState::Failed;
            return Ok(0);
        }

        self.solutions = found;
        self.state = ControllerState::Planned;
        self.publish_best();
        Ok(self.solutions.len())
    }

    /// Pick the best solution of the last plan.
    ///
    /// Deterministic for a given solution set: repeated calls return the
    /// same solution.
    pub fn select_best_solution(&self) -> Result<Option<Solution>, ControllerError> {
        self.expect_state("select a solution", ControllerState::Planned)?;
        Ok(rank_solutions(&self.solutions, self.selection)
            .first()
            .map(|s| (*s).clone()))
    }

    /// Execute a solution of the last plan and wait for the backend's status.
    ///
    /// Cancellation is honored up to the moment the trajectory is handed to
    /// the backend; motion already dispatched runs to completion.
    pub async fn execute(
        &mut self,
        solution: &Solution,
        cancel: &CancellationToken,
    ) -> Result<ExecutionStatus, ControllerError> {
        self.expect_state("execute", ControllerState::Planned)?;
        if !self.solutions.iter().any(|s| s.id() == solution.id()) {
            return Err(ControllerError::ForeignSolution(solution.id()));
        }
        if cancel.is_cancelled() {
            self.state = ControllerState::Failed;
            return Err(ControllerError::Canceled);
        }

        info!(
            solution = %solution.id(),
            cost = solution.cost(),
            waypoints = solution.trajectory().len(),
            "Sending plan to execute"
        );
        let status = match self.backend.execute(solution).await {
            Ok(status) => status,
            Err(e) => {
                self.state = ControllerState::Failed;
                return Err(ControllerError::Execution {
                    status: ExecutionStatus::FAILURE,
                    detail: e.to_string(),
                });
            }
        };

        if !status.is_success() {
            self.state = ControllerState::Failed;
            return Err(ControllerError::Execution {
                status,
                detail: "backend reported non-success status".to_string(),
            });
        }
        self.state = ControllerState::Executed;
        Ok(status)
    }

    fn publish_best(&self) {
        let (Some(goal_id), Some(task)) = (self.goal_id.as_ref(), self.task.as_ref()) else {
            return;
        };
        if let Some(best) = rank_solutions(&self.solutions, self.selection).first() {
            if let Err(e) = self.introspection.publish_solution(goal_id, task, best) {
                debug!(goal_id = %goal_id, error = %e, "Solution not published");
            }
        }
    }

    fn expect_state(
        &self,
        operation: &'static str,
        expected: ControllerState,
    ) -> Result<(), ControllerError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(self.sequence_error(operation))
        }
    }

    fn sequence_error(&self, operation: &'static str) -> ControllerError {
        ControllerError::Sequence {
            operation,
            state: self.state,
        }
    }
}

/// Check that the anchor stage comes first, appears once, and that every
/// move stage is fully specified.
fn validate_wiring(task: &Task) -> Result<(), String> {
    let stages = task.stages();
    match stages.first() {
        None => return Err("task has no stages".to_string()),
        Some(first) if first.kind() != StageKind::CurrentState => {
            return Err(format!(
                "stage '{}' must be preceded by a current state stage",
                first.name()
            ))
        }
        Some(_) => {}
    }
    if let Some(extra) = stages.iter().skip(1).find(|s| s.is_anchor()) {
        return Err(format!(
            "current state stage '{}' must be the first stage",
            extra.name()
        ));
    }
    if stages.len() < 2 {
        return Err("task has no move stage after the current state".to_string());
    }
    for stage in stages.iter().filter(|s| s.kind() == StageKind::MoveTo) {
        if stage.group().map_or(true, str::is_empty) || stage.target().map_or(true, str::is_empty)
        {
            return Err(format!("stage '{}' has no group or target", stage.name()));
        }
        if stage.timeout().is_zero() {
            return Err(format!("stage '{}' has a zero timeout", stage.name()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use manipulation_core::{SolutionId, SolverKind, Stage};

    use crate::testing::{solution, CollectingSink, StubPlanner};

    fn two_stage_task() -> Task {
        let mut task = Task::new("demo");
        task.add(Stage::current_state("current"));
        task.add(Stage::move_to(
            "predefined_position",
            "arm_torso",
            "arm_torso",
            SolverKind::JointInterpolation,
            Duration::from_secs(8),
        ));
        task
    }

    fn controller(planner: Arc<StubPlanner>) -> (TaskExecutionController, Arc<CollectingSink>) {
        let sink = Arc::new(CollectingSink::default());
        let controller = TaskExecutionController::new(
            planner,
            sink.clone(),
            SelectionOrder::HighestCost,
        );
        (controller, sink)
    }

    async fn planned(planner: Arc<StubPlanner>) -> TaskExecutionController {
        let (mut controller, _) = self::controller(planner);
        controller.load(GoalId::new("g"), two_stage_task()).unwrap();
        controller.initialize().await.unwrap();
        controller.plan(5, &CancellationToken::new()).await.unwrap();
        controller
    }

    #[tokio::test]
    async fn test_plan_before_initialize_is_sequence_error() {
        let planner = Arc::new(StubPlanner::with_solutions(vec![solution(1, 3.0)]));
        let (mut controller, _) = controller(planner.clone());
        controller.load(GoalId::new("g"), two_stage_task()).unwrap();

        let result = controller.plan(5, &CancellationToken::new()).await;
        assert!(matches!(
            result,
            Err(ControllerError::Sequence {
                state: ControllerState::Built,
                ..
            })
        ));
        assert_eq!(controller.state(), ControllerState::Built);
        assert_eq!(planner.plan_calls(), 0);
    }

    #[tokio::test]
    async fn test_execute_before_plan_is_sequence_error() {
        let planner = Arc::new(StubPlanner::with_solutions(vec![solution(1, 3.0)]));
        let (mut controller, _) = controller(planner.clone());
        controller.load(GoalId::new("g"), two_stage_task()).unwrap();
        controller.initialize().await.unwrap();

        let result = controller
            .execute(&solution(1, 3.0), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ControllerError::Sequence { .. })));
        assert_eq!(planner.execute_calls(), 0);
    }

    #[tokio::test]
    async fn test_load_requires_empty() {
        let planner = Arc::new(StubPlanner::with_solutions(Vec::new()));
        let (mut controller, _) = controller(planner);
        controller.load(GoalId::new("g1"), two_stage_task()).unwrap();

        let result = controller.load(GoalId::new("g2"), two_stage_task());
        assert!(matches!(result, Err(ControllerError::Sequence { .. })));

        controller.reset();
        assert_eq!(controller.state(), ControllerState::Empty);
        assert!(controller.task().is_none());
        controller.load(GoalId::new("g2"), two_stage_task()).unwrap();
    }

    #[tokio::test]
    async fn test_initialize_rejects_missing_anchor() {
        let planner = Arc::new(StubPlanner::with_solutions(Vec::new()));
        let (mut controller, _) = controller(planner.clone());
        let mut task = Task::new("demo");
        task.add(Stage::move_to(
            "move",
            "arm_torso",
            "arm_torso",
            SolverKind::JointInterpolation,
            Duration::from_secs(8),
        ));
        task.add(Stage::current_state("current"));
        controller.load(GoalId::new("g"), task).unwrap();

        let result = controller.initialize().await;
        assert!(matches!(result, Err(ControllerError::Initialization(msg)) if msg.contains("preceded")));
        assert_eq!(controller.state(), ControllerState::Failed);
        assert_eq!(planner.init_calls(), 0);
    }

    #[tokio::test]
    async fn test_initialize_carries_backend_diagnostic() {
        let planner = Arc::new(StubPlanner::with_solutions(Vec::new()).failing_init("no IK solver"));
        let (mut controller, _) = controller(planner);
        controller.load(GoalId::new("g"), two_stage_task()).unwrap();

        let err = controller.initialize().await.unwrap_err();
        assert!(err.to_string().contains("no IK solver"));
        assert_eq!(err.failure_reason(), FailureReason::Initialization);
    }

    #[tokio::test]
    async fn test_plan_exhausted_returns_zero() {
        let planner = Arc::new(StubPlanner::with_solutions(Vec::new()));
        let (mut controller, sink) = controller(planner.clone());
        controller.load(GoalId::new("g"), two_stage_task()).unwrap();
        controller.initialize().await.unwrap();

        let found = controller.plan(5, &CancellationToken::new()).await.unwrap();
        assert_eq!(found, 0);
        assert_eq!(planner.plan_calls(), 5);
        assert_eq!(controller.state(), ControllerState::Failed);
        assert!(sink.published().is_empty());
    }

    #[tokio::test]
    async fn test_plan_retries_until_solution() {
        let planner = Arc::new(
            StubPlanner::with_solutions(vec![solution(7, 2.0)])
                .with_attempts(vec![Err("collision".to_string()), Ok(Vec::new())]),
        );
        let (mut controller, sink) = controller(planner.clone());
        controller.load(GoalId::new("g"), two_stage_task()).unwrap();
        controller.initialize().await.unwrap();

        let found = controller.plan(5, &CancellationToken::new()).await.unwrap();
        assert_eq!(found, 1);
        assert_eq!(planner.plan_calls(), 3);
        assert_eq!(controller.state(), ControllerState::Planned);
        assert_eq!(sink.published(), vec![SolutionId::new(7)]);
    }

    #[tokio::test]
    async fn test_invalid_solutions_are_dropped() {
        let planner = Arc::new(StubPlanner::with_solutions(vec![
            Solution::invalid(SolutionId::new(1), 9.0),
            solution(2, 1.0),
        ]));
        let controller = planned(planner).await;

        assert_eq!(controller.solutions().len(), 1);
        let best = controller.select_best_solution().unwrap().unwrap();
        assert_eq!(best.id(), SolutionId::new(2));
    }

    #[tokio::test]
    async fn test_non_finite_costs_are_dropped() {
        let planner = Arc::new(StubPlanner::with_solutions(vec![
            solution(1, 5.0),
            solution(2, f64::NAN),
            solution(3, f64::INFINITY),
        ]));
        let controller = planned(planner).await;

        assert_eq!(controller.solutions().len(), 1);
        let best = controller.select_best_solution().unwrap().unwrap();
        assert_eq!(best.id(), SolutionId::new(1));
    }

    #[test]
    fn test_rank_skips_nan_cost() {
        let solutions = vec![solution(1, 5.0), solution(2, f64::NAN)];
        let ranked = rank_solutions(&solutions, SelectionOrder::HighestCost);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].id(), SolutionId::new(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_plan_attempt_times_out() {
        // Budget is 8s per attempt; the stub takes 10s.
        let planner = Arc::new(
            StubPlanner::with_solutions(vec![solution(1, 1.0)])
                .with_plan_delay(Duration::from_secs(10)),
        );
        let (mut controller, _) = controller(planner.clone());
        controller.load(GoalId::new("g"), two_stage_task()).unwrap();
        controller.initialize().await.unwrap();

        let found = controller.plan(2, &CancellationToken::new()).await.unwrap();
        assert_eq!(found, 0);
        assert_eq!(planner.plan_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_planning() {
        let planner = Arc::new(
            StubPlanner::with_solutions(vec![solution(1, 1.0)])
                .with_plan_delay(Duration::from_secs(5)),
        );
        let (mut controller, _) = controller(planner);
        controller.load(GoalId::new("g"), two_stage_task()).unwrap();
        controller.initialize().await.unwrap();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let result = controller.plan(5, &cancel).await;
        assert!(matches!(result, Err(ControllerError::Canceled)));
        assert_eq!(controller.state(), ControllerState::Failed);
    }

    #[tokio::test]
    async fn test_selection_highest_cost_stable() {
        let planner = Arc::new(StubPlanner::with_solutions(vec![
            solution(1, 2.0),
            solution(2, 5.0),
            solution(3, 5.0),
            solution(4, 1.0),
        ]));
        let controller = planned(planner).await;

        let first = controller.select_best_solution().unwrap().unwrap();
        let second = controller.select_best_solution().unwrap().unwrap();
        assert_eq!(first.id(), SolutionId::new(2));
        assert_eq!(first, second);
    }

    #[test]
    fn test_rank_lowest_cost_stable() {
        let solutions = vec![solution(1, 4.0), solution(2, 1.0), solution(3, 1.0)];
        let ranked = rank_solutions(&solutions, SelectionOrder::LowestCost);
        let ids: Vec<u64> = ranked.iter().map(|s| s.id().value()).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[tokio::test]
    async fn test_execute_maps_failure_status() {
        let planner = Arc::new(
            StubPlanner::with_solutions(vec![solution(1, 3.0)])
                .with_execution_status(ExecutionStatus::CONTROL_FAILED),
        );
        let mut controller = planned(planner).await;
        let best = controller.select_best_solution().unwrap().unwrap();

        let result = controller.execute(&best, &CancellationToken::new()).await;
        assert!(matches!(
            result,
            Err(ControllerError::Execution {
                status: ExecutionStatus::CONTROL_FAILED,
                ..
            })
        ));
        assert_eq!(controller.state(), ControllerState::Failed);
    }

    #[tokio::test]
    async fn test_execute_success() {
        let planner = Arc::new(StubPlanner::with_solutions(vec![solution(1, 3.0)]));
        let mut controller = planned(planner.clone()).await;
        let best = controller.select_best_solution().unwrap().unwrap();

        let status = controller
            .execute(&best, &CancellationToken::new())
            .await
            .unwrap();
        assert!(status.is_success());
        assert_eq!(controller.state(), ControllerState::Executed);
        assert_eq!(planner.executed(), vec![SolutionId::new(1)]);
    }

    #[tokio::test]
    async fn test_execute_rejects_foreign_solution() {
        let planner = Arc::new(StubPlanner::with_solutions(vec![solution(1, 3.0)]));
        let mut controller = planned(planner.clone()).await;

        let result = controller
            .execute(&solution(99, 3.0), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ControllerError::ForeignSolution(_))));
        assert_eq!(planner.execute_calls(), 0);
    }

    #[tokio::test]
    async fn test_execute_skipped_when_canceled() {
        let planner = Arc::new(StubPlanner::with_solutions(vec![solution(1, 3.0)]));
        let mut controller = planned(planner.clone()).await;
        let best = controller.select_best_solution().unwrap().unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = controller.execute(&best, &cancel).await;
        assert!(matches!(result, Err(ControllerError::Canceled)));
        assert_eq!(planner.execute_calls(), 0);
    }

    #[test]
    fn test_selection_order_parse() {
        assert_eq!(
            "lowest-cost".parse::<SelectionOrder>().unwrap(),
            SelectionOrder::LowestCost
        );
        assert!("cheapest".parse::<SelectionOrder>().is_err());
        assert_eq!(SelectionOrder::HighestCost.to_string(), "highest-cost");
    }
}
