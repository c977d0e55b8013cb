//! Goal lifecycle manager.
//!
//! Accepts or rejects incoming goals, runs each accepted goal through the
//! build / initialize / plan / select / execute flow on the shared
//! controller, and delivers exactly one result per goal.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use manipulation_core::{
    CancelResponse, CoreError, FailureReason, Goal, GoalEvent, GoalId, GoalRecord, GoalResponse,
    GoalResult, TaskTemplate,
};

use crate::builder::TaskGraphBuilder;
use crate::config::{AdmissionPolicy, Config};
use crate::controller::{ControllerError, TaskExecutionController};
use crate::introspection::BroadcastIntrospection;
use crate::planner::{PlannerBackend, PlannerError};
use crate::state::{AppState, GoalHandle};

/// Errors surfaced to goal clients.
#[derive(Debug, Error)]
pub enum GoalError {
    #[error("Goal rejected: {reason}")]
    Rejected { reason: String },

    #[error("Goal not found: {0}")]
    NotFound(GoalId),
}

/// Why a goal flow stopped short of success.
#[derive(Debug, Error)]
enum FlowFailure {
    #[error("{0}")]
    Build(#[from] CoreError),

    #[error("{0}")]
    Controller(#[from] ControllerError),

    #[error("Task planning failed after {attempts} attempt(s)")]
    Exhausted { attempts: u32 },
}

impl FlowFailure {
    fn reason(&self) -> FailureReason {
        match self {
            Self::Build(CoreError::InvalidGoal(_)) => FailureReason::InvalidGoal,
            Self::Build(_) => FailureReason::Sequence,
            Self::Controller(e) => e.failure_reason(),
            Self::Exhausted { .. } => FailureReason::PlanningExhausted,
        }
    }

    fn into_result(self, goal_id: GoalId) -> GoalResult {
        match self.reason() {
            FailureReason::Canceled => GoalResult::canceled(goal_id),
            reason => GoalResult::failed(goal_id, reason, self.to_string()),
        }
    }
}

/// Owns goal admission, cancellation and result delivery.
#[derive(Clone)]
pub struct GoalLifecycleManager {
    state: Arc<AppState>,
    builder: Arc<TaskGraphBuilder>,
    template: Arc<TaskTemplate>,
    backend: Arc<dyn PlannerBackend>,
    controller: Arc<Mutex<TaskExecutionController>>,
    workers: Arc<Semaphore>,
    admission_lock: Arc<Mutex<()>>,
    admission: AdmissionPolicy,
    max_planning_attempts: u32,
    robot_model: String,
}

impl GoalLifecycleManager {
    /// Create a manager driving `backend` with the given configuration.
    pub fn new(config: &Config, state: Arc<AppState>, backend: Arc<dyn PlannerBackend>) -> Self {
        let builder = config.group_timeouts.iter().fold(
            TaskGraphBuilder::new(config.known_groups.iter(), config.stage_timeout),
            |builder, (group, timeout)| builder.with_group_timeout(group.clone(), *timeout),
        );
        let template = TaskTemplate::new(config.task_name.clone())
            .with_property("ik_frame", config.ik_frame.clone());
        let introspection = Arc::new(BroadcastIntrospection::new(state.event_sender()));
        let controller = TaskExecutionController::new(
            Arc::clone(&backend),
            introspection,
            config.selection_order,
        );

        Self {
            state,
            builder: Arc::new(builder),
            template: Arc::new(template),
            backend,
            controller: Arc::new(Mutex::new(controller)),
            workers: Arc::new(Semaphore::new(config.max_concurrent_goals.max(1))),
            admission_lock: Arc::new(Mutex::new(())),
            admission: config.admission_policy,
            max_planning_attempts: config.max_planning_attempts.max(1),
            robot_model: config.robot_model.clone(),
        }
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Load the robot model into the planning backend.
    pub async fn configure(&self) -> Result<(), PlannerError> {
        info!(
            backend = %self.backend.name(),
            model = %self.robot_model,
            groups = ?self.builder.known_groups().collect::<Vec<_>>(),
            "Configuring goal server"
        );
        self.backend.load_model(&self.robot_model).await
    }

    /// Submit a goal for `group_name`.
    ///
    /// Validation and admission happen before this returns; planning runs
    /// in the background.
    pub async fn submit_goal(&self, group_name: impl Into<String>) -> Result<GoalId, GoalError> {
        let goal = Goal::new(group_name);
        let _admission = self.admission_lock.lock().await;

        match self.handle_goal_request(&goal).await {
            GoalResponse::Accept => {
                let goal_id = goal.id.clone();
                self.handle_goal_accepted(goal).await;
                Ok(goal_id)
            }
            GoalResponse::Reject { reason } => Err(GoalError::Rejected { reason }),
        }
    }

    /// Decide whether to accept a goal. Invalid goals never reach the planner.
    pub async fn handle_goal_request(&self, goal: &Goal) -> GoalResponse {
        info!(goal_id = %goal.id, group = %goal.group_name, "Received goal request");

        if let Err(e) = self.builder.validate(goal) {
            warn!(goal_id = %goal.id, error = %e, "Rejecting goal");
            self.state
                .notify(GoalEvent::rejected(goal.id.clone(), &e.to_string()));
            return GoalResponse::reject(e.to_string());
        }

        if self.admission == AdmissionPolicy::RejectWhenBusy {
            let active = self.state.active_goal_count().await;
            if active > 0 {
                let reason = format!("server busy with {} active goal(s)", active);
                warn!(goal_id = %goal.id, active, "Rejecting goal while busy");
                self.state.notify(GoalEvent::rejected(goal.id.clone(), &reason));
                return GoalResponse::reject(reason);
            }
        }

        GoalResponse::Accept
    }

    /// Register an accepted goal and start its execution flow.
    pub async fn handle_goal_accepted(&self, goal: Goal) {
        let goal_id = goal.id.clone();
        let cancel = CancellationToken::new();
        self.state
            .insert_goal(GoalHandle::new(goal.clone(), cancel.clone()))
            .await;
        self.state
            .notify(GoalEvent::accepted(goal_id.clone(), &goal.group_name));
        info!(goal_id = %goal_id, group = %goal.group_name, "Goal accepted");

        let flow = tokio::spawn(self.clone().run_goal(goal, cancel));

        // A panicking flow still owes its goal a result.
        let supervisor = self.clone();
        tokio::spawn(async move {
            if let Err(e) = flow.await {
                error!(goal_id = %goal_id, error = %e, "Goal flow aborted");
                supervisor
                    .deliver(GoalResult::failed(
                        goal_id,
                        FailureReason::Internal,
                        format!("goal flow aborted: {}", e),
                    ))
                    .await;
            }
        });
    }

    /// Request cancellation of a goal that has not finished.
    pub async fn handle_cancel_request(&self, goal_id: &GoalId) -> CancelResponse {
        let goals = self.state.goals.read().await;
        match goals.get(goal_id) {
            Some(handle) if handle.status.is_active() => {
                info!(goal_id = %goal_id, status = %handle.status, "Cancel requested");
                handle.cancel.cancel();
                CancelResponse::Accept
            }
            Some(handle) => {
                debug!(goal_id = %goal_id, status = %handle.status, "Cancel of finished goal ignored");
                CancelResponse::Reject
            }
            None => {
                debug!(goal_id = %goal_id, "Cancel of unknown goal ignored");
                CancelResponse::Reject
            }
        }
    }

    /// Alias used by transports.
    pub async fn cancel_goal(&self, goal_id: &GoalId) -> CancelResponse {
        self.handle_cancel_request(goal_id).await
    }

    /// The goal's result, or `None` while it is still running.
    pub async fn get_result(&self, goal_id: &GoalId) -> Result<Option<GoalResult>, GoalError> {
        let goals = self.state.goals.read().await;
        goals
            .get(goal_id)
            .map(GoalHandle::result)
            .ok_or_else(|| GoalError::NotFound(goal_id.clone()))
    }

    /// Wait until the goal has a result.
    pub async fn wait_for_result(&self, goal_id: &GoalId) -> Result<GoalResult, GoalError> {
        let mut rx = {
            let goals = self.state.goals.read().await;
            goals
                .get(goal_id)
                .map(GoalHandle::subscribe)
                .ok_or_else(|| GoalError::NotFound(goal_id.clone()))?
        };

        let result = rx
            .wait_for(|result| result.is_some())
            .await
            .map_err(|_| GoalError::NotFound(goal_id.clone()))?;
        (*result)
            .clone()
            .ok_or_else(|| GoalError::NotFound(goal_id.clone()))
    }

    pub async fn get_goal(&self, goal_id: &GoalId) -> Result<GoalRecord, GoalError> {
        let goals = self.state.goals.read().await;
        goals
            .get(goal_id)
            .map(GoalHandle::record)
            .ok_or_else(|| GoalError::NotFound(goal_id.clone()))
    }

    /// All tracked goals, oldest submission first.
    pub async fn list_goals(&self) -> Vec<GoalRecord> {
        let goals = self.state.goals.read().await;
        let mut records: Vec<GoalRecord> = goals.values().map(GoalHandle::record).collect();
        records.sort_by_key(|r| r.submitted_at);
        records
    }

    async fn run_goal(self, goal: Goal, cancel: CancellationToken) {
        let goal_id = goal.id.clone();

        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(goal_id = %goal_id, "Goal canceled while waiting for a worker");
                self.deliver(GoalResult::canceled(goal_id)).await;
                return;
            }
            permit = Arc::clone(&self.workers).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    self.deliver(GoalResult::failed(
                        goal_id,
                        FailureReason::Internal,
                        "worker pool closed",
                    ))
                    .await;
                    return;
                }
            },
        };

        let mut controller = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(goal_id = %goal_id, "Goal canceled while queued");
                self.deliver(GoalResult::canceled(goal_id)).await;
                return;
            }
            guard = self.controller.lock() => guard,
        };

        if !self.state.start_goal(&goal_id).await {
            warn!(goal_id = %goal_id, "Goal no longer startable, skipping");
            return;
        }
        self.state.notify(GoalEvent::executing(goal_id.clone()));
        info!(goal_id = %goal_id, group = %goal.group_name, "Executing goal");

        let result = match self.drive(&mut controller, &goal, &cancel).await {
            Ok(()) => {
                info!(goal_id = %goal_id, "Goal succeeded");
                GoalResult::succeeded(goal_id)
            }
            Err(failure) => {
                match failure.reason() {
                    FailureReason::Canceled => {
                        info!(goal_id = %goal_id, "Goal canceled")
                    }
                    FailureReason::Sequence => {
                        error!(goal_id = %goal_id, error = %failure, "Controller called out of order")
                    }
                    FailureReason::PlanningExhausted => {
                        warn!(goal_id = %goal_id, error = %failure, "Task planning failed")
                    }
                    _ => error!(goal_id = %goal_id, error = %failure, "Goal failed"),
                }
                failure.into_result(goal_id)
            }
        };

        controller.reset();
        drop(controller);
        self.deliver(result).await;
    }

    async fn drive(
        &self,
        controller: &mut TaskExecutionController,
        goal: &Goal,
        cancel: &CancellationToken,
    ) -> Result<(), FlowFailure> {
        controller.reset();
        if cancel.is_cancelled() {
            return Err(ControllerError::Canceled.into());
        }

        let mut task = self.template.instantiate();
        self.builder.build(&mut task, goal)?;
        debug!(goal_id = %goal.id, stages = ?task.stage_names(), "Task built");
        controller.load(goal.id.clone(), task)?;

        if cancel.is_cancelled() {
            return Err(ControllerError::Canceled.into());
        }
        controller.initialize().await?;

        let attempts = self.max_planning_attempts;
        let found = controller.plan(attempts, cancel).await?;
        if found == 0 {
            return Err(FlowFailure::Exhausted { attempts });
        }
        info!(goal_id = %goal.id, solutions = found, "Task planning succeeded");

        let best = controller
            .select_best_solution()?
            .ok_or(FlowFailure::Exhausted { attempts })?;
        let status = controller.execute(&best, cancel).await?;
        debug!(goal_id = %goal.id, status = %status, "Execution finished");
        Ok(())
    }

    async fn deliver(&self, result: GoalResult) {
        let goal_id = result.goal_id.clone();
        let status = result.status;
        let message = result.message.clone();
        if self.state.finish_goal(result).await {
            info!(goal_id = %goal_id, status = %status, "Goal finished");
            self.state
                .notify(GoalEvent::finished(goal_id, status, message.as_deref()));
        }
    }
}
