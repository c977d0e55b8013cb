//! Shared application state.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use manipulation_core::{Goal, GoalEvent, GoalId, GoalRecord, GoalResult, GoalStatus};

/// Capacity of the goal event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default number of finished goals kept for result lookups.
pub const DEFAULT_RESULT_RETENTION: usize = 256;

/// Server-side record of one accepted goal.
pub struct GoalHandle {
    /// The goal as submitted.
    pub goal: Goal,

    /// Current lifecycle status.
    pub status: GoalStatus,

    /// Tripped by cancel requests; observed by the execution flow.
    pub cancel: CancellationToken,

    /// When the execution flow acquired the controller.
    pub started_at: Option<DateTime<Utc>>,

    /// When the terminal result was delivered.
    pub finished_at: Option<DateTime<Utc>>,

    /// Completion channel; holds `Some` once the goal is terminal.
    result_tx: watch::Sender<Option<GoalResult>>,
}

impl GoalHandle {
    /// Create a handle for a goal that was just accepted.
    pub fn new(goal: Goal, cancel: CancellationToken) -> Self {
        let (result_tx, _) = watch::channel(None);
        Self {
            goal,
            status: GoalStatus::Accepted,
            cancel,
            started_at: None,
            finished_at: None,
            result_tx,
        }
    }

    /// The terminal result, if delivered.
    pub fn result(&self) -> Option<GoalResult> {
        self.result_tx.borrow().clone()
    }

    /// Subscribe to the completion channel.
    pub fn subscribe(&self) -> watch::Receiver<Option<GoalResult>> {
        self.result_tx.subscribe()
    }

    /// Mark the goal as executing.
    pub fn start(&mut self) -> bool {
        if !self.status.can_transition_to(GoalStatus::Executing) {
            return false;
        }
        self.status = GoalStatus::Executing;
        self.started_at = Some(Utc::now());
        true
    }

    /// Deliver the terminal result. Returns false if one was already delivered.
    pub fn finish(&mut self, result: GoalResult) -> bool {
        if self.status.is_terminal() || !self.status.can_transition_to(result.status) {
            return false;
        }
        self.status = result.status;
        self.finished_at = Some(result.finished_at);
        self.result_tx.send_replace(Some(result));
        true
    }

    /// Serializable snapshot.
    pub fn record(&self) -> GoalRecord {
        GoalRecord {
            goal_id: self.goal.id.clone(),
            group_name: self.goal.group_name.clone(),
            status: self.status,
            submitted_at: self.goal.submitted_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            result: self.result(),
        }
    }
}

/// Shared application state.
pub struct AppState {
    /// Accepted goals indexed by GoalId.
    pub goals: RwLock<HashMap<GoalId, GoalHandle>>,

    /// Finished goals, oldest first, for retention.
    finished: Mutex<VecDeque<GoalId>>,

    /// How many finished goals to keep.
    retention: usize,

    /// Broadcast channel for goal events.
    events_tx: broadcast::Sender<GoalEvent>,
}

impl AppState {
    /// Create a new AppState wrapped in Arc.
    pub fn new() -> Arc<Self> {
        Self::with_retention(DEFAULT_RESULT_RETENTION)
    }

    /// Create a new AppState keeping at most `retention` finished goals.
    pub fn with_retention(retention: usize) -> Arc<Self> {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            goals: RwLock::new(HashMap::new()),
            finished: Mutex::new(VecDeque::new()),
            retention,
            events_tx,
        })
    }

    /// Sender side of the event channel.
    pub fn event_sender(&self) -> broadcast::Sender<GoalEvent> {
        self.events_tx.clone()
    }

    /// Subscribe to goal events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<GoalEvent> {
        self.events_tx.subscribe()
    }

    /// Send an event to subscribers (ignored if none are listening).
    pub fn notify(&self, event: GoalEvent) {
        let _ = self.events_tx.send(event);
    }

    /// Register a newly accepted goal.
    pub async fn insert_goal(&self, handle: GoalHandle) {
        let id = handle.goal.id.clone();
        self.goals.write().await.insert(id, handle);
    }

    /// Mark a goal as executing.
    pub async fn start_goal(&self, goal_id: &GoalId) -> bool {
        let mut goals = self.goals.write().await;
        match goals.get_mut(goal_id) {
            Some(handle) => handle.start(),
            None => false,
        }
    }

    /// Deliver a goal's terminal result exactly once.
    ///
    /// Returns false if the goal is unknown or already finished; the
    /// result is dropped in that case.
    pub async fn finish_goal(&self, result: GoalResult) -> bool {
        let goal_id = result.goal_id.clone();
        {
            let mut goals = self.goals.write().await;
            let Some(handle) = goals.get_mut(&goal_id) else {
                warn!(goal_id = %goal_id, "Result for unknown goal dropped");
                return false;
            };
            if !handle.finish(result) {
                warn!(goal_id = %goal_id, status = %handle.status, "Duplicate result suppressed");
                return false;
            }
        }
        self.retain_finished(goal_id).await;
        true
    }

    async fn retain_finished(&self, goal_id: GoalId) {
        let mut finished = self.finished.lock().await;
        finished.push_back(goal_id);
        if finished.len() <= self.retention {
            return;
        }
        let mut goals = self.goals.write().await;
        while finished.len() > self.retention {
            if let Some(old) = finished.pop_front() {
                debug!(goal_id = %old, "Evicting finished goal");
                goals.remove(&old);
            }
        }
    }

    /// Number of goals that have not reached a terminal state.
    pub async fn active_goal_count(&self) -> usize {
        self.goals
            .read()
            .await
            .values()
            .filter(|h| h.status.is_active())
            .count()
    }

    /// Get the number of tracked goals.
    pub async fn goal_count(&self) -> usize {
        self.goals.read().await.len()
    }
}
