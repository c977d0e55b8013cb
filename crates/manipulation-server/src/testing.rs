//! Test doubles for the planning backend and introspection sink.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use manipulation_core::{ExecutionStatus, GoalId, JointWaypoint, Solution, SolutionId, Task};

use crate::introspection::{IntrospectionError, IntrospectionSink};
use crate::planner::{PlannerBackend, PlannerError};

/// A valid solution with a two-point trajectory.
pub(crate) fn solution(id: u64, cost: f64) -> Solution {
    Solution::new(
        SolutionId::new(id),
        cost,
        vec![
            JointWaypoint {
                positions: vec![0.0],
                time_from_start: Duration::ZERO,
            },
            JointWaypoint {
                positions: vec![1.0],
                time_from_start: Duration::from_secs(1),
            },
        ],
    )
}

/// Scripted planner that records every call.
pub(crate) struct StubPlanner {
    solutions: Vec<Solution>,
    attempts: Mutex<VecDeque<Result<Vec<Solution>, String>>>,
    init_error: Option<String>,
    init_failures_left: AtomicUsize,
    panic_on_plan: bool,
    plan_delay: Duration,
    execution_status: ExecutionStatus,
    init_calls: AtomicUsize,
    plan_calls: AtomicUsize,
    execute_calls: AtomicUsize,
    executed: Mutex<Vec<SolutionId>>,
    current_group: Mutex<String>,
    log: Mutex<Vec<String>>,
}

impl StubPlanner {
    /// Every planning attempt returns `solutions`.
    pub(crate) fn with_solutions(solutions: Vec<Solution>) -> Self {
        Self {
            solutions,
            attempts: Mutex::new(VecDeque::new()),
            init_error: None,
            init_failures_left: AtomicUsize::new(0),
            panic_on_plan: false,
            plan_delay: Duration::ZERO,
            execution_status: ExecutionStatus::SUCCESS,
            init_calls: AtomicUsize::new(0),
            plan_calls: AtomicUsize::new(0),
            execute_calls: AtomicUsize::new(0),
            executed: Mutex::new(Vec::new()),
            current_group: Mutex::new(String::new()),
            log: Mutex::new(Vec::new()),
        }
    }

    /// The first attempts return these outcomes before falling back to the
    /// default solutions.
    pub(crate) fn with_attempts(mut self, attempts: Vec<Result<Vec<Solution>, String>>) -> Self {
        self.attempts = Mutex::new(attempts.into());
        self
    }

    /// Every `init` call fails with `diagnostic`.
    pub(crate) fn failing_init(self, diagnostic: &str) -> Self {
        self.failing_init_times(diagnostic, usize::MAX)
    }

    /// Only the first `init` call fails.
    pub(crate) fn failing_init_once(self, diagnostic: &str) -> Self {
        self.failing_init_times(diagnostic, 1)
    }

    fn failing_init_times(mut self, diagnostic: &str, times: usize) -> Self {
        self.init_error = Some(diagnostic.to_string());
        self.init_failures_left = AtomicUsize::new(times);
        self
    }

    /// Planning attempts panic instead of returning.
    pub(crate) fn panicking_plan(mut self) -> Self {
        self.panic_on_plan = true;
        self
    }

    pub(crate) fn with_plan_delay(mut self, delay: Duration) -> Self {
        self.plan_delay = delay;
        self
    }

    pub(crate) fn with_execution_status(mut self, status: ExecutionStatus) -> Self {
        self.execution_status = status;
        self
    }

    pub(crate) fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn plan_calls(&self) -> usize {
        self.plan_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn execute_calls(&self) -> usize {
        self.execute_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn executed(&self) -> Vec<SolutionId> {
        self.executed.lock().unwrap().clone()
    }

    /// Calls in order, as `phase:group`.
    pub(crate) fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn record(&self, phase: &str, group: &str) {
        self.log.lock().unwrap().push(format!("{}:{}", phase, group));
    }
}

#[async_trait]
impl PlannerBackend for StubPlanner {
    fn name(&self) -> &str {
        "stub"
    }

    async fn load_model(&self, _descriptor: &str) -> Result<(), PlannerError> {
        Ok(())
    }

    async fn init(&self, task: &Task) -> Result<(), PlannerError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        let group = task.move_groups().collect::<Vec<_>>().join(",");
        self.record("init", &group);
        *self.current_group.lock().unwrap() = group;
        let fail = self
            .init_failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                0 => None,
                usize::MAX => Some(usize::MAX),
                n => Some(n - 1),
            })
            .is_ok();
        match &self.init_error {
            Some(diagnostic) if fail => Err(PlannerError::Init(diagnostic.clone())),
            _ => Ok(()),
        }
    }

    async fn plan(&self, task: &Task) -> Result<Vec<Solution>, PlannerError> {
        self.plan_calls.fetch_add(1, Ordering::SeqCst);
        let group = task.move_groups().collect::<Vec<_>>().join(",");
        self.record("plan_start", &group);
        if self.panic_on_plan {
            panic!("stub planner panicked while planning {}", group);
        }
        if !self.plan_delay.is_zero() {
            tokio::time::sleep(self.plan_delay).await;
        }
        self.record("plan_end", &group);

        let scripted = self.attempts.lock().unwrap().pop_front();
        match scripted {
            Some(Ok(solutions)) => Ok(solutions),
            Some(Err(reason)) => Err(PlannerError::Search(reason)),
            None => Ok(self.solutions.clone()),
        }
    }

    async fn execute(&self, solution: &Solution) -> Result<ExecutionStatus, PlannerError> {
        self.execute_calls.fetch_add(1, Ordering::SeqCst);
        let group = self.current_group.lock().unwrap().clone();
        self.record("execute", &group);
        self.executed.lock().unwrap().push(solution.id());
        Ok(self.execution_status)
    }
}

/// Introspection sink that remembers what was published.
#[derive(Default)]
pub(crate) struct CollectingSink {
    published: Mutex<Vec<SolutionId>>,
}

impl CollectingSink {
    pub(crate) fn published(&self) -> Vec<SolutionId> {
        self.published.lock().unwrap().clone()
    }
}

impl IntrospectionSink for CollectingSink {
    fn publish_solution(
        &self,
        _goal_id: &GoalId,
        _task: &Task,
        solution: &Solution,
    ) -> Result<(), IntrospectionError> {
        self.published.lock().unwrap().push(solution.id());
        Ok(())
    }
}
