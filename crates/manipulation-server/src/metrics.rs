//! Prometheus metrics collection and formatting.
//!
//! This module provides metrics in Prometheus text exposition format.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Arc;

use manipulation_core::{FailureReason, GoalStatus};

use crate::state::AppState;

const STATUSES: [GoalStatus; 5] = [
    GoalStatus::Accepted,
    GoalStatus::Executing,
    GoalStatus::Succeeded,
    GoalStatus::Failed,
    GoalStatus::Canceled,
];

const REASONS: [FailureReason; 7] = [
    FailureReason::InvalidGoal,
    FailureReason::Initialization,
    FailureReason::PlanningExhausted,
    FailureReason::Execution,
    FailureReason::Sequence,
    FailureReason::Canceled,
    FailureReason::Internal,
];

/// Collect all metrics from AppState and format as Prometheus text.
pub async fn collect_metrics(state: &Arc<AppState>) -> String {
    let mut output = String::new();

    collect_goal_metrics(state, &mut output).await;
    collect_failure_metrics(state, &mut output).await;

    output
}

/// Tracked goals by status.
async fn collect_goal_metrics(state: &Arc<AppState>, output: &mut String) {
    let goals = state.goals.read().await;

    let mut counts: BTreeMap<&'static str, u64> =
        STATUSES.iter().map(|s| (s.as_str(), 0)).collect();
    for handle in goals.values() {
        *counts.entry(handle.status.as_str()).or_default() += 1;
    }

    writeln!(
        output,
        "# HELP manipulation_goals Number of tracked goals by status"
    )
    .ok();
    writeln!(output, "# TYPE manipulation_goals gauge").ok();
    for (status, count) in &counts {
        writeln!(output, "manipulation_goals{{status=\"{status}\"}} {count}").ok();
    }

    let busy = u8::from(counts.get(GoalStatus::Executing.as_str()).copied().unwrap_or(0) > 0);
    writeln!(output).ok();
    writeln!(
        output,
        "# HELP manipulation_controller_busy Whether a goal currently holds the controller"
    )
    .ok();
    writeln!(output, "# TYPE manipulation_controller_busy gauge").ok();
    writeln!(output, "manipulation_controller_busy {busy}").ok();
}

/// Retained failed goals by reason.
async fn collect_failure_metrics(state: &Arc<AppState>, output: &mut String) {
    let goals = state.goals.read().await;

    let mut counts: BTreeMap<&'static str, u64> =
        REASONS.iter().map(|r| (r.as_str(), 0)).collect();
    for reason in goals
        .values()
        .filter_map(|handle| handle.result().and_then(|result| result.reason))
    {
        *counts.entry(reason.as_str()).or_default() += 1;
    }

    writeln!(output).ok();
    writeln!(
        output,
        "# HELP manipulation_goal_failures Retained unsuccessful goals by reason"
    )
    .ok();
    writeln!(output, "# TYPE manipulation_goal_failures gauge").ok();
    for (reason, count) in &counts {
        writeln!(
            output,
            "manipulation_goal_failures{{reason=\"{reason}\"}} {count}"
        )
        .ok();
    }
}
