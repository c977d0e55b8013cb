//! Goal handlers.

use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::debug;

use manipulation_core::{GoalId, GoalRecord};

use crate::http::responses::{
    goal_error, ApiError, CancelGoalResponse, PendingResponse, ResultQuery, SubmitGoalRequest,
    SubmitGoalResponse,
};
use crate::service::GoalLifecycleManager;

/// Longest a result request may block.
const MAX_RESULT_WAIT: Duration = Duration::from_secs(300);

/// Submit a goal. Invalid or inadmissible goals are answered with 400.
pub async fn submit_goal(
    State(manager): State<GoalLifecycleManager>,
    Json(request): Json<SubmitGoalRequest>,
) -> Result<(StatusCode, Json<SubmitGoalResponse>), ApiError> {
    let goal_id = manager
        .submit_goal(request.group_name)
        .await
        .map_err(goal_error)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitGoalResponse {
            goal_id: goal_id.into_inner(),
        }),
    ))
}

/// Request cancellation of a goal.
pub async fn cancel_goal(
    State(manager): State<GoalLifecycleManager>,
    Path(id): Path<String>,
) -> Json<CancelGoalResponse> {
    let response = manager.cancel_goal(&GoalId::new(id)).await;
    Json(CancelGoalResponse {
        accepted: response.is_accepted(),
    })
}

pub async fn get_goal(
    State(manager): State<GoalLifecycleManager>,
    Path(id): Path<String>,
) -> Result<Json<GoalRecord>, ApiError> {
    manager
        .get_goal(&GoalId::new(id))
        .await
        .map(Json)
        .map_err(goal_error)
}

/// Get a goal's result.
///
/// With `wait_secs`, blocks until the result arrives or the wait elapses.
/// A goal still running is answered with 202 and its current status.
pub async fn get_result(
    State(manager): State<GoalLifecycleManager>,
    Path(id): Path<String>,
    Query(query): Query<ResultQuery>,
) -> Result<Response, ApiError> {
    let goal_id = GoalId::new(id);

    if let Some(secs) = query.wait_secs {
        let wait = Duration::from_secs(secs).min(MAX_RESULT_WAIT);
        match tokio::time::timeout(wait, manager.wait_for_result(&goal_id)).await {
            Ok(result) => return Ok(Json(result.map_err(goal_error)?).into_response()),
            Err(_) => debug!(goal_id = %goal_id, wait_secs = secs, "Result wait elapsed"),
        }
    }

    match manager.get_result(&goal_id).await.map_err(goal_error)? {
        Some(result) => Ok(Json(result).into_response()),
        None => {
            let record = manager.get_goal(&goal_id).await.map_err(goal_error)?;
            Ok((
                StatusCode::ACCEPTED,
                Json(PendingResponse {
                    pending: true,
                    status: record.status,
                }),
            )
                .into_response())
        }
    }
}

/// List tracked goals.
pub async fn list_goals(State(manager): State<GoalLifecycleManager>) -> Json<Vec<GoalRecord>> {
    Json(manager.list_goals().await)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::Config;
    use crate::state::AppState;
    use crate::testing::{solution, StubPlanner};

    fn manager() -> GoalLifecycleManager {
        let planner = Arc::new(StubPlanner::with_solutions(vec![solution(1, 3.0)]));
        GoalLifecycleManager::new(&Config::default(), AppState::new(), planner)
    }

    fn submit(group: &str) -> Json<SubmitGoalRequest> {
        Json(SubmitGoalRequest {
            group_name: group.to_string(),
        })
    }

    #[tokio::test]
    async fn test_submit_unknown_group_is_bad_request() {
        let (status, body) = submit_goal(State(manager()), submit("left_leg"))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.error.contains("left_leg"));
    }

    #[tokio::test]
    async fn test_submit_and_wait_for_result() {
        let manager = manager();
        let (status, Json(accepted)) = submit_goal(State(manager.clone()), submit("arm_torso"))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::ACCEPTED);

        let response = get_result(
            State(manager.clone()),
            Path(accepted.goal_id.clone()),
            Query(ResultQuery { wait_secs: Some(5) }),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let Json(record) = get_goal(State(manager), Path(accepted.goal_id))
            .await
            .unwrap();
        assert!(record.result.unwrap().success);
    }

    #[tokio::test]
    async fn test_unknown_goal_not_found() {
        let manager = manager();
        let (status, _) = get_goal(State(manager.clone()), Path("missing".to_string()))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);

        let err = get_result(
            State(manager.clone()),
            Path("missing".to_string()),
            Query(ResultQuery::default()),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::NOT_FOUND);

        let Json(cancel) = cancel_goal(State(manager), Path("missing".to_string())).await;
        assert!(!cancel.accepted);
    }

    #[tokio::test]
    async fn test_list_goals_returns_records() {
        let manager = manager();
        let Json(empty) = list_goals(State(manager.clone())).await;
        assert!(empty.is_empty());

        let (_, Json(accepted)) = submit_goal(State(manager.clone()), submit("arm_torso"))
            .await
            .unwrap();
        let goal_id = GoalId::new(accepted.goal_id.clone());
        assert!(manager.wait_for_result(&goal_id).await.unwrap().success);

        let Json(goals) = list_goals(State(manager)).await;
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].goal_id.as_str(), accepted.goal_id);
        assert_eq!(goals[0].group_name, "arm_torso");
        assert!(goals[0].status.is_terminal());
    }
}
