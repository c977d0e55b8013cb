//! Health and metrics handlers.

use axum::{extract::State, http::header, response::IntoResponse, Json};

use crate::service::GoalLifecycleManager;

/// Health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Prometheus metrics endpoint.
pub async fn metrics_handler(State(manager): State<GoalLifecycleManager>) -> impl IntoResponse {
    let body = crate::metrics::collect_metrics(manager.state()).await;
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;

    use super::*;
    use crate::config::Config;
    use crate::state::AppState;
    use crate::testing::{solution, StubPlanner};

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_check_ok() {
        let response = health_check().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_metrics_handler_reports_finished_goal() {
        let planner = Arc::new(StubPlanner::with_solutions(vec![solution(1, 3.0)]));
        let manager = GoalLifecycleManager::new(&Config::default(), AppState::new(), planner);
        let goal_id = manager.submit_goal("arm_torso").await.unwrap();
        assert!(manager.wait_for_result(&goal_id).await.unwrap().success);

        let response = metrics_handler(State(manager)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; version=0.0.4"
        );
        let body = body_text(response).await;
        assert!(body.contains("manipulation_goals{status=\"succeeded\"} 1"));
        assert!(body.contains("manipulation_controller_busy 0"));
        assert!(body.contains("manipulation_goal_failures{reason=\"initialization\"} 0"));
    }
}
