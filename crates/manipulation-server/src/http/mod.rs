//! HTTP server for the goal server.
//!
//! Provides endpoints for:
//! - Goal submission and listing (`/v1/goals`)
//! - Goal status, result and cancellation (`/v1/goals/:id`)
//! - Health check (`/health`)
//! - Prometheus metrics (`/metrics`)

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::service::GoalLifecycleManager;

mod handlers;
pub mod responses;

/// Create the HTTP router.
pub fn create_router(manager: GoalLifecycleManager) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Goal routes
        .route(
            "/v1/goals",
            get(handlers::list_goals).post(handlers::submit_goal),
        )
        .route("/v1/goals/:id", get(handlers::get_goal))
        .route("/v1/goals/:id/result", get(handlers::get_result))
        .route("/v1/goals/:id/cancel", post(handlers::cancel_goal))
        // Observability routes
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(manager)
}
