//! HTTP request and response types.

use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use manipulation_core::GoalStatus;

use crate::service::GoalError;

// ============================================================================
// Goal types
// ============================================================================

/// Request body for the submit endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitGoalRequest {
    /// Kinematic group to move to its predefined pose.
    pub group_name: String,
}

/// Response body for an accepted goal.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitGoalResponse {
    pub goal_id: String,
}

/// Response body for the cancel endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct CancelGoalResponse {
    pub accepted: bool,
}

/// Query parameters for the result endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ResultQuery {
    /// Block up to this many seconds for the result.
    pub wait_secs: Option<u64>,
}

/// Returned while a goal has no result yet.
#[derive(Debug, Serialize, Deserialize)]
pub struct PendingResponse {
    pub pending: bool,
    pub status: GoalStatus,
}

// ============================================================================
// Error types
// ============================================================================

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map a goal error to its HTTP status.
pub fn goal_error(e: GoalError) -> ApiError {
    let status = match e {
        GoalError::Rejected { .. } => StatusCode::BAD_REQUEST,
        GoalError::NotFound(_) => StatusCode::NOT_FOUND,
    };
    (status, Json(ErrorResponse { error: e.to_string() }))
}
