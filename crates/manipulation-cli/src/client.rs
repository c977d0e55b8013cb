//! HTTP client for the goal server REST endpoints.

use std::time::Duration;

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use manipulation_core::{GoalId, GoalRecord, GoalResult, GoalStatus};

use crate::error::ClientError;

#[derive(Serialize)]
struct SubmitGoalBody<'a> {
    group_name: &'a str,
}

#[derive(Deserialize)]
struct SubmitGoalReply {
    goal_id: String,
}

#[derive(Deserialize)]
struct CancelGoalReply {
    accepted: bool,
}

#[derive(Deserialize)]
struct PendingReply {
    status: GoalStatus,
}

#[derive(Deserialize)]
struct ErrorReply {
    error: String,
}

/// Outcome of a result lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultPoll {
    /// The goal reached a terminal state.
    Finished(GoalResult),
    /// The goal is still running.
    Pending(GoalStatus),
}

/// HTTP client for the goal server.
pub struct HttpClient {
    inner: reqwest::Client,
    base_url: String,
}

impl HttpClient {
    /// Create a new HTTP client.
    pub fn new(base_url: &str) -> Self {
        Self {
            inner: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check if the goal server is healthy.
    pub async fn health(&self) -> Result<bool, ClientError> {
        let url = self.url("/health");
        debug!(url = %url, "Checking health");

        let response = self.inner.get(&url).send().await?;
        Ok(response.status().is_success())
    }

    /// Submit a goal for `group_name`.
    pub async fn submit_goal(&self, group_name: &str) -> Result<GoalId, ClientError> {
        let url = self.url("/v1/goals");
        debug!(url = %url, group = %group_name, "Submitting goal");

        let response = self
            .inner
            .post(&url)
            .json(&SubmitGoalBody { group_name })
            .send()
            .await?;
        let reply: SubmitGoalReply = decode(check(response, "/v1/goals").await?).await?;
        Ok(GoalId::new(reply.goal_id))
    }

    /// Request cancellation. Returns whether the server accepted it.
    pub async fn cancel_goal(&self, goal_id: &str) -> Result<bool, ClientError> {
        let path = format!("/v1/goals/{}/cancel", goal_id);
        let url = self.url(&path);
        debug!(url = %url, "Canceling goal");

        let response = self.inner.post(&url).send().await?;
        let reply: CancelGoalReply = decode(check(response, &path).await?).await?;
        Ok(reply.accepted)
    }

    pub async fn get_goal(&self, goal_id: &str) -> Result<GoalRecord, ClientError> {
        self.get_json(&format!("/v1/goals/{}", goal_id)).await
    }

    pub async fn list_goals(&self) -> Result<Vec<GoalRecord>, ClientError> {
        self.get_json("/v1/goals").await
    }

    /// Look up a goal's result, optionally waiting for it on the server.
    pub async fn get_result(
        &self,
        goal_id: &str,
        wait: Option<Duration>,
    ) -> Result<ResultPoll, ClientError> {
        let path = format!("/v1/goals/{}/result", goal_id);
        let url = self.url(&path);
        debug!(url = %url, wait = ?wait, "Fetching result");

        let mut request = self.inner.get(&url);
        if let Some(wait) = wait {
            request = request
                .query(&[("wait_secs", wait.as_secs())])
                .timeout(wait + Duration::from_secs(5));
        }

        let response = check(request.send().await?, &path).await?;
        if response.status() == StatusCode::ACCEPTED {
            let pending: PendingReply = decode(response).await?;
            return Ok(ResultPoll::Pending(pending.status));
        }
        Ok(ResultPoll::Finished(decode(response).await?))
    }

    /// Get JSON from an endpoint.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.url(path);
        debug!(url = %url, "GET request");

        let response = self.inner.get(&url).send().await?;
        decode(check(response, path).await?).await
    }
}

async fn check(response: Response, path: &str) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(error_for_status(status, &body, path))
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    response
        .json()
        .await
        .map_err(|e| ClientError::Serialization(e.to_string()))
}

/// Map a non-success response to a client error.
fn error_for_status(status: StatusCode, body: &str, path: &str) -> ClientError {
    let message = serde_json::from_str::<ErrorReply>(body)
        .map(|reply| reply.error)
        .unwrap_or_else(|_| body.to_string());
    match status {
        StatusCode::BAD_REQUEST => ClientError::Rejected(message),
        StatusCode::NOT_FOUND => ClientError::NotFound(format!("HTTP {}: {}", status, path)),
        _ => ClientError::Server {
            status: status.as_u16(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let client = HttpClient::new("http://127.0.0.1:50061/");
        assert_eq!(client.url("/health"), "http://127.0.0.1:50061/health");
    }

    #[test]
    fn test_rejection_carries_server_message() {
        let err = error_for_status(
            StatusCode::BAD_REQUEST,
            r#"{"error":"Goal rejected: unknown group 'left_leg'"}"#,
            "/v1/goals",
        );
        match err {
            ClientError::Rejected(message) => assert!(message.contains("left_leg")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_other_status_keeps_raw_body() {
        let err = error_for_status(StatusCode::BAD_GATEWAY, "upstream down", "/v1/goals");
        match err {
            ClientError::Server { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "upstream down");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(
            error_for_status(StatusCode::NOT_FOUND, "", "/v1/goals/x"),
            ClientError::NotFound(_)
        ));
    }
}
