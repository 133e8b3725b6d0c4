//! Axum router for task intake

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use pagesmith_core::{PagesmithConfig, Task};
use pagesmith_orchestrator::Coordinator;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::dispatch::{SpawnDispatcher, TaskDispatcher};

pub const ACCEPTED_MESSAGE: &str = "Task received and is being processed.";

/// Shared application state
#[derive(Debug)]
pub struct AppState {
    pub config: Arc<PagesmithConfig>,
    pub dispatcher: Arc<dyn TaskDispatcher>,
}

pub type SharedState = Arc<AppState>;

/// Request rejected before anything was scheduled
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid secret")]
    Unauthorized,

    #[error("{0}")]
    InvalidTask(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::InvalidTask(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Build the router with all intake and status routes
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/process-task", post(process_task))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until ctrl-c, running accepted tasks in the background
pub async fn serve(config: Arc<PagesmithConfig>) -> anyhow::Result<()> {
    let coordinator = Arc::new(Coordinator::from_config(Arc::clone(&config))?);
    let state = Arc::new(AppState {
        dispatcher: Arc::new(SpawnDispatcher::new(coordinator)),
        config: Arc::clone(&config),
    });

    let bind_addr = config.service.bind_addr.as_str();
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(%bind_addr, account = config.account(), "Pagesmith listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;
    Ok(())
}

/// GET /
async fn index() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "LLM Agent is running."
    }))
}

/// GET /health
async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// POST /api/process-task - authenticate, acknowledge, run in the background
async fn process_task(
    State(app): State<SharedState>,
    Json(task): Json<Task>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !secrets_match(&task.secret, &app.config.credentials.student_secret) {
        warn!(task = %task.id, email = %task.email, "Rejected task with invalid secret");
        return Err(ApiError::Unauthorized);
    }
    task.validate()
        .map_err(|e| ApiError::InvalidTask(e.to_string()))?;

    info!(task = %task.id, round = task.round, "Task accepted");
    app.dispatcher.dispatch(task);

    Ok(Json(json!({ "message": ACCEPTED_MESSAGE })))
}

/// Compare without short-circuiting on the first differing byte
fn secrets_match(given: &str, expected: &str) -> bool {
    let (given, expected) = (given.as_bytes(), expected.as_bytes());
    if given.len() != expected.len() {
        return false;
    }
    given
        .iter()
        .zip(expected)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secrets_match() {
        assert!(secrets_match("test-secret", "test-secret"));
        assert!(!secrets_match("test-secreT", "test-secret"));
        assert!(!secrets_match("test", "test-secret"));
        assert!(!secrets_match("", "test-secret"));
    }

    #[test]
    fn test_error_status() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = ApiError::InvalidTask("round must be at least 1".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
