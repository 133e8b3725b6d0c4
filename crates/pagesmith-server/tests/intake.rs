use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use pagesmith_agent::{MockModel, ModelReply};
use pagesmith_core::{PagesmithConfig, RetryPolicy};
use pagesmith_git::{MemoryFactory, MemoryRemotes};
use pagesmith_github::MockHostingApi;
use pagesmith_orchestrator::{Collaborators, Coordinator, RecordingCallback};
use pagesmith_server::{router, AppState, RecordingDispatcher, SpawnDispatcher, ACCEPTED_MESSAGE};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn app(dispatcher: Arc<RecordingDispatcher>) -> Router {
    router(Arc::new(AppState {
        config: Arc::new(PagesmithConfig::for_account("octo")),
        dispatcher,
    }))
}

fn submission(secret: &str, round: u32) -> Value {
    json!({
        "email": "student@example.com",
        "secret": secret,
        "task": "demo",
        "round": round,
        "nonce": "abc-123",
        "brief": "a hello-world page",
        "checks": ["page has a heading"],
        "evaluation_url": "https://evaluator.example.com/notify",
        "attachments": []
    })
}

fn post(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/process-task")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_status_endpoints() {
    let app = app(Arc::new(RecordingDispatcher::new()));

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({ "status": "ok", "message": "LLM Agent is running." })
    );

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_accepted_task_is_dispatched() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let app = app(Arc::clone(&dispatcher));

    let response = app.oneshot(post(&submission("test-secret", 1))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "message": ACCEPTED_MESSAGE }));

    let tasks = dispatcher.tasks();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, "demo");
    assert_eq!(tasks[0].round, 1);
    assert_eq!(tasks[0].nonce, "abc-123");
    assert_eq!(tasks[0].callback_url, "https://evaluator.example.com/notify");
}

#[tokio::test]
async fn test_wrong_secret_schedules_nothing() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let app = app(Arc::clone(&dispatcher));

    let response = app.oneshot(post(&submission("guess", 1))).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(dispatcher.tasks().is_empty());
}

#[tokio::test]
async fn test_invalid_round_is_rejected() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let app = app(Arc::clone(&dispatcher));

    let response = app.oneshot(post(&submission("test-secret", 0))).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("round"));
    assert!(dispatcher.tasks().is_empty());
}

#[tokio::test]
async fn test_path_like_task_id_is_rejected() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let app = app(Arc::clone(&dispatcher));
    let mut body = submission("test-secret", 1);
    body["task"] = json!("a/b");

    let response = app.oneshot(post(&body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(dispatcher.tasks().is_empty());
}

#[tokio::test]
async fn test_malformed_payload_is_client_error() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let app = app(Arc::clone(&dispatcher));

    let response = app
        .oneshot(post(&json!({ "secret": "test-secret" })))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
    assert!(dispatcher.tasks().is_empty());
}

#[tokio::test]
async fn test_spawned_run_reports_to_callback() {
    let root = tempfile::tempdir().unwrap();
    let mut config = PagesmithConfig::for_account("octo");
    config.service.workspace_root = root.path().to_path_buf();
    config.service.github.activation_delay_secs = 0;
    let config = Arc::new(config);

    let remotes = MemoryRemotes::new();
    let callback = Arc::new(RecordingCallback::new());
    let collaborators = Collaborators {
        hosting: Arc::new(MockHostingApi::backed_by(remotes.clone(), Arc::clone(&config))),
        model: Arc::new(MockModel::always(ModelReply::site("Hello"))),
        callback: callback.clone(),
        working_copies: Arc::new(MemoryFactory::new(remotes)),
    };
    let coordinator = Coordinator::new(Arc::clone(&config), collaborators)
        .with_generation_policy(RetryPolicy::immediate(1))
        .with_activation_policy(RetryPolicy::immediate(1))
        .with_notification_policy(RetryPolicy::immediate(1));

    let app = router(Arc::new(AppState {
        config: Arc::clone(&config),
        dispatcher: Arc::new(SpawnDispatcher::new(Arc::new(coordinator))),
    }));

    let response = app.oneshot(post(&submission("test-secret", 1))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let delivered = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let delivered = callback.delivered();
            if !delivered.is_empty() {
                return delivered;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(delivered[0].1.nonce, "abc-123");
    assert_eq!(delivered[0].1.pages_url, "https://octo.github.io/demo/");
}
