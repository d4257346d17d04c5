//! Drives the HTTP client against an in-process stub job controller

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use relay_client::{ClientError, JobController, JobControllerClient};
use relay_core::domain::task::{TaskDescriptor, TaskId, TaskStatus};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct StubState {
    submitted: Arc<Mutex<Vec<Value>>>,
}

async fn submit(State(state): State<StubState>, Json(body): Json<Value>) -> Json<Value> {
    state.submitted.lock().unwrap().push(body);
    Json(json!({ "job_id": "task-7" }))
}

async fn status(Path(id): Path<String>) -> Result<Json<Value>, StatusCode> {
    match id.as_str() {
        "task-7" => Ok(Json(json!({ "status": "succeeded", "cmd": "ignored" }))),
        "task-odd" => Ok(Json(json!({ "status": "suspended" }))),
        "task-broken" => Err(StatusCode::INTERNAL_SERVER_ERROR),
        _ => Err(StatusCode::NOT_FOUND),
    }
}

async fn logs(Path(id): Path<String>) -> String {
    if id == "task-7" {
        json!({ "logs": "hello from task-7\n" }).to_string()
    } else {
        "raw log line\n".to_string()
    }
}

async fn start_stub() -> (String, StubState) {
    let state = StubState::default();
    let app = Router::new()
        .route("/jobs", post(submit))
        .route("/jobs/{id}", get(status))
        .route("/jobs/{id}/logs", get(logs))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), state)
}

fn descriptor() -> TaskDescriptor {
    TaskDescriptor {
        experiment: "default".to_string(),
        image: "frolvlad/alpine-bash".to_string(),
        cmd: "/bin/sh -c 'echo hi'".to_string(),
    }
}

#[tokio::test]
async fn test_submit_posts_task_body() {
    let (url, state) = start_stub().await;
    let client = JobControllerClient::new(url);

    let task_id = client.submit(&descriptor()).await.unwrap();
    assert_eq!(task_id, TaskId::from("task-7"));

    let submitted = state.submitted.lock().unwrap();
    assert_eq!(submitted.len(), 1);
    assert_eq!(
        submitted[0],
        json!({
            "experiment": "default",
            "image": "frolvlad/alpine-bash",
            "cmd": "/bin/sh -c 'echo hi'"
        })
    );
}

#[tokio::test]
async fn test_check_status_maps_statuses() {
    let (url, _) = start_stub().await;
    let client = JobControllerClient::new(url);

    let op = client.check_status(&TaskId::from("task-7")).await.unwrap();
    assert_eq!(op.status, TaskStatus::Succeeded);
    assert_eq!(op.task_id, TaskId::from("task-7"));

    let op = client.check_status(&TaskId::from("task-odd")).await.unwrap();
    assert_eq!(op.status, TaskStatus::Other("suspended".to_string()));
    assert!(!op.is_done());
}

#[tokio::test]
async fn test_check_status_errors() {
    let (url, _) = start_stub().await;
    let client = JobControllerClient::new(url);

    let err = client
        .check_status(&TaskId::from("missing"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let err = client
        .check_status(&TaskId::from("task-broken"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::ApiError { status: 500, .. }));
}

#[tokio::test]
async fn test_get_logs_accepts_json_and_text() {
    let (url, _) = start_stub().await;
    let client = JobControllerClient::new(url);

    let logs = client.get_logs(&TaskId::from("task-7")).await.unwrap();
    assert_eq!(logs, "hello from task-7\n");

    let logs = client.get_logs(&TaskId::from("other")).await.unwrap();
    assert_eq!(logs, "raw log line\n");
}

#[tokio::test]
async fn test_unreachable_controller_is_request_error() {
    let client = JobControllerClient::new("http://127.0.0.1:1");
    let err = client.submit(&descriptor()).await.unwrap_err();
    assert!(matches!(err, ClientError::RequestFailed(_)));
}
