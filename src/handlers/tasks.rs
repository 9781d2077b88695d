use axum::{
    extract::{Form, Path, State},
    response::{IntoResponse, Response, Json},
    http::StatusCode,
};
use serde_json::json;
use crate::errors::{AppError, AppResult};
use crate::models::DirectoryForm;
use crate::state::AppState;

pub async fn upload_directory(
    State(state): State<AppState>,
    Form(form): Form<DirectoryForm>,
) -> AppResult<Response> {
    if form.directory_path.trim().is_empty() {
        return Err(AppError::Validation("directory_path must not be empty".into()));
    }

    // The run keeps this bucket even if the active bucket changes meanwhile
    let bucket = state.active_bucket.get().await;
    let task_id = state.engine.submit(bucket, form.directory_path).await;

    Ok(Json(json!({ "task_id": task_id })).into_response())
}

pub async fn get_task_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Response {
    tracing::debug!("Checking status for task: {}", task_id);

    match state.engine.task_status(&task_id).await {
        Some(task) => {
            tracing::trace!("Task {} status: {}", task_id, task.status);
            Json(task).into_response()
        }
        None => {
            tracing::warn!("Task not found: {}", task_id);
            (StatusCode::NOT_FOUND, Json(json!({ "error": "Invalid task ID" }))).into_response()
        }
    }
}

pub async fn list_tasks(State(state): State<AppState>) -> Response {
    Json(state.engine.all_tasks().await).into_response()
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;
    use crate::services::InMemoryStorage;
    use crate::test_support::{body_string, test_state};

    fn submit(path: &str) -> Request<Body> {
        let body = format!("directory_path={}", urlencoding::encode(path));
        Request::builder()
            .method("POST")
            .uri("/upload-directory")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        serde_json::from_str(&body_string(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_submit_and_poll_until_completed() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("upload-me");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(root.join("a.txt"), "a").unwrap();
        std::fs::write(root.join("b.json"), "{}").unwrap();

        let storage = InMemoryStorage::with_buckets(&["test-bucket"]);
        let app = crate::build_router(test_state(Arc::new(storage)));

        let response = app.clone().oneshot(submit(root.to_str().unwrap())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let task_id = json_body(response).await["task_id"].as_str().unwrap().to_string();

        let mut task = Value::Null;
        for _ in 0..500 {
            let response = app
                .clone()
                .oneshot(get(&format!("/task-status/{}", task_id)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            task = json_body(response).await;
            if task["status"] == "completed" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(task["status"], "completed");
        assert_eq!(task["bucket"], "test-bucket");
        assert_eq!(task["files"].as_array().unwrap().len(), 2);

        let response = app.oneshot(get("/tasks")).await.unwrap();
        let tasks = json_body(response).await;
        assert!(tasks.get(&task_id).is_some());
    }

    #[tokio::test]
    async fn test_unknown_task_id() {
        let app = crate::build_router(test_state(Arc::new(InMemoryStorage::default())));

        let response = app.oneshot(get("/task-status/not-a-task")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await, serde_json::json!({ "error": "Invalid task ID" }));
    }

    #[tokio::test]
    async fn test_empty_directory_path_rejected() {
        let app = crate::build_router(test_state(Arc::new(InMemoryStorage::default())));

        let response = app.oneshot(submit("   ")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
