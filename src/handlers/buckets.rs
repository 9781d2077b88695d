use axum::{
    extract::{Form, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use crate::errors::{AppError, AppResult, StorageError};
use crate::errors::response::error_page;
use crate::models::BucketForm;
use crate::state::AppState;
use crate::templates::{escape_html, render};

const NO_BUCKETS: &str = "<h2>No buckets found in the active project.</h2><p><a href='/'>Back to Home</a></p>";

fn bucket_name(form: BucketForm) -> AppResult<String> {
    let name = form.bucket_name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("bucket_name must not be empty".into()));
    }
    Ok(name)
}

pub async fn select_active_bucket(State(state): State<AppState>) -> AppResult<Response> {
    let buckets = state.storage.list_buckets().await?;
    tracing::debug!("Available buckets: {:?}", buckets);

    if buckets.is_empty() {
        return Ok(Html(NO_BUCKETS).into_response());
    }

    let active = state.active_bucket.get().await;
    let options = buckets
        .iter()
        .map(|name| {
            let selected = if *name == active { " selected" } else { "" };
            let name = escape_html(name);
            format!(r#"<option value="{}"{}>{}</option>"#, name, selected, name)
        })
        .collect::<Vec<_>>()
        .join("\n");

    let html = render(
        state.templates_dir(),
        "select_active_bucket.html",
        &[("bucket_options", options.as_str())],
    )
    .await?;
    Ok(Html(html).into_response())
}

pub async fn set_active_bucket(
    State(state): State<AppState>,
    Form(form): Form<BucketForm>,
) -> AppResult<Response> {
    let name = bucket_name(form)?;

    // Reject names that do not resolve to a bucket before switching
    state.storage.get_bucket(&name).await?;
    state.active_bucket.set(name.clone()).await;

    tracing::info!("Active bucket set to {}", name);
    Ok(Redirect::to("/").into_response())
}

pub async fn create_bucket(
    State(state): State<AppState>,
    Form(form): Form<BucketForm>,
) -> AppResult<Response> {
    let name = bucket_name(form)?;

    match state.storage.create_bucket(&name).await {
        Ok(bucket) => {
            tracing::info!("Created bucket {}", bucket.name);
            Ok(Html(format!(
                "<h2>Bucket '{}' created successfully.</h2><p><a href='/'>Back to Home</a></p>",
                escape_html(&bucket.name)
            ))
            .into_response())
        }
        Err(StorageError::Conflict(_)) => Ok(error_page(
            StatusCode::CONFLICT,
            &format!("Bucket '{}' already exists.", name),
        )),
        Err(e) => Err(e.into()),
    }
}

pub async fn list_buckets(State(state): State<AppState>) -> AppResult<Response> {
    let buckets = state.storage.list_buckets().await?;
    if buckets.is_empty() {
        return Ok(Html(NO_BUCKETS).into_response());
    }

    let items = buckets
        .iter()
        .map(|name| format!("<li>{}</li>", escape_html(name)))
        .collect::<String>();

    let html = render(state.templates_dir(), "list_buckets.html", &[("buckets", items.as_str())]).await?;
    Ok(Html(html).into_response())
}

pub async fn delete_bucket(
    State(state): State<AppState>,
    Form(form): Form<BucketForm>,
) -> AppResult<Response> {
    let name = bucket_name(form)?;

    match state.storage.delete_bucket(&name).await {
        Ok(()) => {
            tracing::info!("Deleted bucket {}", name);
            Ok(Html(format!(
                "<h2>Bucket '{}' deleted successfully.</h2><p><a href='/'>Back to Home</a></p>",
                escape_html(&name)
            ))
            .into_response())
        }
        Err(StorageError::NotFound(_)) => Ok(error_page(
            StatusCode::NOT_FOUND,
            &format!("Bucket '{}' not found.", name),
        )),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        Router,
    };
    use std::sync::Arc;
    use tower::ServiceExt;
    use crate::services::{InMemoryStorage, ObjectStorage};
    use crate::test_support::{body_string, test_state};

    fn app(storage: &InMemoryStorage) -> Router {
        crate::build_router(test_state(Arc::new(storage.clone())))
    }

    fn form_post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_bucket() {
        let storage = InMemoryStorage::default();
        let response = app(&storage)
            .oneshot(form_post("/create-bucket", "bucket_name=fresh"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("created successfully"));
        assert!(storage.get_bucket("fresh").await.is_ok());
    }

    #[tokio::test]
    async fn test_create_existing_bucket() {
        let storage = InMemoryStorage::with_buckets(&["taken"]);
        let response = app(&storage)
            .oneshot(form_post("/create-bucket", "bucket_name=taken"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert!(body_string(response).await.contains("already exists"));
    }

    #[tokio::test]
    async fn test_create_bucket_requires_name() {
        let storage = InMemoryStorage::default();
        let response = app(&storage)
            .oneshot(form_post("/create-bucket", "bucket_name=+"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_bucket() {
        let storage = InMemoryStorage::with_buckets(&["old"]);
        let response = app(&storage)
            .oneshot(form_post("/delete-bucket", "bucket_name=old"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app(&storage)
            .oneshot(form_post("/delete-bucket", "bucket_name=old"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_string(response).await.contains("not found"));
    }

    #[tokio::test]
    async fn test_list_buckets() {
        let storage = InMemoryStorage::with_buckets(&["alpha", "beta"]);
        let response = app(&storage)
            .oneshot(Request::builder().uri("/list-buckets").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body = body_string(response).await;
        assert!(body.contains("<li>alpha</li>"));
        assert!(body.contains("<li>beta</li>"));
    }

    #[tokio::test]
    async fn test_list_buckets_empty() {
        let storage = InMemoryStorage::default();
        let response = app(&storage)
            .oneshot(Request::builder().uri("/select-active-bucket").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(body_string(response).await.contains("No buckets found"));
    }

    #[tokio::test]
    async fn test_set_active_bucket() {
        let storage = InMemoryStorage::with_buckets(&["test-bucket", "other"]);
        let state = test_state(Arc::new(storage.clone()));
        let active = state.active_bucket.clone();
        let app = crate::build_router(state);

        let response = app
            .clone()
            .oneshot(form_post("/set-active-bucket", "bucket_name=other"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(active.get().await, "other");

        let response = app
            .oneshot(form_post("/set-active-bucket", "bucket_name=missing"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(active.get().await, "other");
    }
}
