use axum::{
    extract::State,
    response::{Html, IntoResponse, Response},
};
use crate::errors::AppResult;
use crate::state::AppState;
use crate::templates::{escape_html, render};

// Pages that only need the active bucket name filled in
async fn serve_page(state: &AppState, template: &str) -> AppResult<Response> {
    tracing::info!("Serving {}", template);

    let bucket = escape_html(&state.active_bucket.get().await);
    let html = render(state.templates_dir(), template, &[("bucket_name", bucket.as_str())]).await?;
    Ok(Html(html).into_response())
}

pub async fn serve_index(State(state): State<AppState>) -> AppResult<Response> {
    serve_page(&state, "index.html").await
}

pub async fn serve_create_bucket_form(State(state): State<AppState>) -> AppResult<Response> {
    serve_page(&state, "create_bucket.html").await
}

pub async fn serve_delete_bucket_form(State(state): State<AppState>) -> AppResult<Response> {
    serve_page(&state, "delete_bucket.html").await
}

pub async fn serve_upload_form(State(state): State<AppState>) -> AppResult<Response> {
    serve_page(&state, "upload.html").await
}

pub async fn serve_upload_directory_form(State(state): State<AppState>) -> AppResult<Response> {
    serve_page(&state, "upload_directory.html").await
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::{Request, StatusCode}};
    use std::sync::Arc;
    use tower::ServiceExt;
    use crate::services::InMemoryStorage;
    use crate::test_support::{body_string, test_state};

    #[tokio::test]
    async fn test_index_shows_active_bucket() {
        let state = test_state(Arc::new(InMemoryStorage::with_buckets(&["test-bucket"])));
        let app = crate::build_router(state);

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("test-bucket"));
    }

    #[tokio::test]
    async fn test_form_pages_render() {
        let state = test_state(Arc::new(InMemoryStorage::default()));
        let app = crate::build_router(state);

        for uri in [
            "/create-bucket-form",
            "/delete-bucket-form",
            "/upload-form",
            "/upload-directory-form",
        ] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{}", uri);
        }
    }
}
