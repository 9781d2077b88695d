use axum::{
    response::{Html, IntoResponse, Response},
    http::StatusCode,
};
use crate::errors::{AppError, StorageError};
use crate::templates::escape_html;

// The IntoResponse implementation renders AppError as a small HTML error page.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Storage(err) => storage_status(err),

            // Missing templates are our fault, not the caller's
            AppError::File(_) => StatusCode::INTERNAL_SERVER_ERROR,

            AppError::Upload(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
        };

        if status.is_server_error() {
            tracing::error!("Request failed with {}: {}", status, self);
        } else {
            tracing::warn!("Request rejected with {}: {}", status, self);
        }

        error_page(status, &self.to_string())
    }
}

fn storage_status(err: &StorageError) -> StatusCode {
    match err {
        StorageError::NotFound(_) => StatusCode::NOT_FOUND,
        StorageError::Conflict(_) => StatusCode::CONFLICT,
        StorageError::Api { .. } | StorageError::Http(_) | StorageError::Auth(_) => StatusCode::BAD_GATEWAY,
        StorageError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_page(status: StatusCode, message: &str) -> Response {
    let body = format!(
        "<h2>{}</h2><p><a href='/'>Back to Home</a></p>",
        escape_html(message)
    );
    (status, Html(body)).into_response()
}
