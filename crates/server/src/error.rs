use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use services::TrackingError;

/// Failure returned by an endpoint, rendered as `{error, details?}`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{message}: {source}")]
    Internal {
        message: &'static str,
        #[source]
        source: TrackingError,
    },
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Wraps a tracking failure under the endpoint's generic message.
    pub fn internal(message: &'static str) -> impl FnOnce(TrackingError) -> Self {
        move |source| Self::Internal { message, source }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::BadRequest(message) => json!({ "error": message }),
            ApiError::NotFound(message) => json!({ "error": message }),
            // Storage adapters do not log their own failures; this is the one report.
            ApiError::Internal { message, source } => {
                tracing::error!(error = %source, "{message}");
                json!({ "error": message, "details": source.to_string() })
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::StorageError;

    #[test]
    fn statuses_follow_variant() {
        assert_eq!(
            ApiError::bad_request("Session ID is required").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotFound("File not found").status(),
            StatusCode::NOT_FOUND
        );
        let internal = ApiError::internal("Failed to save email")(TrackingError::Storage(
            StorageError::Connection("pool closed".into()),
        ));
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(internal.to_string().starts_with("Failed to save email: "));
    }

    #[tokio::test]
    async fn internal_errors_render_message_and_details() {
        let response = ApiError::internal("Failed to update drop-off page")(
            TrackingError::Storage(StorageError::Connection("database is locked".into())),
        )
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Failed to update drop-off page");
        assert_eq!(body["details"], "connection error: database is locked");
    }
}
