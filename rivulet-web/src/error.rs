//! Mapping of core errors onto HTTP responses.

use axum::Json;
use axum::http::header::{ACCEPT_RANGES, CONTENT_RANGE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use rivulet_core::streaming::unsatisfied_content_range;
use rivulet_core::{StreamingError, TorrentError};
use serde_json::json;
use tracing::warn;

/// Errors a handler can return before the response status is sent.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    NotFound { message: String },

    #[error("Range not satisfiable for {length} byte file")]
    RangeNotSatisfiable { length: u64 },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<TorrentError> for ApiError {
    fn from(error: TorrentError) -> Self {
        match error {
            TorrentError::TorrentNotFound { .. }
            | TorrentError::FileIndexOutOfRange { .. }
            | TorrentError::Closed => ApiError::NotFound {
                message: error.to_string(),
            },
            other => ApiError::Internal {
                message: other.to_string(),
            },
        }
    }
}

impl From<StreamingError> for ApiError {
    fn from(error: StreamingError) -> Self {
        match error {
            StreamingError::FileNotFound { .. } => ApiError::NotFound {
                message: error.to_string(),
            },
            StreamingError::RangeNotSatisfiable { length } => {
                ApiError::RangeNotSatisfiable { length }
            }
            StreamingError::Upstream(e) => e.into(),
            other => ApiError::Internal {
                message: other.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound { message } => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            ApiError::RangeNotSatisfiable { length } => {
                let mut response = StatusCode::RANGE_NOT_SATISFIABLE.into_response();
                let headers = response.headers_mut();
                headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
                if let Ok(value) = HeaderValue::from_str(&unsatisfied_content_range(length)) {
                    headers.insert(CONTENT_RANGE, value);
                }
                response
            }
            ApiError::Internal { message } => {
                warn!(error = %message, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": message })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsatisfiable_range_response() {
        let response = ApiError::RangeNotSatisfiable { length: 1000 }.into_response();
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()[CONTENT_RANGE], "bytes */1000");
    }

    #[test]
    fn test_error_status_mapping() {
        let not_found: ApiError = TorrentError::TorrentNotFound { id: "abc".into() }.into();
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let missing: ApiError = StreamingError::FileNotFound {
            path: "x.mkv".into(),
        }
        .into();
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);

        let storage: ApiError = TorrentError::Storage {
            reason: "disk".into(),
        }
        .into();
        assert_eq!(
            storage.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
