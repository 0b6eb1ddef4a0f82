//! Mapping from core errors to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{error, warn};

use docsage_core::{Error, ErrorKind};

/// A core error on its way out of a handler. Body is `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::CapabilityFailure | ErrorKind::IndexUnavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
            ErrorKind::UnsupportedInput | ErrorKind::NoDocumentsFound | ErrorKind::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(kind = ?self.0.kind(), "Request failed: {}", self.0);
        } else {
            warn!(kind = ?self.0.kind(), "Bad request: {}", self.0);
        }
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsage_core::Capability;
    use std::time::Duration;

    #[test]
    fn test_status_by_kind() {
        let timeout = ApiError(Error::Timeout {
            capability: Capability::Generation,
            after: Duration::from_secs(60),
        });
        assert_eq!(timeout.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            ApiError(Error::IndexUnavailable("gone".into())).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(ApiError(Error::EmptyQuery).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError(Error::Storage("disk".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
