use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use specforge_core::error::ForgeError;

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// Construct a 400 Bad Request error with the given message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(ForgeError::Validation(msg.into()).into())
    }
}

fn status_for(e: &ForgeError) -> StatusCode {
    match e {
        ForgeError::DiscoveryNotFound(_)
        | ForgeError::PrdNotFound(_)
        | ForgeError::PrdNotInProject { .. }
        | ForgeError::UserStoryNotFound(_)
        | ForgeError::NoActivePrd
        | ForgeError::NoReadyPrd => StatusCode::NOT_FOUND,
        ForgeError::AlreadyComplete
        | ForgeError::InvalidStageTransition { .. }
        | ForgeError::InvalidStatusChange { .. }
        | ForgeError::InvalidStatus(_)
        | ForgeError::MaxRetriesExceeded { .. }
        | ForgeError::Validation(_) => StatusCode::BAD_REQUEST,
        ForgeError::PrdExists(_) | ForgeError::DiscoveryExists(_) => StatusCode::CONFLICT,
        ForgeError::NotInitialized
        | ForgeError::Store(_)
        | ForgeError::Io(_)
        | ForgeError::Yaml(_)
        | ForgeError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self
            .0
            .downcast_ref::<ForgeError>()
            .map(status_for)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(error = %format!("{:#}", self.0), "request failed");
        }

        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
