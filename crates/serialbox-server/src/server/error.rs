use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serialbox::ErrorKind;
use tokio::task::JoinError;

/// A failed request, rendered as `{ "error": kind, "detail": message }`.
#[derive(Debug)]
pub enum ApiError {
    Serialbox(serialbox::Error),
    /// The blocking task running the library call panicked or was
    /// cancelled.
    Task(JoinError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    detail: String,
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Serialbox(err) => err.kind(),
            Self::Task(_) => ErrorKind::Internal,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Validation | ErrorKind::RuleViolation => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> String {
        match self {
            Self::Serialbox(err) => err.to_string(),
            Self::Task(err) => format!("request task failed: {err}"),
        }
    }
}

impl From<serialbox::Error> for ApiError {
    fn from(err: serialbox::Error) -> Self {
        Self::Serialbox(err)
    }
}

impl From<JoinError> for ApiError {
    fn from(err: JoinError) -> Self {
        Self::Task(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();
        let detail = self.detail();
        if status.is_server_error() {
            tracing::error!(%kind, error = %detail, "request failed");
        } else {
            tracing::debug!(%kind, error = %detail, "request rejected");
        }
        let body = ErrorBody {
            error: kind.as_str(),
            detail,
        };
        (status, Json(body)).into_response()
    }
}
