use std::time::Instant;

use axum::{
    Json,
    extract::Request,
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use uuid::Uuid;

use crate::error::Error;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// API error that converts to a proper HTTP response with the wire body
/// `{"error": {"code": "<KIND>", "message": "<text>"}}`.
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "INVALID_REQUEST",
            message: message.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "INTERNAL_ERROR",
            message: message.into(),
        }
    }
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::TeamExists | Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        Error::AccessDenied | Error::UserInactive | Error::NotReviewer => StatusCode::FORBIDDEN,
        Error::UserNotFound
        | Error::TeamNotFound
        | Error::CommitNotFound
        | Error::RootCommitNotFound
        | Error::InvalidParent
        | Error::PrNotFound => StatusCode::NOT_FOUND,
        Error::CommitNotLeaf
        | Error::CommitNameExists
        | Error::PrExists
        | Error::PrMerged
        | Error::PrNotOpen
        | Error::PrRejected
        | Error::NotAllApproved
        | Error::NoCandidate => StatusCode::CONFLICT,
        Error::Database(_) | Error::Io(_) | Error::Config(_) | Error::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = status_for(&err);
        // Storage-layer detail belongs in the log, not in the response body.
        let message = match &err {
            Error::Database(_) | Error::Io(_) | Error::Internal(_) => {
                tracing::error!("internal error: {err}");
                "internal server error".to_string()
            }
            _ => err.to_string(),
        };
        Self {
            status,
            code: err.code(),
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "error": { "code": self.code, "message": self.message } });
        (self.status, Json(body)).into_response()
    }
}

/// Request middleware shared by all three services: echo (or mint) the
/// request id, log method/path/status/latency.
pub async fn trace_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let start = Instant::now();

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    tracing::info!(
        request_id = %request_id,
        "{} {} {} {}ms",
        method,
        path,
        response.status().as_u16(),
        start.elapsed().as_millis()
    );

    response
}
