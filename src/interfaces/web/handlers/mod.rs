pub mod ai;
pub mod automation;
pub mod health;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::core::error::{AutomationError, ErrorKind};

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::ValidationFailed => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Busy => StatusCode::CONFLICT,
        ErrorKind::RemoteFailure => StatusCode::BAD_GATEWAY,
        ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Map a processor or orchestrator error to its HTTP status and JSON body.
pub(super) fn error_response(err: &AutomationError) -> Response {
    let kind = err.kind();
    if kind == ErrorKind::Storage {
        tracing::error!("Request failed: {}", err);
    }
    (
        status_for(kind),
        Json(serde_json::json!({
            "success": false,
            "error": err.to_string(),
            "errorKind": kind,
            "terminal": err.is_terminal(),
        })),
    )
        .into_response()
}
