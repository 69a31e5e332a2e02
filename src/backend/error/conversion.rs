/**
 * Error Conversion
 *
 * Turns a `BackendError` into an HTTP response so handlers can return it
 * directly. The body is always JSON:
 *
 * ```json
 * {
 *   "error": "sync connection not found: 3f0c...",
 *   "status": 404
 * }
 * ```
 */

use axum::{
    http::header,
    response::{IntoResponse, Response},
    Json,
};

use crate::backend::error::types::BackendError;

impl IntoResponse for BackendError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.message();

        if status.is_server_error() {
            tracing::error!("[Http] {} {}", status.as_u16(), message);
        } else {
            tracing::debug!("[Http] {} {}", status.as_u16(), message);
        }

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (
            status,
            [(header::CONTENT_TYPE, "application/json")],
            Json(body),
        )
            .into_response()
    }
}
