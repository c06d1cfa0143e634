use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Fallback for any route the gateway does not serve.
pub async fn not_found_handler(uri: Uri, headers: HeaderMap) -> Response {
    unpublished(uri.path().trim_start_matches('/'), &headers)
}

/// 404 for a path with nothing published, as JSON when the caller asks for it.
pub fn unpublished(path: &str, headers: &HeaderMap) -> Response {
    let wants_json = headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("application/json"));

    if wants_json {
        let body = serde_json::json!({ "error": "unpublished", "path": path });
        return (StatusCode::NOT_FOUND, Json(body)).into_response();
    }
    (
        StatusCode::NOT_FOUND,
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        format!("nothing is published at /{path}\n"),
    )
        .into_response()
}

pub async fn livez_handler() -> Response {
    let msg = serde_json::json!({"status": "ok"});
    (StatusCode::OK, Json(msg)).into_response()
}
