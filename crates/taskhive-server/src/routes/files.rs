//! Serves locally stored attachment bytes. Only the local backend routes
//! URLs through here; S3 URLs are absolute and bypass the server.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use super::{to_error, AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/uploads/{key}", get(serve_upload))
}

async fn serve_upload(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, (StatusCode, Json<Value>)> {
    match state.service.store().read(&key).await {
        Ok(Some(data)) => {
            let mime = mime_guess::from_path(&key).first_or_octet_stream();
            Ok(Response::builder()
                .header(header::CONTENT_TYPE, mime.as_ref())
                .header(header::CACHE_CONTROL, "public, max-age=31536000")
                .body(Body::from(data))
                .unwrap())
        }
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "no such file" })),
        )),
        Err(e) => Err(to_error(e.into())),
    }
}
