pub mod admin;
pub mod auth;
pub mod files;
pub mod health;
pub mod tasks;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::{middleware, Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use taskhive_service::{ServiceError, TaskService};
use taskhive_store::{MAX_FILES_PER_REQUEST, MAX_FILE_SIZE};

use crate::auth::{auth_middleware, require_admin, AuthConfig};

/// Room for a full batch of uploads plus the scalar fields around them.
const MAX_BODY_BYTES: usize = (MAX_FILES_PER_REQUEST + 1) * MAX_FILE_SIZE;

pub struct InnerAppState {
    pub service: TaskService,
    pub auth: AuthConfig,
}

pub type AppState = Arc<InnerAppState>;

pub fn build_router(service: TaskService, auth: AuthConfig) -> Router {
    let state: AppState = Arc::new(InnerAppState { service, auth });

    let public = Router::new()
        .merge(health::routes())
        .merge(auth::routes())
        .merge(files::routes());

    let protected = Router::new()
        .merge(tasks::routes())
        .merge(admin::routes().route_layer(middleware::from_fn(require_admin)))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    public
        .merge(protected)
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Map a service error onto the HTTP taxonomy. Internal faults are logged
/// and returned with a redacted message.
pub(crate) fn to_error(e: ServiceError) -> (StatusCode, Json<Value>) {
    let status = match &e {
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
        ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %e, "request failed");
        return (status, Json(json!({ "error": "internal server error" })));
    }
    (status, Json(json!({ "error": e.to_string() })))
}

pub(crate) fn bad_request(msg: String) -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": msg })))
}
