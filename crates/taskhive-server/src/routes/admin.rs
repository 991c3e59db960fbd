//! Cross-user management routes. Every route here sits behind
//! `require_admin` in addition to the bearer-token middleware.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{get, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::CurrentUser;
use crate::multipart::TaskForm;

use super::{bad_request, to_error, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/stats", get(stats))
        .route("/api/admin/tasks", get(list_tasks).post(create_task))
        .route("/api/admin/tasks/{id}", put(update_task).delete(delete_task))
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/assign", put(assign_task))
}

async fn stats(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .service
        .stats(None)
        .await
        .map(|s| Json(json!(s)))
        .map_err(to_error)
}

async fn list_tasks(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .service
        .list_all_tasks()
        .await
        .map(|t| Json(json!(t)))
        .map_err(to_error)
}

async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .service
        .list_users()
        .await
        .map(|u| Json(json!(u)))
        .map_err(to_error)
}

async fn create_task(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let form = TaskForm::collect(multipart).await.map_err(bad_request)?;
    let Some(target) = form.target_user().map(str::to_string) else {
        return Err(bad_request("assignToUserId is required".into()));
    };
    let input = form.create_input().map_err(bad_request)?;
    state
        .service
        .create_task_for(&user.caller(), &target, &input, form.uploads)
        .await
        .map(|t| (StatusCode::CREATED, Json(json!(t))))
        .map_err(to_error)
}

async fn update_task(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let form = TaskForm::collect(multipart).await.map_err(bad_request)?;
    let update = form.update_input().map_err(bad_request)?;
    let TaskForm {
        deleted_files,
        uploads,
        ..
    } = form;
    state
        .service
        .update_task_unchecked(&user.caller(), &id, &update, &deleted_files, uploads)
        .await
        .map(|t| Json(json!(t)))
        .map_err(to_error)
}

async fn delete_task(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .service
        .delete_task(&user.caller(), &id)
        .await
        .map(|_| Json(json!({ "message": "Task deleted" })))
        .map_err(to_error)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignPayload {
    task_id: String,
    user_id: String,
}

async fn assign_task(
    State(state): State<AppState>,
    Json(payload): Json<AssignPayload>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .service
        .assign_task(&payload.task_id, &payload.user_id)
        .await
        .map(|t| Json(json!(t)))
        .map_err(to_error)
}
