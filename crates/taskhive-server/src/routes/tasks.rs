use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{get, put},
    Extension, Json, Router,
};
use serde_json::{json, Value};

use crate::auth::CurrentUser;
use crate::multipart::TaskForm;

use super::{bad_request, to_error, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/stats", get(stats))
        .route("/api/tasks/{id}", put(update_task).delete(delete_task))
}

async fn list_tasks(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .service
        .list_tasks(&user.caller())
        .await
        .map(|t| Json(json!(t)))
        .map_err(to_error)
}

async fn create_task(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let form = TaskForm::collect(multipart).await.map_err(bad_request)?;
    let input = form.create_input().map_err(bad_request)?;
    state
        .service
        .create_task(&user.caller(), &input, form.uploads)
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
        .update_task(&user.caller(), &id, &update, &deleted_files, uploads)
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

async fn stats(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .service
        .stats(Some(&user.id))
        .await
        .map(|s| Json(json!(s)))
        .map_err(to_error)
}
