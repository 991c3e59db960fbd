use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use taskhive_core::user::{CreateUser, Role, User};
use taskhive_service::ServiceError;

use super::{to_error, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
}

#[derive(Debug, Deserialize)]
struct RegisterPayload {
    name: String,
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    email: String,
    password: String,
}

fn session_body(state: &AppState, user: &User) -> Result<Value, (StatusCode, Json<Value>)> {
    let token = state
        .auth
        .issue_token(user)
        .map_err(|e| to_error(ServiceError::Internal(format!("issue token: {e}"))))?;
    Ok(json!({
        "id": user.id,
        "name": user.name,
        "email": user.email,
        "role": user.role,
        "token": token,
    }))
}

async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let user = state
        .service
        .register_user(
            &CreateUser {
                name: payload.name,
                email: payload.email,
                password: payload.password,
            },
            Role::User,
        )
        .await
        .map_err(to_error)?;
    Ok((StatusCode::CREATED, Json(session_body(&state, &user)?)))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match state
        .service
        .authenticate(&payload.email, &payload.password)
        .await
        .map_err(to_error)?
    {
        Some(user) => Ok(Json(session_body(&state, &user)?)),
        None => Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid email or password" })),
        )),
    }
}
