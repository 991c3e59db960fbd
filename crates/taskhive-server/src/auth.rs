//! The authorization gate: JWT issue/verify plus the axum middleware
//! that resolves the caller's identity before a handler runs.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;

use taskhive_core::user::{Caller, Role, User};
use taskhive_service::ServiceError;

use crate::routes::AppState;

/// Issued tokens stay valid for 30 days.
pub const TOKEN_TTL_DAYS: i64 = 30;

#[derive(Clone)]
pub struct AuthConfig {
    secret: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub name: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl AuthConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// `None` when `TASKHIVE_JWT_SECRET` is unset or empty; the server
    /// refuses to start without it.
    pub fn from_env() -> Option<Self> {
        std::env::var("TASKHIVE_JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .map(Self::new)
    }

    pub fn issue_token(&self, user: &User) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.clone(),
            name: user.name.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
    }

    pub fn decode_token(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
    }
}

/// The authenticated caller, injected into request extensions by
/// [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl CurrentUser {
    pub fn caller(&self) -> Caller {
        Caller::new(self.id.clone(), self.role)
    }
}

fn unauthorized(msg: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": msg }))).into_response()
}

/// Requires a valid `Authorization: Bearer <jwt>` header. The user record
/// is looked up fresh on every request, so a role change takes effect
/// without reissuing the token.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let Some(token) = token else {
        return unauthorized("missing bearer token");
    };

    let claims = match state.auth.decode_token(token) {
        Ok(claims) => claims,
        Err(_) => return unauthorized("invalid or expired token"),
    };

    let user = match state.service.get_user(&claims.sub).await {
        Ok(user) => user,
        Err(ServiceError::NotFound(_)) => return unauthorized("unknown user"),
        Err(e) => return crate::routes::to_error(e).into_response(),
    };

    request.extensions_mut().insert(CurrentUser {
        id: user.id,
        name: user.name,
        email: user.email,
        role: user.role,
    });
    next.run(request).await
}

/// Layered on every `/api/admin` route, after [`auth_middleware`].
pub async fn require_admin(
    Extension(user): Extension<CurrentUser>,
    request: Request,
    next: Next,
) -> Response {
    if user.role.is_admin() {
        next.run(request).await
    } else {
        (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "admin access required" })),
        )
            .into_response()
    }
}
