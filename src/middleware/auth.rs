use axum::{
    extract::{FromRequestParts, Request, State},
    http::{Method, header},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{error::AppError, models::Role, state::AppState, token};

pub const CSRF_HEADER: &str = "x-csrf-token";

/// Identity extracted from a verified bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub csrf_token: String,
}

pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    if user.role != Role::Admin {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

fn bearer_token(parts: &axum::http::request::Parts) -> Result<&str, AppError> {
    let auth_header = parts
        .headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("Authorization header required".into()))?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid authorization header format".into()))?;

    auth_str
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization header format".into()))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = token::verify(&state.config.jwt_secret, token)?;

        Ok(AuthUser {
            user_id: claims.user_id,
            email: claims.email,
            role: claims.role,
            csrf_token: claims.csrf_token,
        })
    }
}

/// Identity for routes that serve both guests and logged-in users. A missing
/// or invalid token degrades to the guest path instead of rejecting.
#[derive(Debug, Clone)]
pub struct OptionalAuthUser(pub Option<AuthUser>);

impl FromRequestParts<AppState> for OptionalAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = match bearer_token(parts) {
            Ok(token) => token::verify(&state.config.jwt_secret, token)
                .ok()
                .map(|claims| AuthUser {
                    user_id: claims.user_id,
                    email: claims.email,
                    role: claims.role,
                    csrf_token: claims.csrf_token,
                }),
            Err(_) => None,
        };
        Ok(OptionalAuthUser(user))
    }
}

/// CSRF double-check for protected route groups: every non-GET request must
/// echo the token-embedded secret in `X-CSRF-Token`.
pub async fn csrf_guard(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if matches!(*req.method(), Method::GET | Method::HEAD | Method::OPTIONS) {
        return Ok(next.run(req).await);
    }

    let (parts, body) = req.into_parts();
    let token = bearer_token(&parts)?;
    let claims = token::verify(&state.config.jwt_secret, token)?;

    let provided = parts
        .headers
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if provided.is_empty() {
        return Err(AppError::Forbidden);
    }
    if provided != claims.csrf_token {
        return Err(AppError::Forbidden);
    }

    let req = Request::from_parts(parts, body);
    Ok(next.run(req).await)
}
