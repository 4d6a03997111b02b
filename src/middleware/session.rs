use axum::{
    extract::{FromRequestParts, Request},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::OptionalAuthUser,
    state::AppState,
};

pub const SESSION_HEADER: &str = "x-session-id";

/// Guarantees every request on cart/order routes carries a session id: an
/// incoming `X-Session-ID` is kept, otherwise a fresh UUID is minted. The id
/// is echoed back on the response so guests can persist it.
pub async fn ensure_session_id(mut req: Request, next: Next) -> Response {
    let session_id = req
        .headers()
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if let Ok(value) = HeaderValue::from_str(&session_id) {
        req.headers_mut().insert(SESSION_HEADER, value.clone());
        let mut res = next.run(req).await;
        res.headers_mut().insert(SESSION_HEADER, value);
        res
    } else {
        next.run(req).await
    }
}

/// The key selecting one active cart: the authenticated user when a valid
/// token is present, the session id otherwise.
#[derive(Debug, Clone)]
pub struct CartIdentity {
    pub user_id: Option<Uuid>,
    pub session_id: String,
}

impl CartIdentity {
    pub fn is_guest(&self) -> bool {
        self.user_id.is_none()
    }
}

impl FromRequestParts<AppState> for CartIdentity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let OptionalAuthUser(user) =
            OptionalAuthUser::from_request_parts(parts, state).await?;

        let session_id = parts
            .headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if user.is_none() && session_id.is_empty() {
            return Err(AppError::Validation("Session ID required".into()));
        }

        Ok(CartIdentity {
            user_id: user.map(|u| u.user_id),
            session_id,
        })
    }
}
