use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::response::ApiResponse;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    // Precondition failures the client can act on: insufficient stock,
    // invalid cart, order not cancellable.
    #[error("{0}")]
    FailedPrecondition(String),

    #[error("Database error")]
    DbError(#[from] sea_orm::DbErr),

    #[error("Database error")]
    SqlError(#[from] sqlx::Error),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::FailedPrecondition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::DbError(_) | AppError::SqlError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Technical detail for the `error` envelope field. Database and internal
    /// errors log their detail server-side and send none to the client.
    fn detail(&self) -> Option<String> {
        match self {
            AppError::DbError(err) => {
                tracing::error!(error = %err, "database error");
                None
            }
            AppError::SqlError(err) => {
                tracing::error!(error = %err, "database error");
                None
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal error");
                None
            }
            _ => Some(self.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ApiResponse::<serde_json::Value>::failure(self.to_string(), self.detail());
        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_http_conventions() {
        assert_eq!(
            AppError::Validation("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Unauthorized("no".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound("Order").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Conflict("dup".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::FailedPrecondition("stock".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn not_found_message_names_the_resource() {
        assert_eq!(
            AppError::NotFound("Product").to_string(),
            "Product not found"
        );
    }
}
