use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::auth::UserResponse,
    error::AppResult,
    middleware::auth::{AuthUser, ensure_admin},
    response::ApiResponse,
    services::auth_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/profile", get(profile))
        .route("/{id}", get(get_user))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/profile",
    responses(
        (status = 200, description = "Current user profile", body = ApiResponse<UserResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<UserResponse>>> {
    let resp = auth_service::get_user(&state, user.user_id).await?;
    Ok(Json(ApiResponse::success(
        "Profile retrieved successfully",
        resp,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User found", body = ApiResponse<UserResponse>),
        (status = 404, description = "User not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<UserResponse>>> {
    let resp = auth_service::get_user(&state, id).await?;
    Ok(Json(ApiResponse::success("User found", resp)))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/",
    responses(
        (status = 200, description = "All users (admin)", body = ApiResponse<Vec<UserResponse>>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<Vec<UserResponse>>>> {
    ensure_admin(&user)?;
    let resp = auth_service::list_users(&state).await?;
    Ok(Json(ApiResponse::success(
        "Users fetched successfully",
        resp,
    )))
}
