use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::products::{CategoryRequest, CategoryResponse},
    error::AppResult,
    middleware::auth::{AuthUser, ensure_admin},
    response::ApiResponse,
    routes::params::CategoryListParams,
    services::catalog_service,
    state::AppState,
};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_categories))
        .route("/{id}", get(get_category))
        .route("/slug/{slug}", get(get_category_by_slug))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_category))
        .route("/{id}", put(update_category).delete(delete_category))
}

#[utoipa::path(
    get,
    path = "/api/v1/categories",
    responses(
        (status = 200, description = "Active categories", body = ApiResponse<Vec<CategoryResponse>>),
    ),
    tag = "Categories"
)]
pub async fn list_categories(
    State(state): State<AppState>,
    Query(params): Query<CategoryListParams>,
) -> AppResult<Json<ApiResponse<Vec<CategoryResponse>>>> {
    let resp = catalog_service::list_categories(&state, params.is_active, false).await?;
    Ok(Json(ApiResponse::success(
        "Categories retrieved successfully",
        resp,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category", body = ApiResponse<CategoryResponse>),
        (status = 404, description = "Category not found"),
    ),
    tag = "Categories"
)]
pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CategoryResponse>>> {
    let resp = catalog_service::get_category(&state, id).await?;
    Ok(Json(ApiResponse::success(
        "Category retrieved successfully",
        resp,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/categories/slug/{slug}",
    params(("slug" = String, Path, description = "Category slug")),
    responses(
        (status = 200, description = "Category", body = ApiResponse<CategoryResponse>),
        (status = 404, description = "Category not found"),
    ),
    tag = "Categories"
)]
pub async fn get_category_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<ApiResponse<CategoryResponse>>> {
    let resp = catalog_service::get_category_by_slug(&state, &slug).await?;
    Ok(Json(ApiResponse::success(
        "Category retrieved successfully",
        resp,
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/categories",
    request_body = CategoryRequest,
    responses(
        (status = 201, description = "Category created", body = ApiResponse<CategoryResponse>),
        (status = 409, description = "Slug conflict"),
    ),
    security(("bearer_auth" = [])),
    tag = "Categories"
)]
pub async fn create_category(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CategoryRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<CategoryResponse>>)> {
    ensure_admin(&user)?;
    let resp = catalog_service::create_category(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Category created successfully", resp)),
    ))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = CategoryRequest,
    responses(
        (status = 200, description = "Category updated", body = ApiResponse<CategoryResponse>),
        (status = 404, description = "Category not found"),
        (status = 409, description = "Slug conflict"),
    ),
    security(("bearer_auth" = [])),
    tag = "Categories"
)]
pub async fn update_category(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CategoryRequest>,
) -> AppResult<Json<ApiResponse<CategoryResponse>>> {
    ensure_admin(&user)?;
    let resp = catalog_service::update_category(&state, id, payload).await?;
    Ok(Json(ApiResponse::success(
        "Category updated successfully",
        resp,
    )))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category deleted"),
        (status = 404, description = "Category not found"),
        (status = 422, description = "Category still has products"),
    ),
    security(("bearer_auth" = [])),
    tag = "Categories"
)]
pub async fn delete_category(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    ensure_admin(&user)?;
    catalog_service::delete_category(&state, id).await?;
    Ok(Json(ApiResponse::message("Category deleted successfully")))
}
