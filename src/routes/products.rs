use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::products::{ProductListResponse, ProductRequest, ProductResponse},
    error::AppResult,
    middleware::auth::{AuthUser, ensure_admin},
    response::{ApiResponse, Pagination},
    routes::params::{FeaturedParams, ProductListParams, SearchParams},
    services::catalog_service,
    state::AppState,
};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/featured", get(featured_products))
        .route("/search", get(search_products))
        .route("/{id}", get(get_product))
        .route("/slug/{slug}", get(get_product_by_slug))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_product))
        .route("/", get(list_products_admin))
        .route("/{id}", put(update_product).delete(delete_product))
}

#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("limit" = Option<i64>, Query, description = "Items per page, default 20"),
        ("category_id" = Option<Uuid>, Query, description = "Filter by category"),
        ("search" = Option<String>, Query, description = "Match name or description"),
        ("sort" = Option<String>, Query, description = "price_asc, price_desc, name_asc, name_desc, newest, oldest, rating, popular"),
    ),
    responses(
        (status = 200, description = "Product list", body = ApiResponse<ProductListResponse>),
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ProductListParams>,
) -> AppResult<Json<ApiResponse<ProductListResponse>>> {
    let (products, page, limit, total) =
        catalog_service::list_products(&state, &params, false).await?;
    let data = ProductListResponse {
        products,
        pagination: Pagination::new(page, limit, total),
    };
    Ok(Json(ApiResponse::success(
        "Products retrieved successfully",
        data,
    )))
}

/// Admin listing honors the is_active override, so inactive products are
/// reachable here and nowhere else.
#[utoipa::path(
    get,
    path = "/api/v1/admin/products",
    responses(
        (status = 200, description = "Product list (admin)", body = ApiResponse<ProductListResponse>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn list_products_admin(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<ProductListParams>,
) -> AppResult<Json<ApiResponse<ProductListResponse>>> {
    ensure_admin(&user)?;
    let (products, page, limit, total) =
        catalog_service::list_products(&state, &params, true).await?;
    let data = ProductListResponse {
        products,
        pagination: Pagination::new(page, limit, total),
    };
    Ok(Json(ApiResponse::success(
        "Products retrieved successfully",
        data,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/featured",
    params(("limit" = Option<i64>, Query, description = "Max items, default 10, cap 50")),
    responses(
        (status = 200, description = "Featured products", body = ApiResponse<Vec<ProductResponse>>),
    ),
    tag = "Products"
)]
pub async fn featured_products(
    State(state): State<AppState>,
    Query(params): Query<FeaturedParams>,
) -> AppResult<Json<ApiResponse<Vec<ProductResponse>>>> {
    let resp = catalog_service::featured_products(&state, params.limit.unwrap_or(10)).await?;
    Ok(Json(ApiResponse::success(
        "Featured products retrieved successfully",
        resp,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/search",
    params(
        ("q" = String, Query, description = "Search query, tokens AND-ed"),
        ("page" = Option<i64>, Query, description = "Page number"),
        ("limit" = Option<i64>, Query, description = "Items per page"),
    ),
    responses(
        (status = 200, description = "Search results", body = ApiResponse<ProductListResponse>),
        (status = 400, description = "Missing query"),
    ),
    tag = "Products"
)]
pub async fn search_products(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<ApiResponse<ProductListResponse>>> {
    let (page, limit, offset) = params.page.normalize(20);
    let query = params.q.unwrap_or_default();
    let (products, page, limit, total) =
        catalog_service::search_products(&state, &query, page, limit, offset).await?;
    let message = format!("Found {total} products for '{query}'");
    let data = ProductListResponse {
        products,
        pagination: Pagination::new(page, limit, total),
    };
    Ok(Json(ApiResponse::success(message, data)))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product", body = ApiResponse<ProductResponse>),
        (status = 404, description = "Product not found"),
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ProductResponse>>> {
    let resp = catalog_service::get_product(&state, id).await?;
    Ok(Json(ApiResponse::success(
        "Product retrieved successfully",
        resp,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/slug/{slug}",
    params(("slug" = String, Path, description = "Product slug")),
    responses(
        (status = 200, description = "Product", body = ApiResponse<ProductResponse>),
        (status = 404, description = "Product not found"),
    ),
    tag = "Products"
)]
pub async fn get_product_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<Json<ApiResponse<ProductResponse>>> {
    let resp = catalog_service::get_product_by_slug(&state, &slug).await?;
    Ok(Json(ApiResponse::success(
        "Product retrieved successfully",
        resp,
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/products",
    request_body = ProductRequest,
    responses(
        (status = 201, description = "Product created", body = ApiResponse<ProductResponse>),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Slug conflict"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ProductRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<ProductResponse>>)> {
    ensure_admin(&user)?;
    let resp = catalog_service::create_product(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Product created successfully", resp)),
    ))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = ProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<ProductResponse>),
        (status = 404, description = "Product not found"),
        (status = 409, description = "Slug conflict"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProductRequest>,
) -> AppResult<Json<ApiResponse<ProductResponse>>> {
    ensure_admin(&user)?;
    let resp = catalog_service::update_product(&state, id, payload).await?;
    Ok(Json(ApiResponse::success(
        "Product updated successfully",
        resp,
    )))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product deleted"),
        (status = 404, description = "Product not found"),
        (status = 422, description = "Product still has reviews"),
    ),
    security(("bearer_auth" = [])),
    tag = "Products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    ensure_admin(&user)?;
    catalog_service::delete_product(&state, id).await?;
    Ok(Json(ApiResponse::message("Product deleted successfully")))
}
