use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware as axum_middleware,
    routing::{get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::reviews::{
        CreateReviewRequest, ProductReviewsResponse, ReviewResponse, UpdateReviewRequest,
        UserReviewsResponse,
    },
    error::AppResult,
    middleware::auth::{self, AuthUser},
    response::ApiResponse,
    routes::params::ReviewListParams,
    services::review_service,
    state::AppState,
};

pub fn router(state: &AppState) -> Router<AppState> {
    let csrf = axum_middleware::from_fn_with_state(state.clone(), auth::csrf_guard);
    let protected = Router::new()
        .route("/", post(create_review))
        .route("/my-reviews", get(my_reviews))
        .route("/{id}", put(update_review).delete(delete_review))
        .layer(csrf);

    Router::new()
        .route("/product/{product_id}", get(product_reviews))
        .merge(protected)
}

#[utoipa::path(
    get,
    path = "/api/v1/reviews/product/{product_id}",
    params(
        ("product_id" = Uuid, Path, description = "Product ID"),
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("limit" = Option<i64>, Query, description = "Items per page, default 10"),
        ("sort" = Option<String>, Query, description = "newest, oldest, rating_high, rating_low"),
        ("rating" = Option<i32>, Query, description = "Filter by star value"),
    ),
    responses(
        (status = 200, description = "Reviews with statistics", body = ApiResponse<ProductReviewsResponse>),
    ),
    tag = "Reviews"
)]
pub async fn product_reviews(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Query(params): Query<ReviewListParams>,
) -> AppResult<Json<ApiResponse<ProductReviewsResponse>>> {
    let resp = review_service::list_product_reviews(&state, product_id, &params, false).await?;
    Ok(Json(ApiResponse::success(
        "Reviews retrieved successfully",
        resp,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/reviews/my-reviews",
    responses(
        (status = 200, description = "Current user's reviews", body = ApiResponse<UserReviewsResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn my_reviews(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<ReviewListParams>,
) -> AppResult<Json<ApiResponse<UserReviewsResponse>>> {
    let resp = review_service::list_user_reviews(&state, user.user_id, &params).await?;
    Ok(Json(ApiResponse::success(
        "User reviews retrieved successfully",
        resp,
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/reviews",
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review created", body = ApiResponse<ReviewResponse>),
        (status = 404, description = "Product not found"),
        (status = 409, description = "Already reviewed"),
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn create_review(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateReviewRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<ReviewResponse>>)> {
    let resp = review_service::create_review(&state, &user, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Review created successfully", resp)),
    ))
}

#[utoipa::path(
    put,
    path = "/api/v1/reviews/{id}",
    params(("id" = Uuid, Path, description = "Review ID")),
    request_body = UpdateReviewRequest,
    responses(
        (status = 200, description = "Review updated", body = ApiResponse<ReviewResponse>),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Review not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn update_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateReviewRequest>,
) -> AppResult<Json<ApiResponse<ReviewResponse>>> {
    let resp = review_service::update_review(&state, &user, id, payload).await?;
    Ok(Json(ApiResponse::success(
        "Review updated successfully",
        resp,
    )))
}

#[utoipa::path(
    delete,
    path = "/api/v1/reviews/{id}",
    params(("id" = Uuid, Path, description = "Review ID")),
    responses(
        (status = 200, description = "Review deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Review not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Reviews"
)]
pub async fn delete_review(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    review_service::delete_review(&state, &user, id).await?;
    Ok(Json(ApiResponse::message("Review deleted successfully")))
}
