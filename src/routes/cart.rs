use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::cart::{
        AddToCartRequest, CartCountResponse, CartResponse, CartValidationResult,
        UpdateCartItemRequest,
    },
    error::{AppError, AppResult},
    middleware::{auth::AuthUser, session::CartIdentity},
    response::ApiResponse,
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart))
        .route("/add", post(add_to_cart))
        .route("/items/{item_id}", put(update_cart_item).delete(remove_from_cart))
        .route("/clear", delete(clear_cart))
        .route("/validate", get(validate_cart))
        .route("/count", get(cart_count))
        .route("/merge", post(merge_guest_cart))
}

#[utoipa::path(
    get,
    path = "/api/v1/cart",
    responses(
        (status = 200, description = "Current cart", body = ApiResponse<CartResponse>),
    ),
    tag = "Cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    identity: CartIdentity,
) -> AppResult<Json<ApiResponse<CartResponse>>> {
    let cart = cart_service::get_or_create_cart(&state, &identity).await?;
    let resp = cart_service::cart_response(&state, cart).await?;
    Ok(Json(ApiResponse::success(
        "Cart retrieved successfully",
        resp,
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/cart/add",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Item added", body = ApiResponse<CartResponse>),
        (status = 404, description = "Product or size not found"),
        (status = 422, description = "Inactive item, bound or stock exceeded"),
    ),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    identity: CartIdentity,
    Json(payload): Json<AddToCartRequest>,
) -> AppResult<Json<ApiResponse<CartResponse>>> {
    let cart = cart_service::get_or_create_cart(&state, &identity).await?;
    cart_service::add_to_cart(&state, &cart, payload).await?;

    let cart = cart_service::get_or_create_cart(&state, &identity).await?;
    let resp = cart_service::cart_response(&state, cart).await?;
    Ok(Json(ApiResponse::success(
        "Item added to cart successfully",
        resp,
    )))
}

#[utoipa::path(
    put,
    path = "/api/v1/cart/items/{item_id}",
    params(("item_id" = Uuid, Path, description = "Cart item ID")),
    request_body = UpdateCartItemRequest,
    responses(
        (status = 200, description = "Item updated", body = ApiResponse<CartResponse>),
        (status = 404, description = "Cart item not found"),
    ),
    tag = "Cart"
)]
pub async fn update_cart_item(
    State(state): State<AppState>,
    identity: CartIdentity,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<UpdateCartItemRequest>,
) -> AppResult<Json<ApiResponse<CartResponse>>> {
    let cart = cart_service::get_or_create_cart(&state, &identity).await?;
    cart_service::update_cart_item(&state, cart.id, item_id, payload.quantity).await?;

    let resp = cart_service::cart_response(&state, cart).await?;
    Ok(Json(ApiResponse::success(
        "Cart item updated successfully",
        resp,
    )))
}

#[utoipa::path(
    delete,
    path = "/api/v1/cart/items/{item_id}",
    params(("item_id" = Uuid, Path, description = "Cart item ID")),
    responses(
        (status = 200, description = "Item removed", body = ApiResponse<CartResponse>),
        (status = 404, description = "Cart item not found"),
    ),
    tag = "Cart"
)]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    identity: CartIdentity,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CartResponse>>> {
    let cart = cart_service::get_or_create_cart(&state, &identity).await?;
    cart_service::remove_from_cart(&state, cart.id, item_id).await?;

    let resp = cart_service::cart_response(&state, cart).await?;
    Ok(Json(ApiResponse::success(
        "Item removed from cart successfully",
        resp,
    )))
}

#[utoipa::path(
    delete,
    path = "/api/v1/cart/clear",
    responses(
        (status = 200, description = "Cart emptied", body = ApiResponse<CartResponse>),
    ),
    tag = "Cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    identity: CartIdentity,
) -> AppResult<Json<ApiResponse<CartResponse>>> {
    let cart = cart_service::get_or_create_cart(&state, &identity).await?;
    cart_service::clear_cart(&state.orm, cart.id).await?;

    let resp = cart_service::cart_response(&state, cart).await?;
    Ok(Json(ApiResponse::success("Cart cleared successfully", resp)))
}

#[utoipa::path(
    get,
    path = "/api/v1/cart/validate",
    responses(
        (status = 200, description = "Validation result", body = ApiResponse<CartValidationResult>),
    ),
    tag = "Cart"
)]
pub async fn validate_cart(
    State(state): State<AppState>,
    identity: CartIdentity,
) -> AppResult<Json<ApiResponse<CartValidationResult>>> {
    let cart = cart_service::get_or_create_cart(&state, &identity).await?;
    let resp = cart_service::validate_cart(&state, &cart).await?;
    let message = if resp.is_valid {
        "Cart is valid for checkout"
    } else {
        "Cart validation failed"
    };
    Ok(Json(ApiResponse::success(message, resp)))
}

#[utoipa::path(
    get,
    path = "/api/v1/cart/count",
    responses(
        (status = 200, description = "Cart totals", body = ApiResponse<CartCountResponse>),
    ),
    tag = "Cart"
)]
pub async fn cart_count(
    State(state): State<AppState>,
    identity: CartIdentity,
) -> AppResult<Json<ApiResponse<CartCountResponse>>> {
    let cart = cart_service::get_or_create_cart(&state, &identity).await?;
    let resp = cart_service::cart_response(&state, cart).await?;
    let data = CartCountResponse {
        item_count: resp.item_count,
        total_quantity: resp.total_quantity,
        total: resp.subtotal,
    };
    Ok(Json(ApiResponse::success(
        "Cart count retrieved successfully",
        data,
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/cart/merge",
    responses(
        (status = 200, description = "Guest cart folded into user cart", body = ApiResponse<CartResponse>),
        (status = 400, description = "Missing session id"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn merge_guest_cart(
    State(state): State<AppState>,
    user: AuthUser,
    identity: CartIdentity,
) -> AppResult<Json<ApiResponse<CartResponse>>> {
    if identity.session_id.is_empty() {
        return Err(AppError::Validation("Session ID required".into()));
    }

    let cart = cart_service::merge_guest_cart(&state, &identity.session_id, user.user_id).await?;
    let resp = cart_service::cart_response(&state, cart).await?;
    Ok(Json(ApiResponse::success(
        "Guest cart merged successfully",
        resp,
    )))
}
