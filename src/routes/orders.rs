use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};

use crate::{
    dto::orders::{
        BankTransferInfo, CancelOrderRequest, CreateOrderRequest, CreatedOrderResponse,
        OrderResponse, OrderSummary, PaymentMethodInfo, PaymentWebhookRequest,
    },
    error::{AppError, AppResult},
    middleware::{auth::{AuthUser, ensure_admin}, session::CartIdentity},
    models::{PaymentMethod, PaymentStatus},
    response::ApiResponse,
    services::{cart_service, order_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/payment-methods", get(payment_methods))
        .route("/summary", post(order_summary))
        .route("/", post(create_order))
        .route("/webhook/payment", post(payment_webhook))
        .route("/{order_code}", get(get_order))
        .route("/{order_code}/bank-info", get(bank_transfer_info))
        .route("/{order_code}/cancel", post(cancel_order))
}

pub fn admin_router() -> Router<AppState> {
    Router::new().route("/{order_code}/confirm-cod", post(confirm_cod))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/payment-methods",
    responses(
        (status = 200, description = "Supported payment methods", body = ApiResponse<Vec<PaymentMethodInfo>>),
    ),
    tag = "Orders"
)]
pub async fn payment_methods() -> Json<ApiResponse<Vec<PaymentMethodInfo>>> {
    Json(ApiResponse::success(
        "Payment methods retrieved successfully",
        order_service::payment_methods(),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/summary",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Totals for the current cart", body = ApiResponse<OrderSummary>),
        (status = 422, description = "Cart empty"),
    ),
    tag = "Orders"
)]
pub async fn order_summary(
    State(state): State<AppState>,
    identity: CartIdentity,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<Json<ApiResponse<OrderSummary>>> {
    let cart = cart_service::get_or_create_cart(&state, &identity).await?;
    let rows = cart_service::load_cart_items(&state.orm, cart.id).await?;
    let summary = order_service::calculate_summary(&state, &rows, &payload.shipping_address)?;
    Ok(Json(ApiResponse::success(
        "Order summary calculated successfully",
        summary,
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<CreatedOrderResponse>),
        (status = 422, description = "Cart invalid or stock insufficient"),
    ),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    identity: CartIdentity,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<CreatedOrderResponse>>)> {
    let (order, items) = order_service::create_order(&state, &identity, &payload).await?;
    let payment_instructions = order_service::payment_instructions(&order);
    let data = CreatedOrderResponse {
        order: OrderResponse::from_entity(order, items),
        payment_instructions,
    };
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Order created successfully", data)),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{order_code}",
    params(("order_code" = String, Path, description = "5-digit order code")),
    responses(
        (status = 200, description = "Order", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found"),
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    identity: CartIdentity,
    Path(order_code): Path<String>,
) -> AppResult<Json<ApiResponse<OrderResponse>>> {
    let (order, items) = order_service::get_order(&state, &identity, &order_code).await?;
    Ok(Json(ApiResponse::success(
        "Order retrieved successfully",
        OrderResponse::from_entity(order, items),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{order_code}/bank-info",
    params(("order_code" = String, Path, description = "5-digit order code")),
    responses(
        (status = 200, description = "Transfer details", body = ApiResponse<BankTransferInfo>),
        (status = 404, description = "Order not found"),
        (status = 400, description = "Order does not use bank transfer or is already paid"),
    ),
    tag = "Orders"
)]
pub async fn bank_transfer_info(
    State(state): State<AppState>,
    identity: CartIdentity,
    Path(order_code): Path<String>,
) -> AppResult<Json<ApiResponse<BankTransferInfo>>> {
    let (order, _) = order_service::get_order(&state, &identity, &order_code).await?;

    if order.payment_method != PaymentMethod::BankTransfer {
        return Err(AppError::Validation(
            "This order does not use bank transfer payment method".into(),
        ));
    }
    if order.payment_status == PaymentStatus::Paid {
        return Err(AppError::Validation(
            "This order has already been paid".into(),
        ));
    }

    let info = order_service::bank_transfer_info(&order.order_code, order.final_amount);
    Ok(Json(ApiResponse::success(
        "Bank transfer info retrieved successfully",
        info,
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{order_code}/cancel",
    params(("order_code" = String, Path, description = "5-digit order code")),
    request_body = CancelOrderRequest,
    responses(
        (status = 200, description = "Order cancelled"),
        (status = 404, description = "Order not found"),
        (status = 422, description = "Order not cancellable"),
    ),
    tag = "Orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    identity: CartIdentity,
    Path(order_code): Path<String>,
    Json(payload): Json<CancelOrderRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let reason = payload.reason.trim();
    if reason.len() < 5 || reason.len() > 500 {
        return Err(AppError::Validation(
            "Cancellation reason must be between 5 and 500 characters".into(),
        ));
    }

    order_service::cancel_order(&state, &identity, &order_code, reason).await?;
    Ok(Json(ApiResponse::message("Order cancelled successfully")))
}

/// Gateway callback. Idempotent on already-paid orders.
#[utoipa::path(
    post,
    path = "/api/v1/orders/webhook/payment",
    request_body = PaymentWebhookRequest,
    responses(
        (status = 200, description = "Payment recorded"),
        (status = 404, description = "Order not found"),
    ),
    tag = "Orders"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    Json(payload): Json<PaymentWebhookRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    if payload.order_code.is_empty() || payload.transaction_id.is_empty() {
        return Err(AppError::Validation(
            "order_code and transaction_id are required".into(),
        ));
    }

    order_service::process_payment(
        &state,
        &payload.order_code,
        &payload.transaction_id,
        payload.response_data,
    )
    .await?;
    Ok(Json(ApiResponse::message("Payment processed successfully")))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/orders/{order_code}/confirm-cod",
    params(("order_code" = String, Path, description = "5-digit order code")),
    responses(
        (status = 200, description = "COD payment confirmed"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn confirm_cod(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_code): Path<String>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    ensure_admin(&user)?;
    order_service::confirm_cod(&state, &order_code).await?;
    Ok(Json(ApiResponse::message("COD payment confirmed successfully")))
}
