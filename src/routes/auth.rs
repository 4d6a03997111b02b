use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    routing::post,
};

use crate::{
    dto::auth::{
        LoginRequest, LoginResponse, RecoveryRequest, RecoveryVerifyRequest,
        RecoveryVerifyResponse, RegisterRequest, UserResponse,
    },
    error::AppResult,
    response::ApiResponse,
    services::auth_service::{self, ClientInfo, RECOVERY_REQUESTED_MESSAGE},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/recovery", post(request_recovery))
        .route("/recovery/verify", post(verify_recovery))
}

fn client_info(headers: &HeaderMap) -> ClientInfo {
    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .unwrap_or_default()
        .trim()
        .to_string();
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    ClientInfo {
        ip_address,
        user_agent,
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = ApiResponse<UserResponse>),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Email already registered"),
    ),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<UserResponse>>)> {
    let user = auth_service::register(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("User registered successfully", user)),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Invalid credentials or locked account"),
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<LoginResponse>>> {
    let client = client_info(&headers);
    let resp = auth_service::login(&state, payload, client).await?;
    Ok(Json(ApiResponse::success("Login successful", resp)))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/recovery",
    request_body = RecoveryRequest,
    responses(
        (status = 200, description = "Recovery requested", body = ApiResponse<serde_json::Value>),
    ),
    tag = "Auth"
)]
pub async fn request_recovery(
    State(state): State<AppState>,
    Json(payload): Json<RecoveryRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    auth_service::request_recovery(&state, payload).await?;
    Ok(Json(ApiResponse::message(RECOVERY_REQUESTED_MESSAGE)))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/recovery/verify",
    request_body = RecoveryVerifyRequest,
    responses(
        (status = 200, description = "Account reactivated", body = ApiResponse<RecoveryVerifyResponse>),
        (status = 400, description = "Invalid or expired code"),
    ),
    tag = "Auth"
)]
pub async fn verify_recovery(
    State(state): State<AppState>,
    Json(payload): Json<RecoveryVerifyRequest>,
) -> AppResult<Json<ApiResponse<RecoveryVerifyResponse>>> {
    let resp = auth_service::verify_recovery(&state, payload).await?;
    Ok(Json(ApiResponse::success(
        "Tài khoản đã được kích hoạt lại thành công. Bạn có thể đăng nhập ngay bây giờ.",
        resp,
    )))
}
