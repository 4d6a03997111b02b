use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{entity::users, models::Role};

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub fullname: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Format: YYYY-MM-DD
    #[serde(default)]
    pub birthday: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RecoveryRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RecoveryVerifyRequest {
    pub code: String,
}

/// User with the credential material stripped.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub fullname: String,
    pub email: String,
    pub address: String,
    pub phone: String,
    pub birthday: Option<NaiveDate>,
    pub role: Role,
    pub role_name: &'static str,
    pub is_active: bool,
}

impl From<users::Model> for UserResponse {
    fn from(user: users::Model) -> Self {
        Self {
            id: user.id,
            fullname: user.fullname,
            email: user.email,
            address: user.address,
            phone: user.phone,
            birthday: user.birthday,
            role: user.role,
            role_name: user.role.name(),
            is_active: user.is_active,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub user: UserResponse,
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    /// Seconds until the token expires.
    pub expires_in: i64,
    pub csrf_token: String,
    pub login_info: LoginInfo,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginInfo {
    pub login_time: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub login_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RecoveryVerifyResponse {
    pub user_email: String,
    pub is_active: bool,
}
