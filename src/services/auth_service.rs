use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, NaiveDate, Utc};
use password_hash::rand_core::OsRng;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::{self, LoginAttempt},
    dto::auth::{
        LoginInfo, LoginRequest, LoginResponse, RecoveryRequest, RecoveryVerifyRequest,
        RecoveryVerifyResponse, RegisterRequest, UserResponse,
    },
    entity::{
        recovery_codes::{self, Column as CodeCol, Entity as RecoveryCodes},
        users::{self, Column as UserCol, Entity as Users},
    },
    error::{AppError, AppResult},
    models::{MAX_FAILED_LOGINS, RECOVERY_CODE_TTL_MINUTES, Role},
    notifier::Mail,
    state::AppState,
    token,
};

/// Client metadata recorded into the login audit trail.
pub struct ClientInfo {
    pub ip_address: String,
    pub user_agent: String,
}

fn validate_email(email: &str) -> AppResult<()> {
    let valid = email.contains('@')
        && email.rsplit('@').next().is_some_and(|d| d.contains('.'))
        && !email.starts_with('@')
        && !email.ends_with('@');
    if !valid {
        return Err(AppError::Validation("Email không đúng định dạng".into()));
    }
    Ok(())
}

async fn find_live_user_by_email(state: &AppState, email: &str) -> AppResult<Option<users::Model>> {
    Ok(Users::find()
        .filter(UserCol::DeletedAt.is_null())
        .filter(UserCol::Email.eq(email))
        .one(&state.orm)
        .await?)
}

fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    Ok(argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string())
}

fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub async fn register(state: &AppState, payload: RegisterRequest) -> AppResult<UserResponse> {
    let fullname = payload.fullname.trim();
    if fullname.len() < 2 || fullname.len() > 255 {
        return Err(AppError::Validation(
            "Fullname must be between 2 and 255 characters".into(),
        ));
    }
    validate_email(&payload.email)?;
    if payload.password.len() < 6 {
        return Err(AppError::Validation(
            "Password must be at least 6 characters".into(),
        ));
    }
    if payload.password != payload.confirm_password {
        return Err(AppError::Validation(
            "Password confirmation does not match".into(),
        ));
    }
    if let Some(phone) = payload.phone.as_ref().filter(|p| !p.is_empty()) {
        if phone.len() < 10 || phone.len() > 20 {
            return Err(AppError::Validation("Phone number is invalid".into()));
        }
    }

    let birthday = match payload.birthday.as_ref().filter(|b| !b.is_empty()) {
        Some(raw) => Some(NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
            AppError::Validation("Invalid birthday format. Use YYYY-MM-DD".into())
        })?),
        None => None,
    };

    if find_live_user_by_email(state, &payload.email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let password_hash = hash_password(&payload.password)?;
    let user = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        fullname: Set(fullname.to_string()),
        email: Set(payload.email),
        password_hash: Set(password_hash),
        address: Set(payload.address.unwrap_or_default()),
        phone: Set(payload.phone.unwrap_or_default()),
        birthday: Set(birthday),
        role: Set(Role::User),
        is_active: Set(true),
        failed_login_count: Set(0),
        last_login_at: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
        deleted_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(UserResponse::from(user))
}

fn locked_message() -> String {
    format!(
        "Tài khoản đã bị khóa do nhập sai mật khẩu quá {MAX_FAILED_LOGINS} lần. \
         Vui lòng kiểm tra email để nhận mã khôi phục."
    )
}

pub async fn login(
    state: &AppState,
    payload: LoginRequest,
    client: ClientInfo,
) -> AppResult<LoginResponse> {
    let Some(user) = find_live_user_by_email(state, &payload.email).await? else {
        audit::record_login_attempt(
            &state.pool,
            LoginAttempt {
                email: &payload.email,
                ip_address: &client.ip_address,
                user_agent: &client.user_agent,
                is_success: false,
                fail_reason: "Email not found",
            },
        )
        .await;
        return Err(AppError::Unauthorized("Invalid email or password".into()));
    };

    if !user.is_active {
        audit::record_login_attempt(
            &state.pool,
            LoginAttempt {
                email: &payload.email,
                ip_address: &client.ip_address,
                user_agent: &client.user_agent,
                is_success: false,
                fail_reason: "Account is locked",
            },
        )
        .await;
        return Err(AppError::Unauthorized(locked_message()));
    }

    if !verify_password(&payload.password, &user.password_hash)? {
        let failed_count = user.failed_login_count + 1;
        let now_locked = failed_count >= MAX_FAILED_LOGINS;

        if now_locked {
            state.notifier.enqueue(
                &user.email,
                Mail::AccountLocked {
                    fullname: user.fullname.clone(),
                },
            );
        }

        let email = user.email.clone();
        let mut active: users::ActiveModel = user.into();
        active.failed_login_count = Set(failed_count);
        if now_locked {
            active.is_active = Set(false);
        }
        active.updated_at = Set(Utc::now().into());
        active.update(&state.orm).await?;

        let fail_reason = format!("Invalid password (attempt {failed_count}/{MAX_FAILED_LOGINS})");
        audit::record_login_attempt(
            &state.pool,
            LoginAttempt {
                email: &email,
                ip_address: &client.ip_address,
                user_agent: &client.user_agent,
                is_success: false,
                fail_reason: &fail_reason,
            },
        )
        .await;

        let message = if now_locked {
            format!(
                "Tài khoản đã bị khóa do nhập sai mật khẩu quá {MAX_FAILED_LOGINS} lần. \
                 Mã khôi phục đã được gửi đến email của bạn."
            )
        } else {
            format!(
                "Mật khẩu không đúng. Còn {} lần thử.",
                MAX_FAILED_LOGINS - failed_count
            )
        };
        return Err(AppError::Unauthorized(message));
    }

    let previous_login_at = user.last_login_at.map(|dt| dt.with_timezone(&Utc));
    let login_time = Utc::now();

    let mut active: users::ActiveModel = user.clone().into();
    active.failed_login_count = Set(0);
    active.last_login_at = Set(Some(login_time.into()));
    active.updated_at = Set(login_time.into());
    let user = active.update(&state.orm).await?;

    let issued = token::issue(
        &state.config.jwt_secret,
        state.config.jwt_expiry_hours,
        user.id,
        &user.email,
        user.role,
    )?;

    audit::record_login_attempt(
        &state.pool,
        LoginAttempt {
            email: &user.email,
            ip_address: &client.ip_address,
            user_agent: &client.user_agent,
            is_success: true,
            fail_reason: "Login successful",
        },
    )
    .await;

    let login_count = audit::count_successful_logins(&state.pool, &user.email).await + 1;

    Ok(LoginResponse {
        user: UserResponse::from(user),
        token: issued.token,
        token_type: "Bearer",
        expires_at: issued.expires_at,
        expires_in: issued.expires_in,
        csrf_token: issued.csrf_token,
        login_info: LoginInfo {
            login_time,
            last_login_at: previous_login_at,
            login_count,
        },
    })
}

/// The response never reveals whether the email exists.
pub const RECOVERY_REQUESTED_MESSAGE: &str =
    "Nếu email tồn tại, mã khôi phục đã được gửi đến email của bạn.";

pub async fn request_recovery(state: &AppState, payload: RecoveryRequest) -> AppResult<()> {
    validate_email(&payload.email)?;

    let Some(user) = find_live_user_by_email(state, &payload.email).await? else {
        return Ok(());
    };

    let code = token::generate_recovery_code();
    recovery_codes::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.id),
        code: Set(code.clone()),
        is_used: Set(false),
        expires_at: Set((Utc::now() + Duration::minutes(RECOVERY_CODE_TTL_MINUTES)).into()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    state.notifier.enqueue(
        &user.email,
        Mail::RecoveryCode {
            fullname: user.fullname,
            code,
        },
    );
    Ok(())
}

/// Consumes a recovery code: marks it used and reactivates the account with a
/// reset failure counter, atomically.
pub async fn verify_recovery(
    state: &AppState,
    payload: RecoveryVerifyRequest,
) -> AppResult<RecoveryVerifyResponse> {
    let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();
    let code = RecoveryCodes::find()
        .filter(CodeCol::Code.eq(payload.code.as_str()))
        .filter(CodeCol::IsUsed.eq(false))
        .filter(CodeCol::ExpiresAt.gt(now))
        .one(&state.orm)
        .await?
        .ok_or_else(|| {
            AppError::Validation("Mã khôi phục không hợp lệ hoặc đã hết hạn.".into())
        })?;

    let user = Users::find_by_id(code.user_id)
        .filter(UserCol::DeletedAt.is_null())
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("User"))?;

    let txn = state.orm.begin().await?;

    let mut code_active: recovery_codes::ActiveModel = code.into();
    code_active.is_used = Set(true);
    code_active.updated_at = Set(Utc::now().into());
    code_active.update(&txn).await?;

    let email = user.email.clone();
    let mut user_active: users::ActiveModel = user.into();
    user_active.is_active = Set(true);
    user_active.failed_login_count = Set(0);
    user_active.updated_at = Set(Utc::now().into());
    user_active.update(&txn).await?;

    txn.commit().await?;

    Ok(RecoveryVerifyResponse {
        user_email: email,
        is_active: true,
    })
}

pub async fn get_user(state: &AppState, id: Uuid) -> AppResult<UserResponse> {
    let user = Users::find_by_id(id)
        .filter(UserCol::DeletedAt.is_null())
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("User"))?;
    Ok(UserResponse::from(user))
}

pub async fn list_users(state: &AppState) -> AppResult<Vec<UserResponse>> {
    let users = Users::find()
        .filter(UserCol::DeletedAt.is_null())
        .order_by_asc(UserCol::CreatedAt)
        .all(&state.orm)
        .await?;
    Ok(users.into_iter().map(UserResponse::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trips() {
        let hash = hash_password("Passw0rd!").unwrap();
        assert!(verify_password("Passw0rd!", &hash).unwrap());
        assert!(!verify_password("passw0rd!", &hash).unwrap());
    }

    #[test]
    fn email_validation() {
        assert!(validate_email("alice@example.com").is_ok());
        assert!(validate_email("a@b.co").is_ok());
        assert!(validate_email("nope").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("alice@localhost").is_err());
    }
}
