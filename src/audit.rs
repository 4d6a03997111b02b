//! Append-only login audit. Writes go through the raw sqlx pool so a failed
//! audit insert can be logged and dropped without touching the caller's
//! transaction.

use uuid::Uuid;

use crate::db::DbPool;

pub struct LoginAttempt<'a> {
    pub email: &'a str,
    pub ip_address: &'a str,
    pub user_agent: &'a str,
    pub is_success: bool,
    pub fail_reason: &'a str,
}

pub async fn record_login_attempt(pool: &DbPool, attempt: LoginAttempt<'_>) {
    let result = sqlx::query(
        r#"
        INSERT INTO login_attempts (id, email, ip_address, user_agent, is_success, fail_reason, attempted_at)
        VALUES ($1, $2, $3, $4, $5, $6, now())
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(attempt.email)
    .bind(attempt.ip_address)
    .bind(attempt.user_agent)
    .bind(attempt.is_success)
    .bind(attempt.fail_reason)
    .execute(pool)
    .await;

    if let Err(err) = result {
        tracing::warn!(error = %err, "login attempt audit failed");
    }
}

/// Historical successful logins for an email, used for the login_count field
/// returned at login time.
pub async fn count_successful_logins(pool: &DbPool, email: &str) -> i64 {
    let count: Result<(i64,), _> =
        sqlx::query_as("SELECT COUNT(*) FROM login_attempts WHERE email = $1 AND is_success")
            .bind(email)
            .fetch_one(pool)
            .await;

    match count {
        Ok((n,)) => n,
        Err(err) => {
            tracing::warn!(error = %err, "login attempt count failed");
            0
        }
    }
}
