mod common;

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use storefront_api::{
    dto::auth::{LoginRequest, RecoveryRequest, RecoveryVerifyRequest, RegisterRequest},
    entity::{recovery_codes, users},
    error::AppError,
    models::{MAX_FAILED_LOGINS, Role},
    notifier::Mail,
    services::auth_service::{self, ClientInfo},
};

fn client() -> ClientInfo {
    ClientInfo {
        ip_address: "127.0.0.1".into(),
        user_agent: "integration-test".into(),
    }
}

fn register_request(email: &str) -> RegisterRequest {
    RegisterRequest {
        fullname: "Bob Tester".into(),
        email: email.into(),
        password: "Passw0rd!".into(),
        confirm_password: "Passw0rd!".into(),
        address: None,
        phone: None,
        birthday: Some("1990-04-01".into()),
    }
}

// Lockout and recovery: five bad passwords lock the account, a mailed code
// reactivates it exactly once, and the next login succeeds.
#[tokio::test]
async fn lockout_and_recovery_flow() -> anyhow::Result<()> {
    let Some((state, notifier)) = common::setup_state().await? else {
        eprintln!("Skipping: set TEST_DATABASE_URL or DATABASE_URL to run integration flows.");
        return Ok(());
    };

    let bob = auth_service::register(&state, register_request("bob@example.com")).await?;
    assert_eq!(bob.role, Role::User);
    assert!(bob.is_active);
    assert_eq!(bob.birthday.map(|b| b.to_string()), Some("1990-04-01".into()));

    // Registering the same email again conflicts.
    let dup = auth_service::register(&state, register_request("bob@example.com")).await;
    assert!(matches!(dup, Err(AppError::Conflict(_))));

    // Four bad passwords burn through the allowance.
    for attempt in 1..MAX_FAILED_LOGINS {
        let err = auth_service::login(
            &state,
            LoginRequest {
                email: "bob@example.com".into(),
                password: "wrong".into(),
            },
            client(),
        )
        .await;
        let Err(AppError::Unauthorized(message)) = err else {
            panic!("attempt {attempt} should be rejected");
        };
        let remaining = MAX_FAILED_LOGINS - attempt;
        assert!(
            message.contains(&remaining.to_string()),
            "attempt {attempt} should report {remaining} remaining, got: {message}"
        );
    }

    // The fifth failure locks the account and queues the locked mail.
    let err = auth_service::login(
        &state,
        LoginRequest {
            email: "bob@example.com".into(),
            password: "wrong".into(),
        },
        client(),
    )
    .await;
    let Err(AppError::Unauthorized(message)) = err else {
        panic!("fifth failure should lock");
    };
    assert!(message.contains("khóa"), "locked message expected: {message}");

    let locked = users::Entity::find()
        .filter(users::Column::Email.eq("bob@example.com"))
        .one(&state.orm)
        .await?
        .unwrap();
    assert!(!locked.is_active);
    assert_eq!(locked.failed_login_count, MAX_FAILED_LOGINS);
    assert_eq!(
        notifier.count_matching(|m| matches!(m, Mail::AccountLocked { .. })),
        1
    );

    // Even the correct password is refused while locked.
    let err = auth_service::login(
        &state,
        LoginRequest {
            email: "bob@example.com".into(),
            password: "Passw0rd!".into(),
        },
        client(),
    )
    .await;
    assert!(matches!(err, Err(AppError::Unauthorized(_))));

    // Recovery request mints a code and mails it. Unknown emails get the same
    // silence on the wire: no error, no mail.
    auth_service::request_recovery(
        &state,
        RecoveryRequest {
            email: "bob@example.com".into(),
        },
    )
    .await?;
    auth_service::request_recovery(
        &state,
        RecoveryRequest {
            email: "nobody@example.com".into(),
        },
    )
    .await?;
    assert_eq!(
        notifier.count_matching(|m| matches!(m, Mail::RecoveryCode { .. })),
        1
    );

    let code_row = recovery_codes::Entity::find()
        .filter(recovery_codes::Column::UserId.eq(locked.id))
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(code_row.code.len(), 32);
    assert!(!code_row.is_used);

    // Verification reactivates the account and resets the counter.
    let verified = auth_service::verify_recovery(
        &state,
        RecoveryVerifyRequest {
            code: code_row.code.clone(),
        },
    )
    .await?;
    assert!(verified.is_active);

    let reactivated = users::Entity::find_by_id(locked.id)
        .one(&state.orm)
        .await?
        .unwrap();
    assert!(reactivated.is_active);
    assert_eq!(reactivated.failed_login_count, 0);

    // A code is consumable exactly once.
    let reuse = auth_service::verify_recovery(
        &state,
        RecoveryVerifyRequest {
            code: code_row.code.clone(),
        },
    )
    .await;
    assert!(matches!(reuse, Err(AppError::Validation(_))));

    // An expired code never verifies.
    let stale = recovery_codes::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(locked.id),
        code: Set("00000000000000000000000000000000".into()),
        is_used: Set(false),
        expires_at: Set((Utc::now() - chrono::Duration::minutes(1)).into()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    let expired = auth_service::verify_recovery(
        &state,
        RecoveryVerifyRequest { code: stale.code },
    )
    .await;
    assert!(matches!(expired, Err(AppError::Validation(_))));

    // With the account restored, the correct password logs in and the
    // response carries the token/CSRF pair.
    let login = auth_service::login(
        &state,
        LoginRequest {
            email: "bob@example.com".into(),
            password: "Passw0rd!".into(),
        },
        client(),
    )
    .await?;
    assert_eq!(login.token_type, "Bearer");
    assert!(!login.token.is_empty());
    assert_eq!(login.csrf_token.len(), 64);
    assert!(login.expires_in > 0);
    assert_eq!(login.login_info.login_count, 2);
    assert!(login.login_info.last_login_at.is_none());

    // A second login reports the previous one.
    let second = auth_service::login(
        &state,
        LoginRequest {
            email: "bob@example.com".into(),
            password: "Passw0rd!".into(),
        },
        client(),
    )
    .await?;
    assert!(second.login_info.last_login_at.is_some());

    Ok(())
}
