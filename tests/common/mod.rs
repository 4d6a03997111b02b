//! Shared setup for the DB-backed integration flows. Tests are skipped when
//! no database is configured in the environment.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;

use storefront_api::{
    config::{AppConfig, SmtpConfig},
    db::{create_orm_conn, create_pool},
    dto::orders::{CreateOrderRequest, ShippingAddress},
    entity::{categories, product_sizes, products, users},
    middleware::session::CartIdentity,
    models::{PaymentMethod, Role},
    notifier::{Mail, Notifier},
    policy::{TieredShipping, VolumeDiscount},
    state::AppState,
};

/// Collects enqueued mail so flows can assert on notifications.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, Mail)>>,
}

impl Notifier for RecordingNotifier {
    fn enqueue(&self, recipient: &str, mail: Mail) {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), mail));
    }
}

impl RecordingNotifier {
    pub fn count_matching(&self, predicate: impl Fn(&Mail) -> bool) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, mail)| predicate(mail))
            .count()
    }
}

pub async fn setup_state() -> anyhow::Result<Option<(AppState, Arc<RecordingNotifier>)>> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => return Ok(None),
    };

    let pool = create_pool(&database_url).await?;
    let orm = create_orm_conn(&database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    sqlx::query(
        "TRUNCATE TABLE payments, order_items, orders, cart_items, carts, reviews, \
         product_sizes, products, categories, recovery_codes, login_attempts, users CASCADE",
    )
    .execute(&pool)
    .await?;

    let notifier = Arc::new(RecordingNotifier::default());
    let config = AppConfig {
        database_url,
        port: 0,
        jwt_secret: "integration-test-secret".into(),
        jwt_expiry_hours: 24,
        smtp: SmtpConfig {
            host: "localhost".into(),
            port: 25,
            username: String::new(),
            password: String::new(),
            from: "test@example.com".into(),
        },
    };

    let state = AppState {
        pool,
        orm,
        config: Arc::new(config),
        notifier: notifier.clone(),
        shipping: Arc::new(TieredShipping),
        discount: Arc::new(VolumeDiscount),
        order_code_lock: Arc::new(tokio::sync::Mutex::new(())),
    };

    Ok(Some((state, notifier)))
}

pub async fn create_user(state: &AppState, email: &str, role: Role) -> anyhow::Result<users::Model> {
    let user = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        fullname: Set("Test User".into()),
        email: Set(email.into()),
        // rows seeded here never log in through the password path
        password_hash: Set("seeded".into()),
        address: Set(String::new()),
        phone: Set(String::new()),
        birthday: Set(None),
        role: Set(role),
        is_active: Set(true),
        failed_login_count: Set(0),
        last_login_at: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
        deleted_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(user)
}

pub async fn create_category(state: &AppState, name: &str) -> anyhow::Result<categories::Model> {
    let category = categories::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.into()),
        slug: Set(storefront_api::slug::slugify(name)),
        description: Set(String::new()),
        thumbnail: Set(String::new()),
        is_active: Set(true),
        created_at: NotSet,
        updated_at: NotSet,
        deleted_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(category)
}

pub async fn create_product_with_size(
    state: &AppState,
    category_id: Uuid,
    name: &str,
    size: &str,
    stock: i32,
    price: i64,
) -> anyhow::Result<(products::Model, product_sizes::Model)> {
    let product = products::ActiveModel {
        id: Set(Uuid::new_v4()),
        category_id: Set(category_id),
        name: Set(name.into()),
        slug: Set(storefront_api::slug::slugify(name)),
        price: Set(Decimal::from(price)),
        discount_price: Set(None),
        description: Set(String::new()),
        total_stock: Set(stock),
        thumbnail: Set(String::new()),
        images: Set(serde_json::json!([])),
        is_featured: Set(false),
        is_active: Set(true),
        view_count: Set(0),
        average_rating: Set(Decimal::ZERO),
        review_count: Set(0),
        created_at: NotSet,
        updated_at: NotSet,
        deleted_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let product_size = product_sizes::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product.id),
        size: Set(size.into()),
        stock: Set(stock),
        price: Set(None),
        is_active: Set(true),
        created_at: NotSet,
        updated_at: NotSet,
        deleted_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok((product, product_size))
}

pub fn user_identity(user_id: Uuid) -> CartIdentity {
    CartIdentity {
        user_id: Some(user_id),
        session_id: String::new(),
    }
}

pub fn guest_identity(session_id: &str) -> CartIdentity {
    CartIdentity {
        user_id: None,
        session_id: session_id.into(),
    }
}

pub fn order_request(method: PaymentMethod) -> CreateOrderRequest {
    CreateOrderRequest {
        customer_name: "Nguyễn Văn A".into(),
        customer_email: "customer@example.com".into(),
        customer_phone: "0900000001".into(),
        shipping_address: ShippingAddress {
            full_name: "Nguyễn Văn A".into(),
            phone: "0900000001".into(),
            address_line: "1 Đường Lê Lợi, Phường Bến Nghé".into(),
            city: "Hồ Chí Minh".into(),
            district: "Quận 1".into(),
            ward: "Bến Nghé".into(),
            postal_code: String::new(),
        },
        payment_method: method,
        notes: String::new(),
    }
}
