mod common;

use sea_orm::EntityTrait;
use storefront_api::{
    dto::cart::AddToCartRequest,
    entity::{order_items, orders, payments, product_sizes, products},
    error::AppError,
    models::{
        OrderStatus, PaymentGateway, PaymentMethod, PaymentRecordStatus, PaymentStatus, Role,
    },
    notifier::Mail,
    services::{cart_service, order_service},
    sweep,
};

// Checkout pipeline end to end: purchase, concurrent stock race, cancel with
// stock restoration, idempotent webhook settle, and the expiry sweep.
#[tokio::test]
async fn order_lifecycle_flow() -> anyhow::Result<()> {
    let Some((state, notifier)) = common::setup_state().await? else {
        eprintln!("Skipping: set TEST_DATABASE_URL or DATABASE_URL to run integration flows.");
        return Ok(());
    };

    let category = common::create_category(&state, "Shoes").await?;
    let alice = common::create_user(&state, "alice@example.com", Role::User).await?;
    let identity = common::user_identity(alice.id);

    // Happy-path purchase: two units empty the shelf.
    let (product, size) =
        common::create_product_with_size(&state, category.id, "Runner", "M", 2, 100_000).await?;

    let cart = cart_service::get_or_create_cart(&state, &identity).await?;
    cart_service::add_to_cart(
        &state,
        &cart,
        AddToCartRequest {
            product_id: product.id,
            product_size_id: size.id,
            quantity: 2,
        },
    )
    .await?;

    let (order, items) =
        order_service::create_order(&state, &identity, &common::order_request(PaymentMethod::Cod))
            .await?;

    assert_eq!(order.order_code.len(), 5);
    assert!(order.order_code.chars().all(|c| c.is_ascii_digit()));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Unpaid);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 2);
    assert_eq!(items[0].product_name, "Runner");
    assert_eq!(items[0].product_size, "M");

    let size_after = product_sizes::Entity::find_by_id(size.id)
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(size_after.stock, 0);
    let product_after = products::Entity::find_by_id(product.id)
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(product_after.total_stock, 0);

    let payment_rows = payments::Entity::find().all(&state.orm).await?;
    assert_eq!(payment_rows.len(), 1);
    assert_eq!(payment_rows[0].status, PaymentRecordStatus::Pending);
    assert_eq!(payment_rows[0].payment_gateway, PaymentGateway::Internal);
    assert_eq!(payment_rows[0].amount, order.final_amount);

    // The cart was consumed by checkout.
    let cart = cart_service::get_or_create_cart(&state, &identity).await?;
    assert!(cart_service::load_cart_items(&state.orm, cart.id).await?.is_empty());

    // Concurrent buyers of the last unit: exactly one order goes through.
    let (race_product, race_size) =
        common::create_product_with_size(&state, category.id, "Sprint", "L", 1, 50_000).await?;

    let bob = common::create_user(&state, "bob@example.com", Role::User).await?;
    let carol = common::create_user(&state, "carol@example.com", Role::User).await?;
    for buyer in [bob.id, carol.id] {
        let identity = common::user_identity(buyer);
        let cart = cart_service::get_or_create_cart(&state, &identity).await?;
        cart_service::add_to_cart(
            &state,
            &cart,
            AddToCartRequest {
                product_id: race_product.id,
                product_size_id: race_size.id,
                quantity: 1,
            },
        )
        .await?;
    }

    let bob_identity = common::user_identity(bob.id);
    let carol_identity = common::user_identity(carol.id);
    let bob_request = common::order_request(PaymentMethod::Cod);
    let carol_request = common::order_request(PaymentMethod::Cod);
    let (left, right) = tokio::join!(
        order_service::create_order(&state, &bob_identity, &bob_request),
        order_service::create_order(&state, &carol_identity, &carol_request),
    );

    let succeeded = [left.is_ok(), right.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(succeeded, 1, "exactly one concurrent order must win");
    for result in [&left, &right] {
        if let Err(err) = result {
            assert!(
                matches!(err, AppError::FailedPrecondition(msg) if msg.contains("Insufficient stock")),
                "loser must fail with insufficient stock, got: {err}"
            );
        }
    }

    let race_size_after = product_sizes::Entity::find_by_id(race_size.id)
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(race_size_after.stock, 0);

    // No orphan order items: every item belongs to a persisted order.
    let order_count = orders::Entity::find().all(&state.orm).await?.len();
    let item_orders: Vec<_> = order_items::Entity::find()
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|i| i.order_id)
        .collect();
    assert_eq!(order_count, 2);
    assert!(item_orders.iter().all(|id| *id == order.id
        || Some(*id) == left.as_ref().ok().map(|(o, _)| o.id)
        || Some(*id) == right.as_ref().ok().map(|(o, _)| o.id)));

    // Webhook settle is idempotent: second call leaves a single completed row.
    order_service::process_payment(&state, &order.order_code, "TXN-1", None).await?;
    order_service::process_payment(&state, &order.order_code, "TXN-2", None).await?;

    let settled = orders::Entity::find_by_id(order.id)
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(settled.status, OrderStatus::Paid);
    assert_eq!(settled.payment_status, PaymentStatus::Paid);

    let settled_payments = payments::Entity::find().all(&state.orm).await?;
    let completed: Vec<_> = settled_payments
        .iter()
        .filter(|p| p.order_id == order.id)
        .collect();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].status, PaymentRecordStatus::Completed);
    assert_eq!(completed[0].transaction_id, "TXN-1");
    assert!(completed[0].payment_date.is_some());

    // Cancelling a paid order restores exactly what checkout consumed.
    order_service::cancel_order(&state, &identity, &order.order_code, "changed my mind").await?;

    let size_restored = product_sizes::Entity::find_by_id(size.id)
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(size_restored.stock, 2);
    let product_restored = products::Entity::find_by_id(product.id)
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(product_restored.total_stock, 2);

    let cancelled = orders::Entity::find_by_id(order.id)
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert!(cancelled.notes.contains("changed my mind"));

    // A cancelled order cannot be cancelled twice.
    let again =
        order_service::cancel_order(&state, &identity, &order.order_code, "double cancel").await;
    assert!(matches!(again, Err(AppError::FailedPrecondition(_))));

    // Expiry sweep: a pending unpaid order past its window is cancelled and
    // its stock comes back.
    let (late_product, late_size) =
        common::create_product_with_size(&state, category.id, "Marathon", "S", 3, 80_000).await?;
    let dave = common::create_user(&state, "dave@example.com", Role::User).await?;
    let dave_identity = common::user_identity(dave.id);
    let cart = cart_service::get_or_create_cart(&state, &dave_identity).await?;
    cart_service::add_to_cart(
        &state,
        &cart,
        AddToCartRequest {
            product_id: late_product.id,
            product_size_id: late_size.id,
            quantity: 3,
        },
    )
    .await?;
    let (late_order, _) = order_service::create_order(
        &state,
        &dave_identity,
        &common::order_request(PaymentMethod::BankTransfer),
    )
    .await?;

    sqlx::query("UPDATE orders SET expires_at = now() - interval '1 second' WHERE id = $1")
        .bind(late_order.id)
        .execute(&state.pool)
        .await?;

    let swept = sweep::run_order_sweep(&state).await?;
    assert_eq!(swept, 1);

    let swept_order = orders::Entity::find_by_id(late_order.id)
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(swept_order.status, OrderStatus::Cancelled);
    let late_size_after = product_sizes::Entity::find_by_id(late_size.id)
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(late_size_after.stock, 3);
    let late_payments: Vec<_> = payments::Entity::find()
        .all(&state.orm)
        .await?
        .into_iter()
        .filter(|p| p.order_id == late_order.id)
        .collect();
    assert!(late_payments
        .iter()
        .all(|p| p.status == PaymentRecordStatus::Cancelled));

    // The sweep is idempotent.
    assert_eq!(sweep::run_order_sweep(&state).await?, 0);

    // Confirmation and cancellation mail went out for the first order.
    assert!(notifier.count_matching(|m| matches!(m, Mail::OrderConfirmation { .. })) >= 1);
    assert!(notifier.count_matching(|m| matches!(m, Mail::OrderCancelled { .. })) >= 2);

    Ok(())
}
