mod common;

use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use storefront_api::{
    dto::cart::AddToCartRequest,
    entity::{cart_items, carts, product_sizes, products},
    error::AppError,
    models::{MAX_ITEM_QUANTITY, Role},
    services::cart_service,
    sweep,
};

// Cart lifecycle: dual identity, dedup on re-add, bounds, validation issues,
// guest-to-user merge and the expiry sweep.
#[tokio::test]
async fn cart_lifecycle_flow() -> anyhow::Result<()> {
    let Some((state, _notifier)) = common::setup_state().await? else {
        eprintln!("Skipping: set TEST_DATABASE_URL or DATABASE_URL to run integration flows.");
        return Ok(());
    };

    let category = common::create_category(&state, "Apparel").await?;
    let (product, size) =
        common::create_product_with_size(&state, category.id, "Tee", "M", 10, 120_000).await?;

    // Guest identity keys on the session; the same session gets the same cart.
    let guest = common::guest_identity("session-1");
    let cart = cart_service::get_or_create_cart(&state, &guest).await?;
    let again = cart_service::get_or_create_cart(&state, &guest).await?;
    assert_eq!(cart.id, again.id);
    assert!(cart.user_id.is_none());

    // Re-adding the same (product, size) merges quantities on one line.
    let add = AddToCartRequest {
        product_id: product.id,
        product_size_id: size.id,
        quantity: 3,
    };
    cart_service::add_to_cart(&state, &cart, add.clone()).await?;
    cart_service::add_to_cart(&state, &cart, add.clone()).await?;

    let items = cart_service::load_cart_items(&state.orm, cart.id).await?;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].0.quantity, 6);

    // Requests beyond the shelf are refused.
    let too_many = AddToCartRequest {
        product_id: product.id,
        product_size_id: size.id,
        quantity: 5,
    };
    let err = cart_service::add_to_cart(&state, &cart, too_many).await;
    assert!(matches!(err, Err(AppError::FailedPrecondition(_))));

    // The per-line cap binds even when stock would allow more.
    let over_cap = AddToCartRequest {
        product_id: product.id,
        product_size_id: size.id,
        quantity: MAX_ITEM_QUANTITY + 1,
    };
    let err = cart_service::add_to_cart(&state, &cart, over_cap).await;
    assert!(matches!(err, Err(AppError::FailedPrecondition(_))));

    // Quantity zero removes the line.
    let item_id = items[0].0.id;
    cart_service::update_cart_item(&state, cart.id, item_id, 0).await?;
    assert!(cart_service::load_cart_items(&state.orm, cart.id).await?.is_empty());

    // An empty cart does not validate.
    let validation = cart_service::validate_cart(&state, &cart).await?;
    assert!(!validation.is_valid);
    assert_eq!(validation.issues.len(), 1);

    // Validation accumulates every broken line, not just the first.
    let (gone_product, gone_size) =
        common::create_product_with_size(&state, category.id, "Hoodie", "L", 5, 250_000).await?;
    let (thin_product, thin_size) =
        common::create_product_with_size(&state, category.id, "Cap", "M", 4, 90_000).await?;

    cart_service::add_to_cart(
        &state,
        &cart,
        AddToCartRequest {
            product_id: gone_product.id,
            product_size_id: gone_size.id,
            quantity: 2,
        },
    )
    .await?;
    cart_service::add_to_cart(
        &state,
        &cart,
        AddToCartRequest {
            product_id: thin_product.id,
            product_size_id: thin_size.id,
            quantity: 4,
        },
    )
    .await?;

    // Deactivate one product and shrink the other size's stock behind the
    // cart's back.
    let mut inactive: products::ActiveModel = gone_product.clone().into();
    inactive.is_active = Set(false);
    inactive.update(&state.orm).await?;
    let mut thin: product_sizes::ActiveModel = thin_size.clone().into();
    thin.stock = Set(1);
    thin.update(&state.orm).await?;

    let validation = cart_service::validate_cart(&state, &cart).await?;
    assert!(!validation.is_valid);
    assert_eq!(validation.issues.len(), 2, "issues: {:?}", validation.issues);

    // Guest cart merges into the user cart on login; the guest cart is gone.
    cart_service::clear_cart(&state.orm, cart.id).await?;
    cart_service::add_to_cart(
        &state,
        &cart,
        AddToCartRequest {
            product_id: product.id,
            product_size_id: size.id,
            quantity: 3,
        },
    )
    .await?;

    let alice = common::create_user(&state, "alice@example.com", Role::User).await?;
    let merged = cart_service::merge_guest_cart(&state, "session-1", alice.id).await?;
    assert_eq!(merged.user_id, Some(alice.id));

    let merged_items = cart_service::load_cart_items(&state.orm, merged.id).await?;
    assert_eq!(merged_items.len(), 1);
    assert_eq!(merged_items[0].0.quantity, 3);
    assert!(merged_items[0].0.quantity <= MAX_ITEM_QUANTITY);
    assert!(merged_items[0].0.quantity <= merged_items[0].2.stock);

    let guest_cart_left = carts::Entity::find()
        .filter(carts::Column::SessionId.eq("session-1"))
        .filter(carts::Column::UserId.is_null())
        .filter(carts::Column::DeletedAt.is_null())
        .one(&state.orm)
        .await?;
    assert!(guest_cart_left.is_none());

    // Merging is idempotent when no guest cart remains.
    let merged_again = cart_service::merge_guest_cart(&state, "session-1", alice.id).await?;
    assert_eq!(merged_again.id, merged.id);

    // Expiry sweep drops expired carts and their items, and reruns clean.
    let stale = common::guest_identity("session-stale");
    let stale_cart = cart_service::get_or_create_cart(&state, &stale).await?;
    cart_service::add_to_cart(
        &state,
        &stale_cart,
        AddToCartRequest {
            product_id: product.id,
            product_size_id: size.id,
            quantity: 1,
        },
    )
    .await?;
    sqlx::query("UPDATE carts SET expires_at = now() - interval '1 hour' WHERE id = $1")
        .bind(stale_cart.id)
        .execute(&state.pool)
        .await?;

    let swept = sweep::run_cart_sweep(&state).await?;
    assert_eq!(swept, 1);
    assert_eq!(sweep::run_cart_sweep(&state).await?, 0);

    let orphaned_items = cart_items::Entity::find()
        .filter(cart_items::Column::CartId.eq(stale_cart.id))
        .all(&state.orm)
        .await?;
    assert!(orphaned_items.is_empty());

    Ok(())
}
