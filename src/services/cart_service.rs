use std::collections::HashMap;

use chrono::{Duration, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::{
    db::OrmConn,
    dto::cart::{AddToCartRequest, CartItemResponse, CartResponse, CartValidationResult},
    entity::{
        cart_items::{self, Column as ItemCol, Entity as CartItems},
        carts::{self, Column as CartCol, Entity as Carts},
        product_sizes::{self, Column as SizeCol, Entity as ProductSizes},
        products::{self, Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::session::CartIdentity,
    models::{
        GUEST_CART_TTL_HOURS, MAX_CART_ITEMS, MAX_ITEM_QUANTITY, USER_CART_TTL_HOURS,
        effective_unit_price,
    },
    state::AppState,
};

fn expiry_time(is_guest: bool) -> sea_orm::prelude::DateTimeWithTimeZone {
    let hours = if is_guest {
        GUEST_CART_TTL_HOURS
    } else {
        USER_CART_TTL_HOURS
    };
    (Utc::now() + Duration::hours(hours)).into()
}

fn is_expired(cart: &carts::Model) -> bool {
    cart.expires_at.with_timezone(&Utc) < Utc::now()
}

async fn find_cart(conn: &OrmConn, identity: &CartIdentity) -> AppResult<Option<carts::Model>> {
    let mut finder = Carts::find().filter(CartCol::DeletedAt.is_null());
    finder = match identity.user_id {
        Some(user_id) => finder.filter(CartCol::UserId.eq(user_id)),
        None => finder
            .filter(CartCol::UserId.is_null())
            .filter(CartCol::SessionId.eq(identity.session_id.as_str())),
    };
    Ok(finder.one(conn).await?)
}

/// Loads the one active cart for the identity, creating it on first use. An
/// expired cart is soft-reset: items dropped, expiry refreshed, row kept.
pub async fn get_or_create_cart(
    state: &AppState,
    identity: &CartIdentity,
) -> AppResult<carts::Model> {
    let cart = match find_cart(&state.orm, identity).await? {
        Some(cart) => cart,
        None => carts::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(identity.user_id),
            session_id: Set(identity.session_id.clone()),
            expires_at: Set(expiry_time(identity.is_guest())),
            created_at: NotSet,
            updated_at: NotSet,
            deleted_at: NotSet,
        }
        .insert(&state.orm)
        .await?,
    };

    if is_expired(&cart) {
        clear_cart(&state.orm, cart.id).await?;
        let is_guest = cart.user_id.is_none();
        let mut active: carts::ActiveModel = cart.into();
        active.expires_at = Set(expiry_time(is_guest));
        active.updated_at = Set(Utc::now().into());
        return Ok(active.update(&state.orm).await?);
    }

    Ok(cart)
}

/// Cart items joined with their current product and size rows.
pub async fn load_cart_items(
    conn: &OrmConn,
    cart_id: Uuid,
) -> AppResult<Vec<(cart_items::Model, products::Model, product_sizes::Model)>> {
    let items = CartItems::find()
        .filter(ItemCol::CartId.eq(cart_id))
        .order_by_asc(ItemCol::CreatedAt)
        .all(conn)
        .await?;
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
    let size_ids: Vec<Uuid> = items.iter().map(|i| i.product_size_id).collect();

    let products: HashMap<Uuid, products::Model> = Products::find()
        .filter(ProdCol::Id.is_in(product_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();
    let sizes: HashMap<Uuid, product_sizes::Model> = ProductSizes::find()
        .filter(SizeCol::Id.is_in(size_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|s| (s.id, s))
        .collect();

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match (
            products.get(&item.product_id).cloned(),
            sizes.get(&item.product_size_id).cloned(),
        ) {
            (Some(product), Some(size)) => out.push((item, product, size)),
            _ => tracing::warn!(item_id = %item.id, "cart item references missing rows"),
        }
    }
    Ok(out)
}

pub async fn cart_response(state: &AppState, cart: carts::Model) -> AppResult<CartResponse> {
    let rows = load_cart_items(&state.orm, cart.id).await?;
    let items = rows
        .into_iter()
        .map(|(item, product, size)| CartItemResponse::from_entities(item, &product, &size))
        .collect();
    Ok(CartResponse::from_parts(cart, items))
}

pub async fn add_to_cart(
    state: &AppState,
    cart: &carts::Model,
    req: AddToCartRequest,
) -> AppResult<()> {
    if req.quantity < 1 {
        return Err(AppError::Validation(
            "Quantity must be greater than 0".into(),
        ));
    }
    if req.quantity > MAX_ITEM_QUANTITY {
        return Err(AppError::FailedPrecondition(format!(
            "Item quantity limit exceeded ({MAX_ITEM_QUANTITY} items)"
        )));
    }

    let product = Products::find_by_id(req.product_id)
        .filter(ProdCol::DeletedAt.is_null())
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Product"))?;
    if !product.is_active {
        return Err(AppError::FailedPrecondition(
            "Product is not active".into(),
        ));
    }

    let size = ProductSizes::find_by_id(req.product_size_id)
        .filter(SizeCol::DeletedAt.is_null())
        .one(&state.orm)
        .await?
        .filter(|s| s.product_id == product.id)
        .ok_or(AppError::NotFound("Product size"))?;
    if !size.is_active {
        return Err(AppError::FailedPrecondition(
            "Product size is not active".into(),
        ));
    }
    if size.stock < req.quantity {
        return Err(AppError::FailedPrecondition(format!(
            "Insufficient stock. Available: {}",
            size.stock
        )));
    }

    let price = effective_unit_price(product.price, product.discount_price, size.price);

    let existing = CartItems::find()
        .filter(ItemCol::CartId.eq(cart.id))
        .filter(ItemCol::ProductId.eq(req.product_id))
        .filter(ItemCol::ProductSizeId.eq(req.product_size_id))
        .one(&state.orm)
        .await?;

    match existing {
        None => {
            let item_count = CartItems::find()
                .filter(ItemCol::CartId.eq(cart.id))
                .count(&state.orm)
                .await?;
            if item_count >= MAX_CART_ITEMS {
                return Err(AppError::FailedPrecondition(format!(
                    "Cart items limit exceeded ({MAX_CART_ITEMS} items)"
                )));
            }

            cart_items::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(req.product_id),
                product_size_id: Set(req.product_size_id),
                quantity: Set(req.quantity),
                price: Set(price),
                created_at: NotSet,
                updated_at: NotSet,
            }
            .insert(&state.orm)
            .await?;
        }
        Some(item) => {
            let new_quantity = item.quantity + req.quantity;
            if new_quantity > MAX_ITEM_QUANTITY {
                return Err(AppError::FailedPrecondition(format!(
                    "Item quantity limit exceeded ({MAX_ITEM_QUANTITY} items)"
                )));
            }
            if size.stock < new_quantity {
                return Err(AppError::FailedPrecondition(format!(
                    "Insufficient stock for total quantity. Available: {}",
                    size.stock
                )));
            }

            let mut active: cart_items::ActiveModel = item.into();
            active.quantity = Set(new_quantity);
            // Captured price follows the current effective price on re-add.
            active.price = Set(price);
            active.updated_at = Set(Utc::now().into());
            active.update(&state.orm).await?;
        }
    }

    let is_guest = cart.user_id.is_none();
    let mut active: carts::ActiveModel = cart.clone().into();
    active.expires_at = Set(expiry_time(is_guest));
    active.updated_at = Set(Utc::now().into());
    active.update(&state.orm).await?;

    Ok(())
}

pub async fn update_cart_item(
    state: &AppState,
    cart_id: Uuid,
    item_id: Uuid,
    quantity: i32,
) -> AppResult<()> {
    let item = CartItems::find_by_id(item_id)
        .filter(ItemCol::CartId.eq(cart_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Cart item"))?;

    if quantity == 0 {
        CartItems::delete_by_id(item.id).exec(&state.orm).await?;
        return Ok(());
    }
    if quantity < 0 {
        return Err(AppError::Validation("Quantity must not be negative".into()));
    }
    if quantity > MAX_ITEM_QUANTITY {
        return Err(AppError::FailedPrecondition(format!(
            "Item quantity limit exceeded ({MAX_ITEM_QUANTITY} items)"
        )));
    }

    let size = ProductSizes::find_by_id(item.product_size_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Product size"))?;
    if size.stock < quantity {
        return Err(AppError::FailedPrecondition(format!(
            "Insufficient stock. Available: {}",
            size.stock
        )));
    }

    let mut active: cart_items::ActiveModel = item.into();
    active.quantity = Set(quantity);
    active.updated_at = Set(Utc::now().into());
    active.update(&state.orm).await?;
    Ok(())
}

pub async fn remove_from_cart(state: &AppState, cart_id: Uuid, item_id: Uuid) -> AppResult<()> {
    let result = CartItems::delete_many()
        .filter(ItemCol::Id.eq(item_id))
        .filter(ItemCol::CartId.eq(cart_id))
        .exec(&state.orm)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Cart item"));
    }
    Ok(())
}

pub async fn clear_cart<C: ConnectionTrait>(conn: &C, cart_id: Uuid) -> AppResult<u64> {
    let result = CartItems::delete_many()
        .filter(ItemCol::CartId.eq(cart_id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

/// Inspects every item and accumulates all issues; never stops at the first.
pub async fn validate_cart(state: &AppState, cart: &carts::Model) -> AppResult<CartValidationResult> {
    let mut issues = Vec::new();

    if is_expired(cart) {
        issues.push("Giỏ hàng đã hết hạn".to_string());
        return Ok(CartValidationResult {
            is_valid: false,
            issues,
        });
    }

    let rows = load_cart_items(&state.orm, cart.id).await?;
    if rows.is_empty() {
        issues.push("Giỏ hàng trống".to_string());
        return Ok(CartValidationResult {
            is_valid: false,
            issues,
        });
    }

    for (item, product, size) in &rows {
        if !product.is_active {
            issues.push(format!("{} không còn hoạt động", product.name));
        } else if !size.is_active {
            issues.push(format!(
                "{} - Size {} không còn hoạt động",
                product.name, size.size
            ));
        } else if size.stock == 0 {
            issues.push(format!("{} - Size {} đã hết hàng", product.name, size.size));
        } else if size.stock < item.quantity {
            issues.push(format!(
                "{} - Size {} chỉ còn {} sản phẩm (yêu cầu {})",
                product.name, size.size, size.stock, item.quantity
            ));
        }
    }

    Ok(CartValidationResult {
        is_valid: issues.is_empty(),
        issues,
    })
}

/// Folds a guest cart into the user's cart after login. Items that no longer
/// fit (bounds, stock, inactive rows) are dropped; the merge is best-effort.
pub async fn merge_guest_cart(
    state: &AppState,
    session_id: &str,
    user_id: Uuid,
) -> AppResult<carts::Model> {
    let user_identity = CartIdentity {
        user_id: Some(user_id),
        session_id: session_id.to_string(),
    };

    let guest_cart = Carts::find()
        .filter(CartCol::DeletedAt.is_null())
        .filter(CartCol::UserId.is_null())
        .filter(CartCol::SessionId.eq(session_id))
        .one(&state.orm)
        .await?;

    let user_cart = get_or_create_cart(state, &user_identity).await?;
    let Some(guest_cart) = guest_cart else {
        return Ok(user_cart);
    };

    let guest_items = CartItems::find()
        .filter(ItemCol::CartId.eq(guest_cart.id))
        .all(&state.orm)
        .await?;

    for item in guest_items {
        let req = AddToCartRequest {
            product_id: item.product_id,
            product_size_id: item.product_size_id,
            quantity: item.quantity,
        };
        if let Err(err) = add_to_cart(state, &user_cart, req).await {
            tracing::debug!(item_id = %item.id, error = %err, "guest cart item dropped on merge");
        }
    }

    clear_cart(&state.orm, guest_cart.id).await?;
    let mut active: carts::ActiveModel = guest_cart.into();
    active.deleted_at = Set(Some(Utc::now().into()));
    active.update(&state.orm).await?;

    find_cart(&state.orm, &user_identity)
        .await?
        .ok_or(AppError::NotFound("Cart"))
}

/// Idempotent expiry sweep: drops the items of every expired live cart, then
/// the carts themselves.
pub async fn sweep_expired(conn: &OrmConn) -> AppResult<u64> {
    let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();

    let expired: Vec<Uuid> = Carts::find()
        .filter(CartCol::DeletedAt.is_null())
        .filter(CartCol::ExpiresAt.lt(now))
        .all(conn)
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect();

    if expired.is_empty() {
        return Ok(0);
    }

    CartItems::delete_many()
        .filter(ItemCol::CartId.is_in(expired.clone()))
        .exec(conn)
        .await?;

    let result = Carts::update_many()
        .col_expr(CartCol::DeletedAt, sea_orm::sea_query::Expr::value(now))
        .filter(CartCol::Id.is_in(expired))
        .exec(conn)
        .await?;

    Ok(result.rows_affected)
}
