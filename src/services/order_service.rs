use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    dto::orders::{
        BankTransferInfo, CreateOrderRequest, OrderSummary, PaymentMethodInfo, ShippingAddress,
    },
    entity::{
        cart_items, order_items,
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        orders,
        orders::{Column as OrderCol, Entity as Orders},
        payments,
        payments::{Column as PaymentCol, Entity as Payments},
        product_sizes,
        product_sizes::{Column as SizeCol, Entity as ProductSizes},
        products,
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::session::CartIdentity,
    models::{
        MAX_ORDER_CODE, MIN_ORDER_CODE, ORDER_EXPIRY_MINUTES, OrderStatus, PaymentMethod,
        PaymentRecordStatus, PaymentStatus,
    },
    notifier::Mail,
    services::cart_service,
    state::AppState,
};

const BANK_NAME: &str = "Ngân hàng TMCP Á Châu (ACB)";
const BANK_ACCOUNT_NUMBER: &str = "1234567890";
const BANK_ACCOUNT_NAME: &str = "CONG TY TNHH E-COMMERCE";

pub fn format_order_code(value: u32) -> String {
    format!("{value:05}")
}

/// Successor in the 00001..=99999 sequence, wrapping past the top.
pub fn next_code_value(current: u32) -> u32 {
    if current >= MAX_ORDER_CODE {
        MIN_ORDER_CODE
    } else {
        current + 1
    }
}

async fn code_taken<C: ConnectionTrait>(conn: &C, code: &str) -> AppResult<bool> {
    let existing = Orders::find()
        .filter(OrderCol::OrderCode.eq(code))
        .one(conn)
        .await?;
    Ok(existing.is_some())
}

/// Picks the next free order code: successor of the most recently created
/// order's code, probing forward (then from the bottom) on collision. The
/// caller holds the process-wide allocation mutex; the unique index on
/// orders.order_code is what makes this safe across processes.
pub async fn allocate_order_code<C: ConnectionTrait>(conn: &C) -> AppResult<String> {
    let last = Orders::find()
        .order_by_desc(OrderCol::CreatedAt)
        .one(conn)
        .await?;

    let next = match last {
        None => MIN_ORDER_CODE,
        Some(order) => {
            let current: u32 = order.order_code.parse().map_err(|_| {
                AppError::Internal(anyhow::anyhow!(
                    "malformed order code in storage: {}",
                    order.order_code
                ))
            })?;
            next_code_value(current)
        }
    };

    let candidate = format_order_code(next);
    if !code_taken(conn, &candidate).await? {
        return Ok(candidate);
    }

    for value in next + 1..=MAX_ORDER_CODE {
        let code = format_order_code(value);
        if !code_taken(conn, &code).await? {
            return Ok(code);
        }
    }
    for value in MIN_ORDER_CODE..next {
        let code = format_order_code(value);
        if !code_taken(conn, &code).await? {
            return Ok(code);
        }
    }

    Err(AppError::FailedPrecondition(
        "All order codes are taken".into(),
    ))
}

type CartRow = (cart_items::Model, products::Model, product_sizes::Model);

pub fn calculate_summary(
    state: &AppState,
    rows: &[CartRow],
    address: &ShippingAddress,
) -> AppResult<OrderSummary> {
    if rows.is_empty() {
        return Err(AppError::FailedPrecondition("Cart is empty".into()));
    }

    let total_quantity: i32 = rows.iter().map(|(item, _, _)| item.quantity).sum();
    let total_amount: Decimal = rows
        .iter()
        .map(|(item, _, _)| item.price * Decimal::from(item.quantity))
        .sum();

    let shipping_fee = state.shipping.shipping_fee(address, total_amount);
    let discount_amount = state.discount.discount(total_amount);

    Ok(OrderSummary {
        item_count: rows.len(),
        total_quantity,
        total_amount,
        shipping_fee,
        discount_amount,
        final_amount: total_amount + shipping_fee - discount_amount,
    })
}

/// Turns a validated cart into an immutable order: allocates the order code,
/// reserves per-size stock under row locks, snapshots the items, clears the
/// cart and attaches a pending payment, all in one transaction.
pub async fn create_order(
    state: &AppState,
    identity: &CartIdentity,
    req: &CreateOrderRequest,
) -> AppResult<(orders::Model, Vec<order_items::Model>)> {
    validate_order_request(req)?;

    let cart = cart_service::get_or_create_cart(state, identity).await?;
    let validation = cart_service::validate_cart(state, &cart).await?;
    if !validation.is_valid {
        return Err(AppError::FailedPrecondition(format!(
            "Cart validation failed: {}",
            validation.issues.join("; ")
        )));
    }

    let rows = cart_service::load_cart_items(&state.orm, cart.id).await?;
    let summary = calculate_summary(state, &rows, &req.shipping_address)?;
    let shipping_json = serde_json::to_value(&req.shipping_address)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("shipping address encoding: {e}")))?;

    // One retry on an order-code collision from a concurrent process; the
    // in-process mutex makes this rare.
    let mut attempt = 0;
    loop {
        match try_create_order(state, identity, req, &cart, &rows, &summary, &shipping_json).await
        {
            Err(AppError::DbError(err)) if attempt == 0 && is_unique_violation(&err) => {
                attempt += 1;
                tracing::warn!("order code collision, retrying allocation");
            }
            Err(err) => return Err(err),
            Ok((order, items)) => {
                state.notifier.enqueue(
                    &order.customer_email,
                    Mail::OrderConfirmation {
                        order_code: order.order_code.clone(),
                        final_amount: order.final_amount.to_string(),
                    },
                );
                return Ok((order, items));
            }
        }
    }
}

fn is_unique_violation(err: &sea_orm::DbErr) -> bool {
    matches!(
        err.sql_err(),
        Some(sea_orm::SqlErr::UniqueConstraintViolation(_))
    )
}

fn validate_order_request(req: &CreateOrderRequest) -> AppResult<()> {
    if req.customer_name.trim().len() < 2 {
        return Err(AppError::Validation("Customer name is required".into()));
    }
    if !req.customer_email.contains('@') {
        return Err(AppError::Validation("Customer email is invalid".into()));
    }
    if req.customer_phone.trim().len() < 10 {
        return Err(AppError::Validation("Customer phone is invalid".into()));
    }
    if req.shipping_address.address_line.trim().len() < 10 {
        return Err(AppError::Validation("Shipping address is too short".into()));
    }
    Ok(())
}

async fn try_create_order(
    state: &AppState,
    identity: &CartIdentity,
    req: &CreateOrderRequest,
    cart: &crate::entity::carts::Model,
    rows: &[CartRow],
    summary: &OrderSummary,
    shipping_json: &serde_json::Value,
) -> AppResult<(orders::Model, Vec<order_items::Model>)> {
    let _allocation_guard = state.order_code_lock.lock().await;
    let txn = state.orm.begin().await?;

    let order_code = allocate_order_code(&txn).await?;
    let order = orders::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(identity.user_id),
        order_code: Set(order_code),
        customer_name: Set(req.customer_name.clone()),
        customer_email: Set(req.customer_email.clone()),
        customer_phone: Set(req.customer_phone.clone()),
        shipping_address: Set(shipping_json.clone()),
        total_amount: Set(summary.total_amount),
        shipping_fee: Set(summary.shipping_fee),
        discount_amount: Set(summary.discount_amount),
        final_amount: Set(summary.final_amount),
        status: Set(OrderStatus::Pending),
        payment_method: Set(req.payment_method),
        payment_status: Set(PaymentStatus::Unpaid),
        notes: Set(req.notes.clone()),
        session_id: Set(identity.session_id.clone()),
        expires_at: Set((Utc::now() + Duration::minutes(ORDER_EXPIRY_MINUTES)).into()),
        created_at: NotSet,
        updated_at: NotSet,
        deleted_at: NotSet,
    }
    .insert(&txn)
    .await?;

    // Lock sizes in a fixed order so overlapping orders cannot deadlock.
    let mut rows: Vec<&CartRow> = rows.iter().collect();
    rows.sort_by_key(|(item, _, _)| item.product_size_id);

    let mut items_out = Vec::with_capacity(rows.len());
    for (item, product, _) in rows {
        let size = ProductSizes::find_by_id(item.product_size_id)
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .ok_or(AppError::NotFound("Product size"))?;

        if size.stock < item.quantity {
            return Err(AppError::FailedPrecondition(format!(
                "Insufficient stock for {} - {}. Available: {}, Required: {}",
                product.name, size.size, size.stock, item.quantity
            )));
        }

        ProductSizes::update_many()
            .col_expr(SizeCol::Stock, Expr::col(SizeCol::Stock).sub(item.quantity))
            .filter(SizeCol::Id.eq(size.id))
            .exec(&txn)
            .await?;
        Products::update_many()
            .col_expr(
                ProdCol::TotalStock,
                Expr::col(ProdCol::TotalStock).sub(item.quantity),
            )
            .filter(ProdCol::Id.eq(item.product_id))
            .exec(&txn)
            .await?;

        let order_item = order_items::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(item.product_id),
            product_size_id: Set(item.product_size_id),
            product_name: Set(product.name.clone()),
            product_size: Set(size.size.clone()),
            quantity: Set(item.quantity),
            unit_price: Set(item.price),
            total_price: Set(item.price * Decimal::from(item.quantity)),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        items_out.push(order_item);
    }

    cart_service::clear_cart(&txn, cart.id).await?;

    payments::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        transaction_id: Set(String::new()),
        amount: Set(order.final_amount),
        payment_gateway: Set(req.payment_method.gateway()),
        status: Set(PaymentRecordStatus::Pending),
        payment_date: NotSet,
        response_data: NotSet,
        notes: Set(String::new()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    Ok((order, items_out))
}

pub async fn load_order_items<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> AppResult<Vec<order_items::Model>> {
    Ok(OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(conn)
        .await?)
}

/// Loads an order scoped to its owner: by user id for logged-in callers, by
/// session id for guests.
pub async fn get_order(
    state: &AppState,
    identity: &CartIdentity,
    order_code: &str,
) -> AppResult<(orders::Model, Vec<order_items::Model>)> {
    let mut finder = Orders::find()
        .filter(OrderCol::DeletedAt.is_null())
        .filter(OrderCol::OrderCode.eq(order_code));
    finder = match identity.user_id {
        Some(user_id) => finder.filter(OrderCol::UserId.eq(user_id)),
        None => finder
            .filter(OrderCol::UserId.is_null())
            .filter(OrderCol::SessionId.eq(identity.session_id.as_str())),
    };

    let order = finder.one(&state.orm).await?.ok_or(AppError::NotFound("Order"))?;
    let items = load_order_items(&state.orm, order.id).await?;
    Ok((order, items))
}

pub async fn cancel_order(
    state: &AppState,
    identity: &CartIdentity,
    order_code: &str,
    reason: &str,
) -> AppResult<()> {
    let (order, _) = get_order(state, identity, order_code).await?;
    cancel_loaded(state, order, reason).await
}

/// Cancels a loaded order: flips the status, restores every reserved unit and
/// voids the payment rows, atomically.
async fn cancel_loaded(state: &AppState, order: orders::Model, reason: &str) -> AppResult<()> {
    if !order.status.can_be_cancelled() {
        return Err(AppError::FailedPrecondition(format!(
            "Order cannot be cancelled. Current status: {}",
            order.status.to_value()
        )));
    }

    let customer_email = order.customer_email.clone();
    let order_code = order.order_code.clone();

    let txn = state.orm.begin().await?;
    let items = load_order_items(&txn, order.id).await?;

    let order_id = order.id;
    let notes = if order.notes.is_empty() {
        format!("Lý do hủy: {reason}")
    } else {
        format!("{}\nLý do hủy: {reason}", order.notes)
    };
    let mut active: orders::ActiveModel = order.into();
    active.status = Set(OrderStatus::Cancelled);
    active.notes = Set(notes);
    active.updated_at = Set(Utc::now().into());
    active.update(&txn).await?;

    for item in &items {
        ProductSizes::update_many()
            .col_expr(SizeCol::Stock, Expr::col(SizeCol::Stock).add(item.quantity))
            .filter(SizeCol::Id.eq(item.product_size_id))
            .exec(&txn)
            .await?;
        Products::update_many()
            .col_expr(
                ProdCol::TotalStock,
                Expr::col(ProdCol::TotalStock).add(item.quantity),
            )
            .filter(ProdCol::Id.eq(item.product_id))
            .exec(&txn)
            .await?;
    }

    let pending = Payments::find()
        .filter(PaymentCol::OrderId.eq(order_id))
        .all(&txn)
        .await?;
    for payment in pending {
        let mut active: payments::ActiveModel = payment.into();
        active.status = Set(PaymentRecordStatus::Cancelled);
        active.updated_at = Set(Utc::now().into());
        active.update(&txn).await?;
    }

    txn.commit().await?;

    state.notifier.enqueue(
        &customer_email,
        Mail::OrderCancelled {
            order_code,
            reason: reason.to_string(),
        },
    );
    Ok(())
}

/// Webhook settlement. Idempotent: an already-paid order reports success
/// without touching the payment rows again.
pub async fn process_payment(
    state: &AppState,
    order_code: &str,
    transaction_id: &str,
    response_data: Option<serde_json::Value>,
) -> AppResult<()> {
    let order = Orders::find()
        .filter(OrderCol::DeletedAt.is_null())
        .filter(OrderCol::OrderCode.eq(order_code))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Order"))?;

    if order.payment_status == PaymentStatus::Paid {
        return Ok(());
    }

    let customer_email = order.customer_email.clone();
    let order_code = order.order_code.clone();
    let order_id = order.id;

    let txn = state.orm.begin().await?;

    let mut active: orders::ActiveModel = order.into();
    active.status = Set(OrderStatus::Paid);
    active.payment_status = Set(PaymentStatus::Paid);
    active.updated_at = Set(Utc::now().into());
    active.update(&txn).await?;

    let pending = Payments::find()
        .filter(PaymentCol::OrderId.eq(order_id))
        .filter(PaymentCol::Status.eq(PaymentRecordStatus::Pending))
        .all(&txn)
        .await?;
    for payment in pending {
        let mut active: payments::ActiveModel = payment.into();
        active.transaction_id = Set(transaction_id.to_string());
        active.status = Set(PaymentRecordStatus::Completed);
        active.payment_date = Set(Some(Utc::now().into()));
        active.response_data = Set(response_data.clone());
        active.updated_at = Set(Utc::now().into());
        active.update(&txn).await?;
    }

    txn.commit().await?;

    state
        .notifier
        .enqueue(&customer_email, Mail::PaymentConfirmation { order_code });
    Ok(())
}

/// Admin confirmation for cash-on-delivery orders.
pub async fn confirm_cod(state: &AppState, order_code: &str) -> AppResult<()> {
    let response_data = serde_json::json!({
        "payment_method": "cod",
        "confirmed_by": "admin",
        "confirmed_at": Utc::now(),
    });
    process_payment(
        state,
        order_code,
        &format!("COD_{order_code}"),
        Some(response_data),
    )
    .await
}

pub fn bank_transfer_info(order_code: &str, amount: Decimal) -> BankTransferInfo {
    let transfer_note = format!("DH {order_code}");
    let qr_code_url = format!(
        "https://api.qrserver.com/v1/create-qr-code/?size=300x300&data=Bank:{},Amount:{},Note:{}",
        BANK_ACCOUNT_NUMBER,
        amount.round_dp(0),
        transfer_note
    );
    BankTransferInfo {
        bank_name: BANK_NAME.to_string(),
        account_number: BANK_ACCOUNT_NUMBER.to_string(),
        account_name: BANK_ACCOUNT_NAME.to_string(),
        amount,
        transfer_note,
        qr_code_url,
    }
}

pub fn payment_instructions(order: &orders::Model) -> serde_json::Value {
    match order.payment_method {
        PaymentMethod::BankTransfer => {
            serde_json::to_value(bank_transfer_info(&order.order_code, order.final_amount))
                .unwrap_or_default()
        }
        PaymentMethod::Cod => serde_json::json!({
            "message": "Thanh toán khi nhận hàng. Vui lòng chuẩn bị đúng số tiền khi nhận hàng.",
        }),
        _ => serde_json::json!({
            "message": "Phương thức thanh toán này sẽ được tích hợp sớm.",
        }),
    }
}

pub fn payment_methods() -> Vec<PaymentMethodInfo> {
    vec![
        PaymentMethodInfo {
            method: PaymentMethod::Cod,
            method_text: PaymentMethod::Cod.label(),
            description: "Thanh toán bằng tiền mặt khi nhận hàng",
            is_available: true,
            extra: None,
        },
        PaymentMethodInfo {
            method: PaymentMethod::BankTransfer,
            method_text: PaymentMethod::BankTransfer.label(),
            description: "Chuyển khoản qua ngân hàng với QR Code",
            is_available: true,
            extra: Some(serde_json::json!({
                "bank_info": {
                    "bank_name": BANK_NAME,
                    "account_number": BANK_ACCOUNT_NUMBER,
                    "account_name": BANK_ACCOUNT_NAME,
                },
            })),
        },
        PaymentMethodInfo {
            method: PaymentMethod::Momo,
            method_text: PaymentMethod::Momo.label(),
            description: "Thanh toán qua ví điện tử MoMo",
            is_available: false,
            extra: Some(serde_json::json!({ "note": "Tính năng sẽ được tích hợp sớm" })),
        },
        PaymentMethodInfo {
            method: PaymentMethod::Zalopay,
            method_text: PaymentMethod::Zalopay.label(),
            description: "Thanh toán qua ví điện tử ZaloPay",
            is_available: false,
            extra: Some(serde_json::json!({ "note": "Tính năng sẽ được tích hợp sớm" })),
        },
        PaymentMethodInfo {
            method: PaymentMethod::Vnpay,
            method_text: PaymentMethod::Vnpay.label(),
            description: "Thanh toán qua cổng VNPay",
            is_available: false,
            extra: Some(serde_json::json!({ "note": "Tính năng sẽ được tích hợp sớm" })),
        },
    ]
}

/// Cancels every pending, unpaid order whose payment window has lapsed.
/// Stock returns to the shelves exactly as CancelOrder would restore it.
pub async fn sweep_expired(state: &AppState) -> AppResult<u64> {
    let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();
    let expired = Orders::find()
        .filter(OrderCol::DeletedAt.is_null())
        .filter(OrderCol::Status.eq(OrderStatus::Pending))
        .filter(OrderCol::PaymentStatus.eq(PaymentStatus::Unpaid))
        .filter(OrderCol::ExpiresAt.lt(now))
        .all(&state.orm)
        .await?;

    let mut cancelled = 0;
    for order in expired {
        let order_code = order.order_code.clone();
        match cancel_loaded(state, order, "Đơn hàng hết hạn thanh toán").await {
            Ok(()) => cancelled += 1,
            Err(err) => {
                tracing::error!(order_code = %order_code, error = %err, "expired order cancel failed");
            }
        }
    }
    Ok(cancelled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_sequence_wraps_at_the_top() {
        assert_eq!(next_code_value(1), 2);
        assert_eq!(next_code_value(99_998), 99_999);
        assert_eq!(next_code_value(99_999), 1);
    }

    #[test]
    fn codes_are_zero_padded_to_five_digits() {
        assert_eq!(format_order_code(1), "00001");
        assert_eq!(format_order_code(42), "00042");
        assert_eq!(format_order_code(99_999), "99999");
    }

    #[test]
    fn transfer_note_references_the_order_code() {
        let info = bank_transfer_info("00042", Decimal::from(130_000));
        assert_eq!(info.transfer_note, "DH 00042");
        assert!(info.qr_code_url.contains("Amount:130000"));
        assert!(info.qr_code_url.contains("Note:DH 00042"));
    }

    #[test]
    fn only_cod_and_bank_transfer_are_live() {
        let methods = payment_methods();
        assert_eq!(methods.len(), 5);
        let available: Vec<_> = methods
            .iter()
            .filter(|m| m.is_available)
            .map(|m| m.method)
            .collect();
        assert_eq!(
            available,
            vec![PaymentMethod::Cod, PaymentMethod::BankTransfer]
        );
    }
}
