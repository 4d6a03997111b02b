use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entity::{cart_items, carts, product_sizes, products},
    models::effective_unit_price,
};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    pub product_size_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    /// 0 removes the item.
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_size_id: Uuid,
    pub product_name: String,
    pub size: String,
    pub quantity: i32,
    /// Price captured when the item entered the cart.
    pub price: Decimal,
    /// What the same size costs right now.
    pub current_price: Decimal,
    pub subtotal: Decimal,
    pub is_available: bool,
    pub stock_status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartItemResponse {
    pub fn from_entities(
        item: cart_items::Model,
        product: &products::Model,
        size: &product_sizes::Model,
    ) -> Self {
        let current_price =
            effective_unit_price(product.price, product.discount_price, size.price);

        let (is_available, stock_status, message) = if !product.is_active {
            (false, "product_inactive", Some("Sản phẩm không còn hoạt động".to_string()))
        } else if !size.is_active {
            (false, "size_inactive", Some("Size không còn hoạt động".to_string()))
        } else if size.stock == 0 {
            (false, "out_of_stock", Some("Hết hàng".to_string()))
        } else if size.stock < item.quantity {
            (
                false,
                "insufficient_stock",
                Some(format!("Chỉ còn {} sản phẩm", size.stock)),
            )
        } else {
            (true, "available", None)
        };

        Self {
            id: item.id,
            product_id: item.product_id,
            product_size_id: item.product_size_id,
            product_name: product.name.clone(),
            size: size.size.clone(),
            quantity: item.quantity,
            price: item.price,
            current_price,
            subtotal: item.price * Decimal::from(item.quantity),
            is_available,
            stock_status,
            message,
            created_at: item.created_at.with_timezone(&Utc),
            updated_at: item.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartResponse {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub session_id: String,
    pub item_count: usize,
    pub total_quantity: i32,
    pub subtotal: Decimal,
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
    pub expires_at: DateTime<Utc>,
    pub cart_items: Vec<CartItemResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartResponse {
    pub fn from_parts(cart: carts::Model, items: Vec<CartItemResponse>) -> Self {
        let expired = cart.expires_at.with_timezone(&Utc) < Utc::now();
        let total_quantity = items.iter().map(|i| i.quantity).sum();
        let subtotal = items.iter().map(|i| i.subtotal).sum();

        let mut issues: Vec<String> = items
            .iter()
            .filter(|i| !i.is_available)
            .filter_map(|i| {
                i.message
                    .as_ref()
                    .map(|m| format!("{} - {}: {}", i.product_name, i.size, m))
            })
            .collect();
        if expired {
            issues.push("Giỏ hàng đã hết hạn".to_string());
        }

        Self {
            id: cart.id,
            user_id: cart.user_id,
            session_id: cart.session_id,
            item_count: items.len(),
            total_quantity,
            subtotal,
            is_valid: issues.is_empty(),
            issues,
            expires_at: cart.expires_at.with_timezone(&Utc),
            cart_items: items,
            created_at: cart.created_at.with_timezone(&Utc),
            updated_at: cart.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartValidationResult {
    pub is_valid: bool,
    pub issues: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartCountResponse {
    pub item_count: usize,
    pub total_quantity: i32,
    pub total: Decimal,
}
