use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entity::{order_items, orders},
    models::{OrderStatus, PaymentMethod, PaymentStatus},
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: String,
    pub address_line: String,
    pub city: String,
    pub district: String,
    pub ward: String,
    #[serde(default)]
    pub postal_code: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelOrderRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentWebhookRequest {
    pub order_code: String,
    pub transaction_id: String,
    #[serde(default)]
    pub response_data: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderSummary {
    pub item_count: usize,
    pub total_quantity: i32,
    pub total_amount: Decimal,
    pub shipping_fee: Decimal,
    pub discount_amount: Decimal,
    pub final_amount: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_size_id: Uuid,
    pub product_name: String,
    pub product_size: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

impl From<order_items::Model> for OrderItemResponse {
    fn from(item: order_items::Model) -> Self {
        Self {
            id: item.id,
            product_id: item.product_id,
            product_size_id: item.product_size_id,
            product_name: item.product_name,
            product_size: item.product_size,
            quantity: item.quantity,
            unit_price: item.unit_price,
            total_price: item.total_price,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub order_code: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub shipping_address: serde_json::Value,
    pub total_amount: Decimal,
    pub shipping_fee: Decimal,
    pub discount_amount: Decimal,
    pub final_amount: Decimal,
    pub status: OrderStatus,
    pub status_text: &'static str,
    pub payment_method: PaymentMethod,
    pub payment_method_text: &'static str,
    pub payment_status: PaymentStatus,
    pub payment_status_text: &'static str,
    pub notes: String,
    pub expires_at: DateTime<Utc>,
    pub order_items: Vec<OrderItemResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderResponse {
    pub fn from_entity(order: orders::Model, items: Vec<order_items::Model>) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            order_code: order.order_code,
            customer_name: order.customer_name,
            customer_email: order.customer_email,
            customer_phone: order.customer_phone,
            shipping_address: order.shipping_address,
            total_amount: order.total_amount,
            shipping_fee: order.shipping_fee,
            discount_amount: order.discount_amount,
            final_amount: order.final_amount,
            status: order.status,
            status_text: order.status.label(),
            payment_method: order.payment_method,
            payment_method_text: order.payment_method.label(),
            payment_status: order.payment_status,
            payment_status_text: order.payment_status.label(),
            notes: order.notes,
            expires_at: order.expires_at.with_timezone(&Utc),
            order_items: items.into_iter().map(OrderItemResponse::from).collect(),
            created_at: order.created_at.with_timezone(&Utc),
            updated_at: order.updated_at.with_timezone(&Utc),
        }
    }
}

/// Payload for a freshly created order: the order plus how to pay for it.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedOrderResponse {
    pub order: OrderResponse,
    pub payment_instructions: serde_json::Value,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BankTransferInfo {
    pub bank_name: String,
    pub account_number: String,
    pub account_name: String,
    pub amount: Decimal,
    pub transfer_note: String,
    pub qr_code_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentMethodInfo {
    pub method: PaymentMethod,
    pub method_text: &'static str,
    pub description: &'static str,
    pub is_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}
