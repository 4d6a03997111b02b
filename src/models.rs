//! Domain sum types shared by entities, services and DTOs, plus the business
//! constants that bound carts, logins and order codes.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const MAX_FAILED_LOGINS: i32 = 5;
pub const RECOVERY_CODE_TTL_MINUTES: i64 = 30;

pub const MAX_CART_ITEMS: u64 = 50;
pub const MAX_ITEM_QUANTITY: i32 = 100;
pub const GUEST_CART_TTL_HOURS: i64 = 24;
pub const USER_CART_TTL_HOURS: i64 = 24 * 7;

pub const ORDER_EXPIRY_MINUTES: i64 = 30;
pub const MIN_ORDER_CODE: u32 = 1;
pub const MAX_ORDER_CODE: u32 = 99_999;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "i16", db_type = "SmallInteger")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[sea_orm(num_value = 0)]
    Admin,
    #[sea_orm(num_value = 1)]
    User,
    #[sea_orm(num_value = 2)]
    Vip,
}

impl Role {
    pub fn name(self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::User => "User",
            Role::Vip => "VIP",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl OrderStatus {
    pub fn label(self) -> &'static str {
        match self {
            OrderStatus::Pending => "Đang chờ xử lý",
            OrderStatus::Paid => "Đã thanh toán",
            OrderStatus::Shipped => "Đang giao hàng",
            OrderStatus::Delivered => "Đã giao hàng",
            OrderStatus::Cancelled => "Đã hủy",
        }
    }

    pub fn can_be_cancelled(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Paid)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "unpaid")]
    Unpaid,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl PaymentStatus {
    pub fn label(self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "Chưa thanh toán",
            PaymentStatus::Paid => "Đã thanh toán",
            PaymentStatus::Failed => "Thanh toán thất bại",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(50))")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[sea_orm(string_value = "cod")]
    Cod,
    #[sea_orm(string_value = "bank_transfer")]
    BankTransfer,
    #[sea_orm(string_value = "momo")]
    Momo,
    #[sea_orm(string_value = "zalopay")]
    Zalopay,
    #[sea_orm(string_value = "vnpay")]
    Vnpay,
}

impl PaymentMethod {
    pub fn label(self) -> &'static str {
        match self {
            PaymentMethod::Cod => "Thanh toán khi nhận hàng",
            PaymentMethod::BankTransfer => "Chuyển khoản ngân hàng",
            PaymentMethod::Momo => "Ví MoMo",
            PaymentMethod::Zalopay => "ZaloPay",
            PaymentMethod::Vnpay => "VNPay",
        }
    }

    pub fn gateway(self) -> PaymentGateway {
        match self {
            PaymentMethod::Cod => PaymentGateway::Internal,
            PaymentMethod::BankTransfer => PaymentGateway::BankTransfer,
            PaymentMethod::Momo => PaymentGateway::Momo,
            PaymentMethod::Zalopay => PaymentGateway::Zalopay,
            PaymentMethod::Vnpay => PaymentGateway::Vnpay,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(50))")]
#[serde(rename_all = "snake_case")]
pub enum PaymentGateway {
    #[sea_orm(string_value = "internal")]
    Internal,
    #[sea_orm(string_value = "bank_transfer")]
    BankTransfer,
    #[sea_orm(string_value = "momo")]
    Momo,
    #[sea_orm(string_value = "zalopay")]
    Zalopay,
    #[sea_orm(string_value = "vnpay")]
    Vnpay,
}

impl PaymentGateway {
    pub fn label(self) -> &'static str {
        match self {
            PaymentGateway::Internal => "Hệ thống nội bộ",
            PaymentGateway::BankTransfer => "Chuyển khoản ngân hàng",
            PaymentGateway::Momo => "Ví MoMo",
            PaymentGateway::Zalopay => "ZaloPay",
            PaymentGateway::Vnpay => "VNPay",
        }
    }
}

/// Status of a row in the payments table (distinct from the order-level
/// payment_status).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum PaymentRecordStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl PaymentRecordStatus {
    pub fn label(self) -> &'static str {
        match self {
            PaymentRecordStatus::Pending => "Đang chờ xử lý",
            PaymentRecordStatus::Completed => "Hoàn thành",
            PaymentRecordStatus::Failed => "Thất bại",
            PaymentRecordStatus::Cancelled => "Đã hủy",
        }
    }
}

/// Unit price charged for one size of a product: the size's own price wins,
/// then a positive discount price, then the base price.
pub fn effective_unit_price(
    price: Decimal,
    discount_price: Option<Decimal>,
    size_price: Option<Decimal>,
) -> Decimal {
    if let Some(p) = size_price {
        return p;
    }
    match discount_price {
        Some(d) if d > Decimal::ZERO => d,
        _ => price,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_price_wins_over_discount() {
        let price = Decimal::from(100);
        let discount = Some(Decimal::from(80));
        let size = Some(Decimal::from(90));
        assert_eq!(
            effective_unit_price(price, discount, size),
            Decimal::from(90)
        );
        assert_eq!(
            effective_unit_price(price, discount, None),
            Decimal::from(80)
        );
        assert_eq!(effective_unit_price(price, None, None), Decimal::from(100));
    }

    #[test]
    fn zero_discount_is_ignored() {
        assert_eq!(
            effective_unit_price(Decimal::from(100), Some(Decimal::ZERO), None),
            Decimal::from(100)
        );
    }

    #[test]
    fn cancellable_only_while_pending_or_paid() {
        assert!(OrderStatus::Pending.can_be_cancelled());
        assert!(OrderStatus::Paid.can_be_cancelled());
        assert!(!OrderStatus::Shipped.can_be_cancelled());
        assert!(!OrderStatus::Delivered.can_be_cancelled());
        assert!(!OrderStatus::Cancelled.can_be_cancelled());
    }

    #[test]
    fn cod_settles_through_the_internal_gateway() {
        assert_eq!(PaymentMethod::Cod.gateway(), PaymentGateway::Internal);
        assert_eq!(
            PaymentMethod::BankTransfer.gateway(),
            PaymentGateway::BankTransfer
        );
    }

    #[test]
    fn wire_values_are_snake_case() {
        assert_eq!(
            serde_json::to_value(PaymentMethod::BankTransfer).unwrap(),
            serde_json::json!("bank_transfer")
        );
        assert_eq!(
            serde_json::to_value(OrderStatus::Pending).unwrap(),
            serde_json::json!("pending")
        );
    }
}
