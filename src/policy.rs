//! Pluggable pricing policies for order checkout. The defaults mirror the
//! store's launch rules; swapping a policy is a one-field change on AppState.

use rust_decimal::Decimal;

use crate::dto::orders::ShippingAddress;

pub trait ShippingPolicy: Send + Sync {
    fn shipping_fee(&self, address: &ShippingAddress, subtotal: Decimal) -> Decimal;
}

pub trait DiscountPolicy: Send + Sync {
    fn discount(&self, subtotal: Decimal) -> Decimal;
}

/// Free shipping from 500 000; otherwise a 30 000 base fee with a 20 000
/// surcharge for the remote provinces.
pub struct TieredShipping;

const FREE_SHIPPING_THRESHOLD: i64 = 500_000;
const BASE_SHIPPING_FEE: i64 = 30_000;
const REMOTE_SURCHARGE: i64 = 20_000;
const REMOTE_CITIES: [&str; 4] = ["Cà Mau", "An Giang", "Kiên Giang", "Hà Giang"];

impl ShippingPolicy for TieredShipping {
    fn shipping_fee(&self, address: &ShippingAddress, subtotal: Decimal) -> Decimal {
        if subtotal >= Decimal::from(FREE_SHIPPING_THRESHOLD) {
            return Decimal::ZERO;
        }

        let mut fee = Decimal::from(BASE_SHIPPING_FEE);
        if REMOTE_CITIES.contains(&address.city.as_str()) {
            fee += Decimal::from(REMOTE_SURCHARGE);
        }
        fee
    }
}

/// 5 % off when the subtotal reaches 1 000 000.
pub struct VolumeDiscount;

const DISCOUNT_THRESHOLD: i64 = 1_000_000;

impl DiscountPolicy for VolumeDiscount {
    fn discount(&self, subtotal: Decimal) -> Decimal {
        if subtotal >= Decimal::from(DISCOUNT_THRESHOLD) {
            subtotal * Decimal::new(5, 2)
        } else {
            Decimal::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(city: &str) -> ShippingAddress {
        ShippingAddress {
            full_name: "Nguyễn Văn A".into(),
            phone: "0900000000".into(),
            address_line: "1 Đường Lê Lợi, Phường Bến Nghé".into(),
            city: city.into(),
            district: "Quận 1".into(),
            ward: "Bến Nghé".into(),
            postal_code: String::new(),
        }
    }

    #[test]
    fn shipping_is_free_above_threshold() {
        let policy = TieredShipping;
        assert_eq!(
            policy.shipping_fee(&address("Hà Nội"), Decimal::from(500_000)),
            Decimal::ZERO
        );
        assert_eq!(
            policy.shipping_fee(&address("Hà Nội"), Decimal::from(499_999)),
            Decimal::from(30_000)
        );
    }

    #[test]
    fn remote_cities_pay_a_surcharge() {
        let policy = TieredShipping;
        assert_eq!(
            policy.shipping_fee(&address("Cà Mau"), Decimal::from(100_000)),
            Decimal::from(50_000)
        );
        assert_eq!(
            policy.shipping_fee(&address("Hà Giang"), Decimal::from(100_000)),
            Decimal::from(50_000)
        );
    }

    #[test]
    fn discount_kicks_in_at_one_million() {
        let policy = VolumeDiscount;
        assert_eq!(policy.discount(Decimal::from(999_999)), Decimal::ZERO);
        assert_eq!(
            policy.discount(Decimal::from(1_000_000)),
            Decimal::from(50_000)
        );
    }
}
