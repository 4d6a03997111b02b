pub mod cart_items;
pub mod carts;
pub mod categories;
pub mod login_attempts;
pub mod order_items;
pub mod orders;
pub mod payments;
pub mod product_sizes;
pub mod products;
pub mod recovery_codes;
pub mod reviews;
pub mod users;
