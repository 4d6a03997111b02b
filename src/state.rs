use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    config::AppConfig,
    db::{DbPool, OrmConn},
    notifier::Notifier,
    policy::{DiscountPolicy, ShippingPolicy},
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
    pub notifier: Arc<dyn Notifier>,
    pub shipping: Arc<dyn ShippingPolicy>,
    pub discount: Arc<dyn DiscountPolicy>,
    /// Serializes order-code probing within this process. The unique index on
    /// orders.order_code stays authoritative across processes.
    pub order_code_lock: Arc<Mutex<()>>,
}
