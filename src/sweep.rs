//! Background sweepers: periodic, idempotent passes that retire expired carts
//! and cancel expired orders. Each owns a tokio task with a stop signal; the
//! underlying sweep can also be run once by hand.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::{
    error::AppResult,
    services::{cart_service, order_service},
    state::AppState,
};

pub const CART_SWEEP_PERIOD: Duration = Duration::from_secs(6 * 60 * 60);
pub const ORDER_SWEEP_PERIOD: Duration = Duration::from_secs(15 * 60);

pub struct Sweeper {
    name: &'static str,
    stop: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    pub fn start<F, Fut>(name: &'static str, period: Duration, sweep: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = AppResult<u64>> + Send,
    {
        let (stop, mut stopped) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of a tokio interval fires immediately; the sweep
            // should wait a full period before its first pass.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match sweep().await {
                            Ok(swept) => {
                                tracing::info!(sweeper = name, swept, "sweep finished");
                            }
                            Err(err) => {
                                tracing::error!(sweeper = name, error = %err, "sweep failed");
                            }
                        }
                    }
                    _ = stopped.changed() => return,
                }
            }
        });

        tracing::info!(sweeper = name, period_secs = period.as_secs(), "sweeper started");
        Self {
            name,
            stop,
            handle: Some(handle),
        }
    }

    pub async fn stop(mut self) {
        let _ = self.stop.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        tracing::info!(sweeper = self.name, "sweeper stopped");
    }
}

pub fn cart_sweeper(state: AppState) -> Sweeper {
    Sweeper::start("carts", CART_SWEEP_PERIOD, move || {
        let state = state.clone();
        async move { run_cart_sweep(&state).await }
    })
}

pub fn order_sweeper(state: AppState) -> Sweeper {
    Sweeper::start("orders", ORDER_SWEEP_PERIOD, move || {
        let state = state.clone();
        async move { run_order_sweep(&state).await }
    })
}

/// One pass of the cart sweep; also the manual trigger.
pub async fn run_cart_sweep(state: &AppState) -> AppResult<u64> {
    cart_service::sweep_expired(&state.orm).await
}

/// One pass of the order sweep; also the manual trigger.
pub async fn run_order_sweep(state: &AppState) -> AppResult<u64> {
    order_service::sweep_expired(state).await
}
