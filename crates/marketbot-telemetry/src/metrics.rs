//! Prometheus metrics for the market buy bot.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration
//! fails it indicates a fatal configuration error (e.g., duplicate metric
//! names) that should crash at startup rather than fail silently. These
//! panics only occur during static initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_gauge_vec, Counter,
    CounterVec, Gauge, GaugeVec,
};

/// Total confirmed purchases.
/// Labels: item, account_kind (primary/alternate)
pub static PURCHASES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "marketbot_purchases_total",
        "Total confirmed purchases",
        &["item", "account_kind"]
    )
    .unwrap()
});

/// Purchases skipped before execution or rejected by the market.
/// Labels: reason (capacity/balance/rejected/failed)
pub static PURCHASES_SKIPPED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "marketbot_purchases_skipped_total",
        "Purchases skipped or rejected before completion",
        &["reason"]
    )
    .unwrap()
});

/// Periodic ticks whose work faulted.
/// Labels: task
pub static TICK_FAULTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "marketbot_tick_faults_total",
        "Periodic tick work failures",
        &["task"]
    )
    .unwrap()
});

/// Hot restarts triggered by configuration changes.
pub static RESTARTS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "marketbot_restarts_total",
        "Hot restarts triggered by configuration changes"
    )
    .unwrap()
});

/// Last refreshed balance.
pub static BALANCE: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("marketbot_balance", "Last refreshed spendable balance").unwrap()
});

/// Last known inventory count per account.
/// Labels: account
pub static INVENTORY_COUNT: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "marketbot_inventory_count",
        "Last known inventory count per account",
        &["account"]
    )
    .unwrap()
});
