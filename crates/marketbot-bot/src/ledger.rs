//! Inventory ledger.
//!
//! Tracks the last-known item count per account against a capacity
//! ceiling. A count only moves two ways: an external recount replaces it
//! (a failed fetch keeps the previous value), and a confirmed purchase
//! increments it locally so the next allocation decision does not wait a
//! full refresh cycle.

use dashmap::DashMap;
use marketbot_core::AccountId;
use std::time::Duration;

/// Capacity ceiling per account.
pub const MAX_INVENTORY_SIZE: u32 = 1_000;

/// Default recount cadence.
pub const DEFAULT_COUNT_INTERVAL: Duration = Duration::from_secs(2 * 60);

/// Recount cadence while an inventory is near capacity.
pub const FAST_COUNT_INTERVAL: Duration = Duration::from_secs(10);

/// Fill fraction above which recounting speeds up.
const NEAR_FULL_FRACTION: f64 = 0.95;

/// Cadence decision after a recount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CadenceAdjust {
    /// Keep the current interval.
    Keep,
    /// Inventory crossed above the near-full threshold: shorten.
    Shorten,
    /// Inventory dropped back below the threshold: revert to default.
    Reset,
}

/// Asymmetric hysteresis on the recount interval.
///
/// Shortens only when strictly above 95% of capacity while at the default
/// interval; resets only when strictly below 95% while shortened. A count
/// sitting exactly on the threshold changes nothing in either direction.
pub fn cadence_adjust(count: u32, capacity: u32, at_default_interval: bool) -> CadenceAdjust {
    let threshold = f64::from(capacity) * NEAR_FULL_FRACTION;
    if f64::from(count) > threshold && at_default_interval {
        CadenceAdjust::Shorten
    } else if !at_default_interval && f64::from(count) < threshold {
        CadenceAdjust::Reset
    } else {
        CadenceAdjust::Keep
    }
}

/// Whether a recount is worth announcing in the log: the first count for
/// an account, or a count that crossed a 100-item boundary.
pub fn announce_count(previous: Option<u32>, count: u32) -> bool {
    let Some(previous) = previous else {
        return true;
    };
    (100..MAX_INVENTORY_SIZE).step_by(100).any(|boundary| previous < boundary && count >= boundary)
}

/// Last-known inventory counts for all accounts in play.
#[derive(Debug)]
pub struct InventoryLedger {
    counts: DashMap<AccountId, u32>,
    capacity: u32,
}

impl InventoryLedger {
    pub fn new(capacity: u32) -> Self {
        Self {
            counts: DashMap::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Replace an account's count with a fresh recount.
    ///
    /// Returns the previous count, `None` on the first recount.
    pub fn record_count(&self, account: AccountId, count: u32) -> Option<u32> {
        self.counts.insert(account, count)
    }

    /// Local increment after a confirmed purchase (optimistic; the next
    /// recount corrects any drift).
    pub fn increment(&self, account: AccountId) {
        *self.counts.entry(account).or_insert(0) += 1;
    }

    /// Last-known count, if the account has ever been counted.
    pub fn count(&self, account: AccountId) -> Option<u32> {
        self.counts.get(&account).map(|c| *c)
    }

    /// Count used for allocation decisions: a never-counted account is
    /// treated as empty rather than blocked.
    pub fn count_or_zero(&self, account: AccountId) -> u32 {
        self.count(account).unwrap_or(0)
    }
}
