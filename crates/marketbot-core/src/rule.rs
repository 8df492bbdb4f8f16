//! Per-item purchase policy.

use crate::account::AltAccount;
use crate::price::Price;
use serde::{Deserialize, Serialize};

/// Buy strategy for one configured item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuyMode {
    /// Ignore the average price, buy whenever price <= max_price.
    #[default]
    IgnoreAveragePrice,
    /// Buy up to min(average price, max_price).
    ConsiderAveragePrice,
    /// Ignore max_price, buy whenever price <= average price.
    UseAveragePrice,
}

impl BuyMode {
    /// Whether this mode reads the average-price cache.
    pub fn needs_average_price(&self) -> bool {
        !matches!(self, BuyMode::IgnoreAveragePrice)
    }
}

/// One configured tradable item.
///
/// Mutated at runtime by the purchase task (quantity decrement,
/// deactivation on exhaustion) and by control entry points (activation
/// toggles, price edits); all mutations are persisted through the
/// configuration store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRule {
    /// Hash name of the item.
    pub hash_name: String,
    /// Maximum price to pay, depending on mode.
    #[serde(default)]
    pub max_price: Option<Price>,
    /// Buy strategy.
    #[serde(default)]
    pub mode: BuyMode,
    /// Whether this rule participates in purchase ticks.
    #[serde(default)]
    pub is_active: bool,
    /// Remaining quantity to buy; the rule is deactivated when it
    /// reaches zero. `None` means unbounded.
    #[serde(default)]
    pub max_quantity: Option<u32>,
    /// Alternate accounts eligible to receive purchases of this item,
    /// in preference order. Empty means the primary account is used.
    #[serde(default)]
    pub alt_accounts: Vec<AltAccount>,
}

impl ItemRule {
    /// Max price as set and positive, else `None`.
    pub fn positive_max_price(&self) -> Option<Price> {
        self.max_price.filter(Price::is_positive)
    }
}
