//! Buy decision engine.
//!
//! Pure selection of purchasable listings for one rule against one price
//! snapshot. No side effects; listing order from the snapshot is
//! preserved so callers can buy first-fit. Strategy dispatch is an
//! exhaustive match over `BuyMode`.

use crate::price::Price;
use crate::rule::{BuyMode, ItemRule};
use crate::types::{AveragePrices, Listing};
use tracing::warn;

/// Select the listings purchasable under `rule` from `listings`.
///
/// Misconfigured rules (no usable price cap, missing or zero average)
/// produce a warning and an empty selection rather than an error; the
/// purchase tick moves on to the next rule.
pub fn select_purchasable(
    rule: &ItemRule,
    listings: &[Listing],
    averages: &AveragePrices,
) -> Vec<Listing> {
    match rule.mode {
        BuyMode::IgnoreAveragePrice => {
            let Some(cap) = rule.positive_max_price() else {
                warn!(item = %rule.hash_name, "Max price not set, nothing to buy");
                return Vec::new();
            };
            priced_within(listings, cap)
        }
        BuyMode::UseAveragePrice => {
            let Some(average) = positive_average(rule, averages) else {
                return Vec::new();
            };
            priced_within(listings, average)
        }
        BuyMode::ConsiderAveragePrice => {
            let Some(max_price) = rule.positive_max_price() else {
                warn!(item = %rule.hash_name, "Max price not set, nothing to buy");
                return Vec::new();
            };
            let Some(average) = positive_average(rule, averages) else {
                return Vec::new();
            };
            priced_within(listings, average.min(max_price))
        }
    }
}

/// Listings priced at or below `cap`, in snapshot order.
fn priced_within(listings: &[Listing], cap: Price) -> Vec<Listing> {
    listings.iter().filter(|l| l.price <= cap).copied().collect()
}

fn positive_average(rule: &ItemRule, averages: &AveragePrices) -> Option<Price> {
    match averages.get(&rule.hash_name) {
        Some(average) if average.is_positive() => Some(*average),
        _ => {
            warn!(item = %rule.hash_name, "Average price not available");
            None
        }
    }
}
