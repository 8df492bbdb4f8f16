//! Market offer types.
//!
//! A `PriceSnapshot` is one poll's view of the market: for each configured
//! item hash name, the currently available listings in the order the
//! market returned them. Listing order is meaningful (callers buy
//! first-fit) and must be preserved end to end.

use crate::price::Price;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identifier of one purchasable listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingId(pub u64);

impl ListingId {
    #[inline]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    #[inline]
    pub fn inner(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One purchasable instance of an item at a specific price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    /// Listing id, passed to the buy call.
    pub id: ListingId,
    /// Asking price.
    pub price: Price,
}

impl Listing {
    pub fn new(id: ListingId, price: Price) -> Self {
        Self { id, price }
    }
}

/// Last-known average price per item hash name.
pub type AveragePrices = HashMap<String, Price>;

/// Point-in-time mapping from item hash name to available listings.
#[derive(Debug, Clone, Default)]
pub struct PriceSnapshot {
    items: HashMap<String, Vec<Listing>>,
}

impl PriceSnapshot {
    pub fn new(items: HashMap<String, Vec<Listing>>) -> Self {
        Self { items }
    }

    /// Listings for an item, in market order. Missing items yield an
    /// empty slice, not an error; a tick simply has nothing to buy.
    pub fn listings(&self, hash_name: &str) -> &[Listing] {
        self.items.get(hash_name).map_or(&[], Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}
