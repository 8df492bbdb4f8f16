//! Core domain types for the market buy bot.
//!
//! This crate provides the fundamental types used throughout the system:
//! - `Price`: precision-safe money type
//! - `AccountId` / `AltAccount`: trading identities (primary + alternates)
//! - `Listing`, `PriceSnapshot`: point-in-time market offers
//! - `ItemRule`, `BuyMode`: per-item purchase policy
//! - `decision::select_purchasable`: the pure buy decision engine

pub mod account;
pub mod decision;
pub mod error;
pub mod price;
pub mod rule;
pub mod types;

pub use account::{AccountId, AltAccount, ShortAccountId, ACCOUNT_ID_BASE};
pub use error::{CoreError, Result};
pub use price::Price;
pub use rule::{BuyMode, ItemRule};
pub use types::{AveragePrices, Listing, ListingId, PriceSnapshot};
