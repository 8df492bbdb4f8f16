//! External collaborators of the buy bot.
//!
//! Two opaque services, each behind a dyn-compatible trait so the
//! orchestrator can be driven by in-memory fakes in tests:
//! - `PurchaseApi`: the remote purchasing service (prices, average
//!   prices, buys, balance, keep-alive)
//! - `InventorySource`: per-account inventory snapshot counts

pub mod api;
pub mod client;
pub mod error;
pub mod inventory;

pub use api::{Balance, BoxFuture, InventorySource, PurchaseApi, PurchaseOutcome};
pub use client::MarketClient;
pub use error::{MarketError, MarketResult};
pub use inventory::CommunityInventoryClient;
