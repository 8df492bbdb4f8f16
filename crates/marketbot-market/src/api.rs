//! Collaborator traits.
//!
//! Dyn-compatible async traits via the boxed-future pattern, allowing
//! dependency injection for testing and keeping signing/transport
//! concerns out of the orchestrator.

use crate::error::MarketResult;
use marketbot_core::{AccountId, AveragePrices, ListingId, Price, PriceSnapshot, ShortAccountId};
use std::pin::Pin;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Spendable balance on the purchasing service.
#[derive(Debug, Clone, PartialEq)]
pub struct Balance {
    /// Amount in the service's wallet currency.
    pub amount: Price,
    /// Currency code (e.g., "USD").
    pub currency: String,
}

/// Result of a single buy call.
///
/// `success: false` is a remote rejection, not a transport error; the
/// caller logs it and mutates no local state.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseOutcome {
    /// Whether the purchase was executed.
    pub success: bool,
    /// Price actually paid (the service may fill below the offer).
    pub price: Price,
}

/// The remote purchasing service.
pub trait PurchaseApi: Send + Sync {
    /// Validate the session (API key). Must be called before any other
    /// operation; `false` means the key was not accepted.
    fn init(&self) -> BoxFuture<'_, MarketResult<bool>>;

    /// Resolve the primary account id bound to the API key.
    fn my_account(&self) -> BoxFuture<'_, MarketResult<AccountId>>;

    /// Current listings for the given item hash names.
    fn list_prices<'a>(&'a self, hash_names: &'a [String])
        -> BoxFuture<'a, MarketResult<PriceSnapshot>>;

    /// Historical average price per item hash name.
    fn average_prices<'a>(
        &'a self,
        hash_names: &'a [String],
    ) -> BoxFuture<'a, MarketResult<AveragePrices>>;

    /// Buy a listing for the primary account.
    fn buy(&self, listing: ListingId, price: Price) -> BoxFuture<'_, MarketResult<PurchaseOutcome>>;

    /// Buy a listing delivered to an alternate account.
    fn buy_for<'a>(
        &'a self,
        listing: ListingId,
        price: Price,
        account: ShortAccountId,
        trade_token: &'a str,
    ) -> BoxFuture<'a, MarketResult<PurchaseOutcome>>;

    /// Current spendable balance.
    fn balance(&self) -> BoxFuture<'_, MarketResult<Balance>>;

    /// Keep-alive ping so the service keeps selling/autopurchase active.
    fn ping(&self) -> BoxFuture<'_, MarketResult<()>>;
}

/// Per-account inventory snapshot source.
pub trait InventorySource: Send + Sync {
    /// Current item count for an account.
    ///
    /// A fetch failure is an error ("unknown"), never a zero count; the
    /// ledger keeps its last-known value in that case.
    fn count(&self, account: AccountId) -> BoxFuture<'_, MarketResult<u32>>;
}
