//! Community inventory snapshot source.
//!
//! Counts the items in an account's public inventory by fetching the
//! community profile JSON and counting the `rgInventory` entries. Any
//! transport or shape problem is surfaced as an error so the caller can
//! keep its last-known count ("unknown", never zero).

use crate::api::{BoxFuture, InventorySource};
use crate::error::{MarketError, MarketResult};
use marketbot_core::AccountId;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Game whose inventory is being monitored.
const GAME_ID: u32 = 730;

/// Inventory context (the tradable item context for `GAME_ID`).
const CONTEXT_ID: u32 = 2;

/// Default timeout for inventory requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches inventory counts from the community profile endpoint.
pub struct CommunityInventoryClient {
    /// HTTP client.
    client: Client,
    /// Community base URL (e.g., "https://steamcommunity.com").
    base_url: String,
}

impl CommunityInventoryClient {
    /// Create a new inventory client.
    pub fn new(base_url: impl Into<String>) -> MarketResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| MarketError::Http(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn fetch_count(&self, account: AccountId) -> MarketResult<u32> {
        let url = format!(
            "{}/profiles/{}/inventory/json/{GAME_ID}/{CONTEXT_ID}",
            self.base_url, account
        );
        debug!(%account, "Fetching inventory snapshot");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| MarketError::Http(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MarketError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| MarketError::Parse(e.to_string()))?;

        count_from_profile(&body).ok_or(MarketError::InventoryUnavailable(account.inner()))
    }
}

/// Extract the item count from the profile inventory JSON.
///
/// `None` when the payload has no `rgInventory` object; an object that is
/// present but empty is a genuine count of zero (an emptied inventory).
fn count_from_profile(body: &serde_json::Value) -> Option<u32> {
    body.get("rgInventory")?.as_object().map(|m| m.len() as u32)
}

impl InventorySource for CommunityInventoryClient {
    fn count(&self, account: AccountId) -> BoxFuture<'_, MarketResult<u32>> {
        Box::pin(self.fetch_count(account))
    }
}
