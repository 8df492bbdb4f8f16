//! HTTP client for the purchasing service's v2 REST API.
//!
//! All endpoints are GET with the API key as a query parameter. Responses
//! share a `success` flag; `success: false` carries an error message in
//! the body. Prices travel as decimal strings and are parsed exactly.

use crate::api::{Balance, BoxFuture, PurchaseApi, PurchaseOutcome};
use crate::error::{MarketError, MarketResult};
use marketbot_core::{AccountId, AveragePrices, Listing, ListingId, Price, PriceSnapshot,
    ShortAccountId};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Response envelope: every v2 endpoint carries `success`.
#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Raw listing entry from `search-list-items-by-hash-name-all`.
#[derive(Debug, Deserialize)]
struct RawListing {
    id: u64,
    price: Decimal,
}

#[derive(Debug, Deserialize)]
struct ListPricesResponse {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    data: HashMap<String, Vec<RawListing>>,
}

/// Raw item info entry from `get-list-items-info`.
#[derive(Debug, Deserialize)]
struct RawItemInfo {
    #[serde(default)]
    average: Decimal,
}

#[derive(Debug, Deserialize)]
struct ItemsInfoResponse {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    data: HashMap<String, RawItemInfo>,
}

#[derive(Debug, Deserialize)]
struct BuyResponse {
    success: bool,
    #[serde(default)]
    price: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    money: Decimal,
    #[serde(default)]
    currency: String,
}

#[derive(Debug, Deserialize)]
struct MyAccountResponse {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    steamid64: i64,
}

fn snapshot_from_data(data: HashMap<String, Vec<RawListing>>) -> PriceSnapshot {
    let items = data
        .into_iter()
        .map(|(name, raw)| {
            let listings = raw
                .into_iter()
                .map(|l| Listing::new(ListingId::new(l.id), Price::new(l.price)))
                .collect();
            (name, listings)
        })
        .collect();
    PriceSnapshot::new(items)
}

fn averages_from_data(data: HashMap<String, RawItemInfo>) -> AveragePrices {
    data.into_iter()
        .map(|(name, info)| (name, Price::new(info.average)))
        .collect()
}

fn rejection(error: Option<String>) -> MarketError {
    MarketError::Api(error.unwrap_or_else(|| "request not successful".to_string()))
}

/// Client for the purchasing service.
pub struct MarketClient {
    /// HTTP client.
    client: Client,
    /// API base URL (e.g., "https://market.example.com").
    base_url: String,
    /// API key, sent with every request.
    api_key: String,
}

impl MarketClient {
    /// Create a new client.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> MarketResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| MarketError::Http(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    /// GET an endpoint with the API key plus extra query pairs, parsing
    /// the JSON body into `T`.
    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> MarketResult<T> {
        let url = format!("{}/api/v2/{endpoint}", self.base_url);
        debug!(%endpoint, "Market API request");

        let response = self
            .client
            .get(&url)
            .query(&[("key", self.api_key.as_str())])
            .query(query)
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

        response
            .json::<T>()
            .await
            .map_err(|e| MarketError::Parse(e.to_string()))
    }

    fn hash_name_query(hash_names: &[String]) -> Vec<(&'static str, String)> {
        hash_names
            .iter()
            .map(|name| ("list_hash_name[]", name.clone()))
            .collect()
    }
}

impl PurchaseApi for MarketClient {
    fn init(&self) -> BoxFuture<'_, MarketResult<bool>> {
        Box::pin(async move {
            let resp: Envelope = self.get("test", &[]).await?;
            Ok(resp.success)
        })
    }

    fn my_account(&self) -> BoxFuture<'_, MarketResult<AccountId>> {
        Box::pin(async move {
            let resp: MyAccountResponse = self.get("get-my-steam-id", &[]).await?;
            if !resp.success {
                return Err(rejection(resp.error));
            }
            Ok(AccountId::new(resp.steamid64))
        })
    }

    fn list_prices<'a>(
        &'a self,
        hash_names: &'a [String],
    ) -> BoxFuture<'a, MarketResult<PriceSnapshot>> {
        Box::pin(async move {
            let query = Self::hash_name_query(hash_names);
            let resp: ListPricesResponse = self
                .get("search-list-items-by-hash-name-all", &query)
                .await?;
            if !resp.success {
                return Err(rejection(resp.error));
            }
            Ok(snapshot_from_data(resp.data))
        })
    }

    fn average_prices<'a>(
        &'a self,
        hash_names: &'a [String],
    ) -> BoxFuture<'a, MarketResult<AveragePrices>> {
        Box::pin(async move {
            let query = Self::hash_name_query(hash_names);
            let resp: ItemsInfoResponse = self.get("get-list-items-info", &query).await?;
            if !resp.success {
                return Err(rejection(resp.error));
            }
            Ok(averages_from_data(resp.data))
        })
    }

    fn buy(&self, listing: ListingId, price: Price) -> BoxFuture<'_, MarketResult<PurchaseOutcome>> {
        Box::pin(async move {
            let query = [
                ("id", listing.to_string()),
                ("price", price.to_string()),
            ];
            let resp: BuyResponse = self.get("buy", &query).await?;
            Ok(PurchaseOutcome {
                success: resp.success,
                price: resp.price.map(Price::new).unwrap_or(price),
            })
        })
    }

    fn buy_for<'a>(
        &'a self,
        listing: ListingId,
        price: Price,
        account: ShortAccountId,
        trade_token: &'a str,
    ) -> BoxFuture<'a, MarketResult<PurchaseOutcome>> {
        Box::pin(async move {
            let query = [
                ("id", listing.to_string()),
                ("price", price.to_string()),
                ("partner", account.to_string()),
                ("token", trade_token.to_string()),
            ];
            let resp: BuyResponse = self.get("buy-for", &query).await?;
            Ok(PurchaseOutcome {
                success: resp.success,
                price: resp.price.map(Price::new).unwrap_or(price),
            })
        })
    }

    fn balance(&self) -> BoxFuture<'_, MarketResult<Balance>> {
        Box::pin(async move {
            let resp: BalanceResponse = self.get("get-money", &[]).await?;
            if !resp.success {
                return Err(rejection(resp.error));
            }
            Ok(Balance {
                amount: Price::new(resp.money),
                currency: resp.currency,
            })
        })
    }

    fn ping(&self) -> BoxFuture<'_, MarketResult<()>> {
        Box::pin(async move {
            let resp: Envelope = self.get("ping", &[]).await?;
            if !resp.success {
                return Err(rejection(resp.error));
            }
            Ok(())
        })
    }
}
