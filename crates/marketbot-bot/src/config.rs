//! Bot configuration.
//!
//! The configuration file is TOML. Only `key` and `entries` are
//! mandatory; cadences and endpoint URLs carry defaults. Validation is
//! fatal to `start`: a bot with a bad key or no rules must not launch.

use crate::error::{ServiceError, ServiceResult};
use marketbot_core::{BuyMode, ItemRule, Price};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Bot configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Purchasing API key.
    pub key: String,
    /// Purchase poll interval in milliseconds.
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,
    /// Average-price refresh interval in minutes.
    #[serde(default = "default_average_price_interval_min")]
    pub average_price_interval_min: u64,
    /// Whether to run the keep-alive ping task.
    #[serde(default)]
    pub enable_ping: bool,
    /// Purchasing API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Inventory source base URL.
    #[serde(default = "default_inventory_url")]
    pub inventory_url: String,
    /// Per-item purchase rules, processed in this order.
    #[serde(default)]
    pub entries: Vec<ItemRule>,
}

fn default_check_interval_ms() -> u64 {
    2_000
}

fn default_average_price_interval_min() -> u64 {
    5
}

fn default_api_url() -> String {
    "https://market.csgo.com".to_string()
}

fn default_inventory_url() -> String {
    "https://steamcommunity.com".to_string()
}

impl Configuration {
    /// Validate the loaded configuration.
    ///
    /// Rules: non-empty key, positive poll interval, at least one rule,
    /// and every alternate account id must derive a valid short id.
    pub fn validate(&self) -> ServiceResult<()> {
        if self.key.trim().is_empty() {
            return Err(ServiceError::Config("API key is not set".to_string()));
        }
        if self.check_interval_ms == 0 {
            return Err(ServiceError::Config(
                "check_interval_ms must be positive".to_string(),
            ));
        }
        if self.entries.is_empty() {
            return Err(ServiceError::Config(
                "At least one item rule is required".to_string(),
            ));
        }
        for rule in &self.entries {
            if rule.hash_name.trim().is_empty() {
                return Err(ServiceError::Config("Rule with empty hash name".to_string()));
            }
            for alt in &rule.alt_accounts {
                alt.short_id().map_err(|e| {
                    ServiceError::Config(format!(
                        "Rule '{}': alternate account {}: {e}",
                        rule.hash_name, alt.account_id
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Whether any rule consults the average-price cache.
    pub fn needs_average_prices(&self) -> bool {
        self.entries.iter().any(|r| r.mode.needs_average_price())
    }

    /// Placeholder configuration written when no file exists yet.
    pub fn dummy() -> Self {
        Self {
            key: "YourApiKeyHere".to_string(),
            check_interval_ms: 500,
            average_price_interval_min: default_average_price_interval_min(),
            enable_ping: false,
            api_url: default_api_url(),
            inventory_url: default_inventory_url(),
            entries: vec![ItemRule {
                hash_name: "Chroma 3 Case".to_string(),
                max_price: Some(Price::new(dec!(0.015))),
                mode: BuyMode::ConsiderAveragePrice,
                is_active: false,
                max_quantity: None,
                alt_accounts: Vec::new(),
            }],
        }
    }
}
