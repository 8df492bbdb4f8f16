//! In-memory collaborators and fixtures for integration tests.
#![allow(dead_code)]

use marketbot_bot::{BuyService, Configuration, ConfigStore};
use marketbot_core::{
    AccountId, AveragePrices, BuyMode, ItemRule, Listing, ListingId, Price, PriceSnapshot,
    ShortAccountId, ACCOUNT_ID_BASE,
};
use marketbot_market::{
    Balance, BoxFuture, InventorySource, MarketError, MarketResult, PurchaseApi, PurchaseOutcome,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const ITEM: &str = "Chroma 3 Case";

pub fn account(offset: i64) -> AccountId {
    AccountId::new(ACCOUNT_ID_BASE + offset)
}

pub fn price(s: &str) -> Price {
    Price::new(Decimal::from_str(s).unwrap())
}

pub fn listing(id: u64, p: &str) -> Listing {
    Listing::new(ListingId::new(id), price(p))
}

/// One recorded buy call.
#[derive(Debug, Clone)]
pub struct RecordedBuy {
    pub listing: ListingId,
    pub price: Price,
    pub partner: Option<ShortAccountId>,
}

/// In-memory purchasing service.
pub struct FakeMarket {
    pub account: AccountId,
    pub init_ok: AtomicBool,
    pub buy_succeeds: AtomicBool,
    pub listings: Mutex<HashMap<String, Vec<Listing>>>,
    pub averages: Mutex<AveragePrices>,
    pub balance: Mutex<Balance>,
    pub buys: Mutex<Vec<RecordedBuy>>,
    pub list_delay: Mutex<Duration>,
    list_calls: AtomicU32,
    concurrent_lists: AtomicU32,
    max_concurrent_lists: AtomicU32,
}

impl FakeMarket {
    pub fn new(account: AccountId) -> Arc<Self> {
        Arc::new(Self {
            account,
            init_ok: AtomicBool::new(true),
            buy_succeeds: AtomicBool::new(true),
            listings: Mutex::new(HashMap::new()),
            averages: Mutex::new(AveragePrices::new()),
            balance: Mutex::new(Balance {
                amount: price("1000"),
                currency: "USD".to_string(),
            }),
            buys: Mutex::new(Vec::new()),
            list_delay: Mutex::new(Duration::ZERO),
            list_calls: AtomicU32::new(0),
            concurrent_lists: AtomicU32::new(0),
            max_concurrent_lists: AtomicU32::new(0),
        })
    }

    pub fn set_listings(&self, item: &str, listings: Vec<Listing>) {
        self.listings.lock().insert(item.to_string(), listings);
    }

    pub fn set_balance(&self, amount: &str) {
        self.balance.lock().amount = price(amount);
    }

    pub fn recorded_buys(&self) -> Vec<RecordedBuy> {
        self.buys.lock().clone()
    }

    pub fn list_calls(&self) -> u32 {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn max_concurrent_list_calls(&self) -> u32 {
        self.max_concurrent_lists.load(Ordering::SeqCst)
    }

    fn record(&self, listing: ListingId, price: Price, partner: Option<ShortAccountId>) {
        self.buys.lock().push(RecordedBuy {
            listing,
            price,
            partner,
        });
    }

    fn outcome(&self, price: Price) -> PurchaseOutcome {
        PurchaseOutcome {
            success: self.buy_succeeds.load(Ordering::SeqCst),
            price,
        }
    }
}

impl PurchaseApi for FakeMarket {
    fn init(&self) -> BoxFuture<'_, MarketResult<bool>> {
        Box::pin(async move { Ok(self.init_ok.load(Ordering::SeqCst)) })
    }

    fn my_account(&self) -> BoxFuture<'_, MarketResult<AccountId>> {
        Box::pin(async move { Ok(self.account) })
    }

    fn list_prices<'a>(
        &'a self,
        hash_names: &'a [String],
    ) -> BoxFuture<'a, MarketResult<PriceSnapshot>> {
        Box::pin(async move {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            let concurrent = self.concurrent_lists.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_concurrent_lists
                .fetch_max(concurrent, Ordering::SeqCst);

            let delay = *self.list_delay.lock();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            self.concurrent_lists.fetch_sub(1, Ordering::SeqCst);

            let all = self.listings.lock();
            let items = hash_names
                .iter()
                .filter_map(|name| all.get(name).map(|l| (name.clone(), l.clone())))
                .collect();
            Ok(PriceSnapshot::new(items))
        })
    }

    fn average_prices<'a>(
        &'a self,
        _hash_names: &'a [String],
    ) -> BoxFuture<'a, MarketResult<AveragePrices>> {
        Box::pin(async move { Ok(self.averages.lock().clone()) })
    }

    fn buy(
        &self,
        listing: ListingId,
        price: Price,
    ) -> BoxFuture<'_, MarketResult<PurchaseOutcome>> {
        Box::pin(async move {
            self.record(listing, price, None);
            Ok(self.outcome(price))
        })
    }

    fn buy_for<'a>(
        &'a self,
        listing: ListingId,
        price: Price,
        account: ShortAccountId,
        _trade_token: &'a str,
    ) -> BoxFuture<'a, MarketResult<PurchaseOutcome>> {
        Box::pin(async move {
            self.record(listing, price, Some(account));
            Ok(self.outcome(price))
        })
    }

    fn balance(&self) -> BoxFuture<'_, MarketResult<Balance>> {
        Box::pin(async move { Ok(self.balance.lock().clone()) })
    }

    fn ping(&self) -> BoxFuture<'_, MarketResult<()>> {
        Box::pin(async move { Ok(()) })
    }
}

struct CountFeed {
    values: Vec<u32>,
    index: usize,
    failing: bool,
}

/// In-memory inventory source fed with recount sequences.
///
/// Each fetch consumes the next value; the last value repeats once the
/// feed is exhausted. Unknown accounts count as empty.
pub struct FakeInventory {
    feeds: Mutex<HashMap<i64, CountFeed>>,
}

impl FakeInventory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            feeds: Mutex::new(HashMap::new()),
        })
    }

    pub fn feed(&self, account: AccountId, values: &[u32]) {
        self.feeds.lock().insert(
            account.inner(),
            CountFeed {
                values: values.to_vec(),
                index: 0,
                failing: false,
            },
        );
    }

    pub fn fail(&self, account: AccountId) {
        if let Some(feed) = self.feeds.lock().get_mut(&account.inner()) {
            feed.failing = true;
        }
    }
}

impl InventorySource for FakeInventory {
    fn count(&self, account: AccountId) -> BoxFuture<'_, MarketResult<u32>> {
        Box::pin(async move {
            let mut feeds = self.feeds.lock();
            match feeds.get_mut(&account.inner()) {
                Some(feed) if feed.failing => {
                    Err(MarketError::InventoryUnavailable(account.inner()))
                }
                Some(feed) => {
                    let value = feed.values[feed.index.min(feed.values.len() - 1)];
                    feed.index += 1;
                    Ok(value)
                }
                None => Ok(0),
            }
        })
    }
}

/// Base configuration: one active rule buying `ITEM` up to 0.02.
pub fn base_config() -> Configuration {
    let mut config = Configuration::dummy();
    config.key = "test-key".to_string();
    config.check_interval_ms = 50;
    config.entries = vec![ItemRule {
        hash_name: ITEM.to_string(),
        max_price: Some(price("0.02")),
        mode: BuyMode::IgnoreAveragePrice,
        is_active: true,
        max_quantity: None,
        alt_accounts: Vec::new(),
    }];
    config
}

pub fn temp_config(name: &str, config: &Configuration) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "marketbot-it-{}-{name}.toml",
        std::process::id()
    ));
    std::fs::write(&path, toml::to_string_pretty(config).unwrap()).unwrap();
    path
}

/// Current cadence of the named task, if it is running.
pub async fn overview_interval(service: &BuyService, name: &str) -> Option<Duration> {
    service
        .task_overview()
        .await
        .into_iter()
        .find(|(n, _)| *n == name)
        .map(|(_, interval)| interval)
}

pub fn make_service(
    store: Arc<ConfigStore>,
    market: Arc<FakeMarket>,
    inventory: Arc<FakeInventory>,
) -> Arc<BuyService> {
    Arc::new(BuyService::new(
        store,
        Box::new(move |_| {
            let api: Arc<dyn PurchaseApi> = market.clone();
            Ok(api)
        }),
        Box::new(move |_| {
            let source: Arc<dyn InventorySource> = inventory.clone();
            Ok(source)
        }),
    ))
}
