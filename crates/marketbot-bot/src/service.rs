//! Scheduler/orchestrator for the buy bot.
//!
//! Owns the lifecycle of all periodic tasks:
//! - purchase loop (config cadence)
//! - one inventory monitor per account (adaptive cadence)
//! - average-price refresh (config cadence, only when a rule needs it)
//! - balance refresh (fixed cadence)
//! - optional keep-alive ping
//!
//! `start`/`stop` drive a `Stopped → Starting → Running → Stopping`
//! state machine behind one async mutex, so lifecycle transitions are
//! serialized. Configuration changes restart the whole system through a
//! single-consumer channel; overlapping notifications coalesce.

use crate::alloc::{self, Target};
use crate::config::Configuration;
use crate::error::{ServiceError, ServiceResult};
use crate::ledger::{
    announce_count, cadence_adjust, CadenceAdjust, InventoryLedger, DEFAULT_COUNT_INTERVAL,
    FAST_COUNT_INTERVAL, MAX_INVENTORY_SIZE,
};
use crate::store::ConfigStore;
use anyhow::anyhow;
use futures_util::future::join_all;
use marketbot_core::decision::select_purchasable;
use marketbot_core::{AccountId, AveragePrices, BuyMode, Listing, Price};
use marketbot_market::{Balance, InventorySource, PurchaseApi};
use marketbot_sched::{IntervalHandle, PeriodicTask};
use marketbot_telemetry::metrics;
use parking_lot::RwLock;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

/// Balance refresh cadence.
pub const BALANCE_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Keep-alive ping cadence (the service expires sessions after ~3 min).
pub const PING_INTERVAL: Duration = Duration::from_secs(3 * 61);

/// Orchestrator lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
        }
    }
}

/// Builds the purchasing client for a loaded configuration (the API key
/// lives in the config, so a hot reload may produce a new client).
pub type ApiFactory =
    Box<dyn Fn(&Configuration) -> ServiceResult<Arc<dyn PurchaseApi>> + Send + Sync>;

/// Builds the inventory source for a loaded configuration.
pub type InventoryFactory =
    Box<dyn Fn(&Configuration) -> ServiceResult<Arc<dyn InventorySource>> + Send + Sync>;

/// State shared by all periodic task bodies of one run.
struct Shared {
    api: Arc<dyn PurchaseApi>,
    store: Arc<ConfigStore>,
    ledger: InventoryLedger,
    averages: RwLock<AveragePrices>,
    balance: RwLock<Option<Balance>>,
    primary: AccountId,
}

struct Core {
    state: ServiceState,
    tasks: Vec<PeriodicTask>,
}

/// The buy service.
pub struct BuyService {
    store: Arc<ConfigStore>,
    api_factory: ApiFactory,
    inventory_factory: InventoryFactory,
    core: Mutex<Core>,
}

impl BuyService {
    pub fn new(
        store: Arc<ConfigStore>,
        api_factory: ApiFactory,
        inventory_factory: InventoryFactory,
    ) -> Self {
        Self {
            store,
            api_factory,
            inventory_factory,
            core: Mutex::new(Core {
                state: ServiceState::Stopped,
                tasks: Vec::new(),
            }),
        }
    }

    /// Start the service.
    ///
    /// Fails without side effects unless the service is `Stopped`. A
    /// failure during startup (bad config, rejected key) leaves the
    /// service `Stopped`.
    pub async fn start(&self) -> ServiceResult<()> {
        let mut core = self.core.lock().await;
        if core.state != ServiceState::Stopped {
            return Err(ServiceError::NotStopped(core.state));
        }
        core.state = ServiceState::Starting;

        match self.start_locked().await {
            Ok(tasks) => {
                core.tasks = tasks;
                core.state = ServiceState::Running;
                info!("Service running");
                Ok(())
            }
            Err(e) => {
                core.state = ServiceState::Stopped;
                Err(e)
            }
        }
    }

    /// Stop the service, waiting for every in-flight tick to complete.
    ///
    /// The lock is released while the tasks drain, so `state` observes
    /// `Stopping`; a concurrent `start` or `stop` in that window fails
    /// with the state error.
    pub async fn stop(&self) -> ServiceResult<()> {
        let tasks = {
            let mut core = self.core.lock().await;
            if core.state != ServiceState::Running {
                return Err(ServiceError::NotRunning(core.state));
            }
            core.state = ServiceState::Stopping;
            std::mem::take(&mut core.tasks)
        };
        info!("Stopping service");

        join_all(tasks.into_iter().map(PeriodicTask::stop)).await;

        self.core.lock().await.state = ServiceState::Stopped;
        info!("Service stopped");
        Ok(())
    }

    pub async fn state(&self) -> ServiceState {
        self.core.lock().await.state
    }

    /// Names and current cadences of the running periodic tasks.
    pub async fn task_overview(&self) -> Vec<(&'static str, Duration)> {
        let core = self.core.lock().await;
        core.tasks
            .iter()
            .map(|t| (t.name(), t.interval().get()))
            .collect()
    }

    /// Serialize configuration-change notifications into full restarts.
    ///
    /// Single consumer of the store's change channel: a notification that
    /// arrives while a restart is in progress waits in the channel (at
    /// most one pending, the rest coalesce). Notifications while stopped
    /// are dropped, mirroring deregistration at `stop`.
    pub async fn run_reload_loop(&self, mut changes: mpsc::Receiver<()>) {
        while changes.recv().await.is_some() {
            if self.state().await != ServiceState::Running {
                debug!("Config changed while not running, ignoring");
                continue;
            }
            info!("Configuration changed, restarting service");
            metrics::RESTARTS_TOTAL.inc();
            if let Err(e) = self.stop().await {
                warn!(%e, "Stop during restart failed");
                continue;
            }
            if let Err(e) = self.start().await {
                error!(%e, "Restart failed, service remains stopped");
            }
        }
    }

    // Control entry points. These share the persistence path with
    // purchase-triggered mutations.

    pub fn set_rule_active(&self, hash_name: &str, active: bool) -> ServiceResult<()> {
        self.store.update_rule(hash_name, |rule| rule.is_active = active)
    }

    pub fn set_max_price(&self, hash_name: &str, price: Price) -> ServiceResult<()> {
        self.store
            .update_rule(hash_name, |rule| rule.max_price = Some(price))
    }

    pub fn set_rule_mode(&self, hash_name: &str, mode: BuyMode) -> ServiceResult<()> {
        self.store.update_rule(hash_name, |rule| rule.mode = mode)
    }

    /// Fallible startup prelude plus task spawning.
    ///
    /// Everything that can fail happens before the first spawn, so an
    /// error never leaves stray tasks behind.
    async fn start_locked(&self) -> ServiceResult<Vec<PeriodicTask>> {
        let config = self.store.load()?;
        info!("Starting service");

        let api = (self.api_factory)(&config)?;
        if !api.init().await? {
            return Err(ServiceError::Config(
                "Purchasing API rejected the key".to_string(),
            ));
        }
        let inventory = (self.inventory_factory)(&config)?;
        let primary = api.my_account().await?;
        debug!(%primary, "Resolved primary account");

        let shared = Arc::new(Shared {
            api,
            store: self.store.clone(),
            ledger: InventoryLedger::new(MAX_INVENTORY_SIZE),
            averages: RwLock::new(AveragePrices::new()),
            balance: RwLock::new(None),
            primary,
        });

        let mut tasks = Vec::new();

        // One monitor per account: primary first, then every distinct
        // alternate, counted once even when shared between rules.
        let mut accounts = vec![primary];
        for rule in &config.entries {
            for alt in &rule.alt_accounts {
                if !accounts.contains(&alt.account_id) {
                    accounts.push(alt.account_id);
                }
            }
        }
        for account in accounts {
            let interval = IntervalHandle::new(DEFAULT_COUNT_INTERVAL);
            let task = spawn_counted("inventory", interval.clone(), {
                let shared = shared.clone();
                let source = inventory.clone();
                move || recount_tick(shared.clone(), source.clone(), account, interval.clone())
            });
            // Initial count so the first allocations see real numbers.
            task.run_now().await;
            tasks.push(task);
        }

        if config.needs_average_prices() {
            info!("Prefilling average item prices");
            let interval = IntervalHandle::new(Duration::from_secs(
                config.average_price_interval_min * 60,
            ));
            let task = spawn_counted("average-price", interval, {
                let shared = shared.clone();
                move || average_tick(shared.clone())
            });
            task.run_now().await;
            tasks.push(task);
        }

        let balance_task = spawn_counted(
            "balance",
            IntervalHandle::new(BALANCE_REFRESH_INTERVAL),
            {
                let shared = shared.clone();
                move || balance_tick(shared.clone())
            },
        );
        // Prefill so purchases before the first refresh are not starved.
        balance_task.run_now().await;
        tasks.push(balance_task);

        tasks.push(spawn_counted(
            "purchase",
            IntervalHandle::new(Duration::from_millis(config.check_interval_ms)),
            {
                let shared = shared.clone();
                move || purchase_tick(shared.clone())
            },
        ));

        if config.enable_ping {
            info!("Activating selling/autopurchase keep-alive");
            tasks.push(spawn_counted("ping", IntervalHandle::new(PING_INTERVAL), {
                let shared = shared.clone();
                move || ping_tick(shared.clone())
            }));
        }

        Ok(tasks)
    }
}

/// Spawn a periodic task whose faults are counted per task name.
fn spawn_counted<F, Fut>(name: &'static str, interval: IntervalHandle, work: F) -> PeriodicTask
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    PeriodicTask::spawn(name, interval, move || {
        let fut = work();
        async move {
            let result = fut.await;
            if result.is_err() {
                metrics::TICK_FAULTS_TOTAL.with_label_values(&[name]).inc();
            }
            result
        }
    })
}

/// One inventory recount for one account, with adaptive cadence.
async fn recount_tick(
    shared: Arc<Shared>,
    source: Arc<dyn InventorySource>,
    account: AccountId,
    interval: IntervalHandle,
) -> anyhow::Result<()> {
    // A failed fetch is "unknown": the ledger keeps its last-known count.
    let count = source
        .count(account)
        .await
        .map_err(|e| anyhow!("inventory fetch for {account}: {e}"))?;

    let previous = shared.ledger.record_count(account, count);
    metrics::INVENTORY_COUNT
        .with_label_values(&[&account.to_string()])
        .set(f64::from(count));
    if announce_count(previous, count) {
        info!(%account, count, "Inventory count");
    }

    let at_default = interval.get() == DEFAULT_COUNT_INTERVAL;
    match cadence_adjust(count, shared.ledger.capacity(), at_default) {
        CadenceAdjust::Shorten => {
            warn!(%account, count, "Inventory is 95% filled, recounting every 10s");
            interval.set(FAST_COUNT_INTERVAL);
        }
        CadenceAdjust::Reset => {
            info!(%account, count, "Inventory dropped below 95%, default cadence restored");
            interval.set(DEFAULT_COUNT_INTERVAL);
        }
        CadenceAdjust::Keep => {}
    }
    Ok(())
}

/// Wholesale replacement of the average-price cache.
async fn average_tick(shared: Arc<Shared>) -> anyhow::Result<()> {
    let names = shared
        .store
        .config(|c| c.entries.iter().map(|r| r.hash_name.clone()).collect::<Vec<_>>())?;
    let prices = shared.api.average_prices(&names).await?;
    if prices.is_empty() {
        // Keep the previous map rather than blanking every average.
        return Ok(());
    }
    *shared.averages.write() = prices;
    Ok(())
}

/// Wholesale replacement of the balance.
async fn balance_tick(shared: Arc<Shared>) -> anyhow::Result<()> {
    let balance = shared.api.balance().await?;
    metrics::BALANCE.set(balance.amount.inner().to_f64().unwrap_or(0.0));
    if balance.amount.inner() < Decimal::ONE {
        warn!(amount = %balance.amount, currency = %balance.currency, "Balance is low");
    }
    *shared.balance.write() = Some(balance);
    Ok(())
}

async fn ping_tick(shared: Arc<Shared>) -> anyhow::Result<()> {
    shared.api.ping().await?;
    Ok(())
}

/// One purchase tick: poll prices for all active rules, then buy
/// first-fit per rule in configuration order.
async fn purchase_tick(shared: Arc<Shared>) -> anyhow::Result<()> {
    let active: Vec<String> = shared.store.config(|c| {
        c.entries
            .iter()
            .filter(|r| r.is_active)
            .map(|r| r.hash_name.clone())
            .collect()
    })?;
    if active.is_empty() {
        return Ok(());
    }

    let snapshot = shared.api.list_prices(&active).await?;
    for hash_name in &active {
        let listings = snapshot.listings(hash_name);
        if listings.is_empty() {
            continue;
        }
        buy_rule(&shared, hash_name, listings).await?;
    }
    Ok(())
}

/// Process one rule's batch of purchasable listings.
///
/// The rule is re-read from the store before every listing: a quantity
/// depletion (or a control-channel deactivation) mid-batch ends the
/// batch.
async fn buy_rule(shared: &Arc<Shared>, hash_name: &str, listings: &[Listing]) -> anyhow::Result<()> {
    let Some(rule) = shared.store.rule(hash_name) else {
        return Ok(());
    };
    if !rule.is_active {
        return Ok(());
    }

    let to_buy = {
        let averages = shared.averages.read();
        select_purchasable(&rule, listings, &averages)
    };
    let batch = to_buy.len();

    for (index, listing) in to_buy.iter().enumerate() {
        let Some(rule) = shared.store.rule(hash_name) else {
            break;
        };
        if !rule.is_active {
            break;
        }

        let remaining = batch - index;
        let target =
            match alloc::pick_target(shared.primary, &rule.alt_accounts, &shared.ledger, remaining)
            {
                Ok(target) => target,
                Err(e) => {
                    warn!(item = %hash_name, %e, "Skipping purchase batch");
                    metrics::PURCHASES_SKIPPED_TOTAL
                        .with_label_values(&["capacity"])
                        .inc();
                    break;
                }
            };

        let (funds, currency) = {
            let guard = shared.balance.read();
            match guard.as_ref() {
                Some(b) => (b.amount, b.currency.clone()),
                None => (Price::ZERO, String::new()),
            }
        };
        if listing.price > funds {
            warn!(item = %hash_name, price = %listing.price, balance = %funds,
                "Skipping purchase, balance not sufficient");
            metrics::PURCHASES_SKIPPED_TOTAL
                .with_label_values(&["balance"])
                .inc();
            continue;
        }

        let outcome = match target {
            Target::Primary(_) => shared.api.buy(listing.id, listing.price).await,
            Target::Alternate(alt) => {
                let short = alt.short_id()?;
                shared
                    .api
                    .buy_for(listing.id, listing.price, short, &alt.trade_token)
                    .await
            }
        };

        match outcome {
            Ok(result) if result.success => {
                shared.ledger.increment(target.account_id());
                metrics::PURCHASES_TOTAL
                    .with_label_values(&[hash_name, target.kind()])
                    .inc();
                match shared.store.record_purchase(hash_name)? {
                    Some(left) => {
                        info!(item = %hash_name, price = %result.price, %currency,
                            account = %target.account_id(), left, "Bought item")
                    }
                    None => {
                        info!(item = %hash_name, price = %result.price, %currency,
                            account = %target.account_id(), "Bought item")
                    }
                }
            }
            Ok(_) => {
                warn!(item = %hash_name, listing = %listing.id, "Purchase rejected by market");
                metrics::PURCHASES_SKIPPED_TOTAL
                    .with_label_values(&["rejected"])
                    .inc();
            }
            Err(e) => {
                warn!(item = %hash_name, listing = %listing.id, %e, "Buy call failed");
                metrics::PURCHASES_SKIPPED_TOTAL
                    .with_label_values(&["failed"])
                    .inc();
            }
        }
    }
    Ok(())
}
