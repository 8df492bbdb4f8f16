//! Configuration store.
//!
//! Owns the live `Configuration` and its TOML file. All runtime rule
//! mutations (quantity decrement on purchase, control-channel toggles and
//! price edits) go through this store so they share one persistence path.
//! Change notifications from the host (e.g., a file watcher) arrive
//! through `notify_changed` on a bounded channel; overlapping
//! notifications coalesce while a restart is in progress.

use crate::config::Configuration;
use crate::error::{ServiceError, ServiceResult};
use marketbot_core::ItemRule;
use parking_lot::{Mutex, RwLock};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub struct ConfigStore {
    path: PathBuf,
    current: RwLock<Option<Configuration>>,
    changes_tx: mpsc::Sender<()>,
    changes_rx: Mutex<Option<mpsc::Receiver<()>>>,
    saves: AtomicU64,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (changes_tx, changes_rx) = mpsc::channel(1);
        Self {
            path: path.into(),
            current: RwLock::new(None),
            changes_tx,
            changes_rx: Mutex::new(Some(changes_rx)),
            saves: AtomicU64::new(0),
        }
    }

    /// Load, validate, and install the configuration from disk.
    ///
    /// A missing file gets a placeholder written in its place and fails
    /// validation (the placeholder key is not a real key, and the
    /// operator must edit it anyway).
    pub fn load(&self) -> ServiceResult<Configuration> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "Config file not found, creating placeholder");
            self.write_file(&Configuration::dummy())?;
            return Err(ServiceError::Config(format!(
                "Created placeholder config at {}; fill in the API key and rules",
                self.path.display()
            )));
        }

        let content = std::fs::read_to_string(&self.path)?;
        let config: Configuration = toml::from_str(&content)
            .map_err(|e| ServiceError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;

        *self.current.write() = Some(config.clone());
        Ok(config)
    }

    /// Read the live configuration.
    pub fn config<R>(&self, f: impl FnOnce(&Configuration) -> R) -> ServiceResult<R> {
        let guard = self.current.read();
        let config = guard
            .as_ref()
            .ok_or_else(|| ServiceError::Config("Configuration not loaded".to_string()))?;
        Ok(f(config))
    }

    /// Current state of one rule.
    pub fn rule(&self, hash_name: &str) -> Option<ItemRule> {
        self.current
            .read()
            .as_ref()?
            .entries
            .iter()
            .find(|r| r.hash_name == hash_name)
            .cloned()
    }

    /// Mutate one rule and persist the change.
    pub fn update_rule(
        &self,
        hash_name: &str,
        f: impl FnOnce(&mut ItemRule),
    ) -> ServiceResult<()> {
        let snapshot = {
            let mut guard = self.current.write();
            let config = guard
                .as_mut()
                .ok_or_else(|| ServiceError::Config("Configuration not loaded".to_string()))?;
            let rule = config
                .entries
                .iter_mut()
                .find(|r| r.hash_name == hash_name)
                .ok_or_else(|| ServiceError::RuleNotFound(hash_name.to_string()))?;
            f(rule);
            config.clone()
        };
        self.persist(&snapshot);
        Ok(())
    }

    /// Record one confirmed purchase against a rule.
    ///
    /// Decrements a finite remaining quantity, deactivates the rule at
    /// zero, and persists before returning so later listings in the same
    /// batch observe the updated state. Returns the remaining quantity
    /// for finite rules.
    pub fn record_purchase(&self, hash_name: &str) -> ServiceResult<Option<u32>> {
        let (remaining, snapshot) = {
            let mut guard = self.current.write();
            let config = guard
                .as_mut()
                .ok_or_else(|| ServiceError::Config("Configuration not loaded".to_string()))?;
            let rule = config
                .entries
                .iter_mut()
                .find(|r| r.hash_name == hash_name)
                .ok_or_else(|| ServiceError::RuleNotFound(hash_name.to_string()))?;

            let Some(quantity) = rule.max_quantity.filter(|q| *q > 0) else {
                return Ok(None);
            };
            let remaining = quantity - 1;
            rule.max_quantity = Some(remaining);
            if remaining == 0 {
                rule.is_active = false;
                info!(item = %hash_name, "Quantity exhausted, rule deactivated");
            }
            (remaining, config.clone())
        };
        self.persist(&snapshot);
        Ok(Some(remaining))
    }

    /// Best-effort synchronous persistence.
    ///
    /// A failed save keeps the in-memory state (the purchase happened);
    /// the drift from disk until the next successful save is a known
    /// limitation.
    fn persist(&self, config: &Configuration) {
        match self.write_file(config) {
            Ok(()) => {
                self.saves.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) => {
                error!(path = %self.path.display(), %e, "Failed to persist config");
            }
        }
    }

    fn write_file(&self, config: &Configuration) -> ServiceResult<()> {
        let serialized = toml::to_string_pretty(config)
            .map_err(|e| ServiceError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&self.path, serialized)?;
        Ok(())
    }

    /// Host entry point: signal that the on-disk configuration changed.
    pub fn notify_changed(&self) {
        if self.changes_tx.try_send(()).is_err() {
            // A restart is already pending; this notification coalesces.
            warn!("Config change notification already pending");
        }
    }

    /// Take the change-notification receiver (single consumer).
    pub fn take_changes(&self) -> Option<mpsc::Receiver<()>> {
        self.changes_rx.lock().take()
    }

    /// Successful saves so far (exposed for monitoring and tests).
    pub fn saves(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketbot_core::{BuyMode, Price};
    use rust_decimal_macros::dec;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("marketbot-store-{}-{name}.toml", std::process::id()))
    }

    fn store_with(name: &str, config: &Configuration) -> ConfigStore {
        let path = temp_path(name);
        std::fs::write(&path, toml::to_string_pretty(config).unwrap()).unwrap();
        ConfigStore::new(path)
    }

    fn one_rule_config(max_quantity: Option<u32>) -> Configuration {
        let mut config = Configuration::dummy();
        config.key = "secret".to_string();
        config.entries[0].is_active = true;
        config.entries[0].max_quantity = max_quantity;
        config
    }

    #[test]
    fn test_missing_file_creates_placeholder_and_fails() {
        let path = temp_path("placeholder");
        let _ = std::fs::remove_file(&path);
        let store = ConfigStore::new(path.clone());
        assert!(matches!(store.load(), Err(ServiceError::Config(_))));
        assert!(path.exists());
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_record_purchase_depletes_and_deactivates() {
        let store = store_with("deplete", &one_rule_config(Some(1)));
        store.load().unwrap();

        let remaining = store.record_purchase("Chroma 3 Case").unwrap();
        assert_eq!(remaining, Some(0));
        assert_eq!(store.saves(), 1);

        let rule = store.rule("Chroma 3 Case").unwrap();
        assert!(!rule.is_active);

        // Depleted state reached disk.
        let reloaded = ConfigStore::new(store.path.clone());
        let config = reloaded.load().unwrap();
        assert!(!config.entries[0].is_active);
        std::fs::remove_file(&store.path).unwrap();
    }

    #[test]
    fn test_failed_save_keeps_in_memory_purchase() {
        let store = store_with("savefail", &one_rule_config(Some(1)));
        store.load().unwrap();

        // Turn the config path into a directory so the next save fails.
        std::fs::remove_file(&store.path).unwrap();
        std::fs::create_dir(&store.path).unwrap();

        let remaining = store.record_purchase("Chroma 3 Case").unwrap();
        assert_eq!(remaining, Some(0));
        assert_eq!(store.saves(), 0);

        // The purchase happened; in-memory state reflects it despite the
        // failed save.
        let rule = store.rule("Chroma 3 Case").unwrap();
        assert!(!rule.is_active);
        assert_eq!(rule.max_quantity, Some(0));

        std::fs::remove_dir(&store.path).unwrap();
    }

    #[test]
    fn test_record_purchase_unbounded_skips_save() {
        let store = store_with("unbounded", &one_rule_config(None));
        store.load().unwrap();
        assert_eq!(store.record_purchase("Chroma 3 Case").unwrap(), None);
        assert_eq!(store.saves(), 0);
        std::fs::remove_file(&store.path).unwrap();
    }

    #[test]
    fn test_update_rule_persists_control_edits() {
        let store = store_with("control", &one_rule_config(None));
        store.load().unwrap();

        store
            .update_rule("Chroma 3 Case", |r| {
                r.max_price = Some(Price::new(dec!(0.02)));
                r.mode = BuyMode::IgnoreAveragePrice;
            })
            .unwrap();
        assert_eq!(store.saves(), 1);
        assert!(matches!(
            store.update_rule("No Such Item", |_| {}),
            Err(ServiceError::RuleNotFound(_))
        ));
        std::fs::remove_file(&store.path).unwrap();
    }

    #[test]
    fn test_change_notifications_coalesce() {
        let store = ConfigStore::new(temp_path("notify"));
        let mut rx = store.take_changes().unwrap();
        assert!(store.take_changes().is_none());

        store.notify_changed();
        store.notify_changed(); // coalesces into the pending one
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
