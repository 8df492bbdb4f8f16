//! Periodic purchase orchestration.
//!
//! The core is a library: `BuyService` owns every periodic task and is
//! driven by a thin host process (`main.rs`) that wires up the HTTP
//! collaborators, the config file path, and shutdown signals.

pub mod alloc;
pub mod config;
pub mod error;
pub mod ledger;
pub mod service;
pub mod store;

pub use config::Configuration;
pub use error::{ServiceError, ServiceResult};
pub use service::{ApiFactory, BuyService, InventoryFactory, ServiceState};
pub use store::ConfigStore;
