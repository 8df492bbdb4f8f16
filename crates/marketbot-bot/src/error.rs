//! Service error types.

use crate::service::ServiceState;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Service is not stopped (state: {0})")]
    NotStopped(ServiceState),

    #[error("Service is not running (state: {0})")]
    NotRunning(ServiceState),

    #[error("No rule for item '{0}'")]
    RuleNotFound(String),

    #[error("Market error: {0}")]
    Market(#[from] marketbot_market::MarketError),

    #[error("Core error: {0}")]
    Core(#[from] marketbot_core::CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
