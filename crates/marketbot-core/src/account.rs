//! Trading identities.
//!
//! Accounts are identified by their 64-bit community id. Alternate accounts
//! additionally carry a trade token so purchases can be delivered to them.
//! The purchasing API addresses alternates by the short 32-bit id, which is
//! derived from the 64-bit id by a fixed offset.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Offset between the 32-bit and 64-bit account id universes.
pub const ACCOUNT_ID_BASE: i64 = 76_561_197_960_265_728;

/// 64-bit account identifier (primary or alternate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub i64);

/// 32-bit account identifier used by the purchasing API for delegated buys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShortAccountId(pub i32);

impl AccountId {
    #[inline]
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    #[inline]
    pub fn inner(&self) -> i64 {
        self.0
    }

    /// Derive the short 32-bit id.
    ///
    /// Fails when the id lies below the conversion base, meaning the
    /// declared long id cannot round-trip through the short form.
    pub fn short(&self) -> Result<ShortAccountId> {
        let delta = self.0 - ACCOUNT_ID_BASE;
        if !(0..=i64::from(i32::MAX)).contains(&delta) {
            return Err(CoreError::InvalidAccountId(format!(
                "{} is not a valid 64-bit account id",
                self.0
            )));
        }
        Ok(ShortAccountId(delta as i32))
    }
}

impl ShortAccountId {
    #[inline]
    pub fn inner(&self) -> i32 {
        self.0
    }

    /// Widen back to the 64-bit id.
    pub fn long(&self) -> AccountId {
        AccountId(i64::from(self.0) + ACCOUNT_ID_BASE)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ShortAccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Alternate account eligible to receive purchases for a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AltAccount {
    /// 64-bit account id.
    pub account_id: AccountId,
    /// Delegated trade token for `buy_for` calls.
    pub trade_token: String,
}

impl AltAccount {
    /// Short id for the purchasing API; valid by config validation.
    pub fn short_id(&self) -> Result<ShortAccountId> {
        self.account_id.short()
    }
}
