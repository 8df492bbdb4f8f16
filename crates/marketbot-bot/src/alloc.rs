//! Allocation manager.
//!
//! Picks the account that absorbs one purchase. Rules without alternates
//! always target the primary account; rules with alternates scan them in
//! configured order and never fall back to the primary. A rejection is
//! rule-global: the caller stops the remaining batch for this tick.

use crate::ledger::InventoryLedger;
use marketbot_core::{AccountId, AltAccount};
use thiserror::Error;

/// Destination account for one purchase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Target<'a> {
    Primary(AccountId),
    Alternate(&'a AltAccount),
}

impl Target<'_> {
    pub fn account_id(&self) -> AccountId {
        match self {
            Target::Primary(id) => *id,
            Target::Alternate(alt) => alt.account_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Target::Primary(_) => "primary",
            Target::Alternate(_) => "alternate",
        }
    }
}

/// Why no account can absorb the purchase.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AllocationError {
    #[error("Primary account {account} has no space ({count} of {capacity})")]
    PrimaryFull {
        account: AccountId,
        count: u32,
        capacity: u32,
    },

    #[error("No alternate account with space for {remaining} more item(s)")]
    AlternatesFull { remaining: usize },
}

/// Pick the destination for the next purchase of a rule's batch.
///
/// `remaining` is the number of listings still being bought in this
/// tick (the current one included); an alternate qualifies only if the
/// whole remainder fits under the ceiling.
pub fn pick_target<'a>(
    primary: AccountId,
    alternates: &'a [AltAccount],
    ledger: &InventoryLedger,
    remaining: usize,
) -> Result<Target<'a>, AllocationError> {
    if alternates.is_empty() {
        let count = ledger.count_or_zero(primary);
        if count >= ledger.capacity() {
            return Err(AllocationError::PrimaryFull {
                account: primary,
                count,
                capacity: ledger.capacity(),
            });
        }
        return Ok(Target::Primary(primary));
    }

    alternates
        .iter()
        .find(|alt| {
            let count = u64::from(ledger.count_or_zero(alt.account_id));
            count + (remaining as u64) < u64::from(ledger.capacity())
        })
        .map(Target::Alternate)
        .ok_or(AllocationError::AlternatesFull { remaining })
}
