//! Append-only double-sided ledger.
//!
//! Every balance movement in the engine lands here as an immutable entry.
//! Hot balances on `Account` are a cache; `balance_of` reconstructs the same
//! number from entries alone, and the accounting tests hold the two equal.

use crate::types::{Timestamp, Usdc, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryReason {
    Deposit,
    Withdrawal,
    OrderReserve,
    OrderRelease,
    TradeDebit,
    TradeCredit,
    TradeFee,
    CollateralLock,
    CollateralRelease,
    PoolContribution,
    PoolWithdrawal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub seq: u64,
    pub user_id: UserId,
    /// Signed movement; positive credits the user, negative debits.
    pub delta: Usdc,
    pub reason: EntryReason,
    /// Order, trade, pool, or queue row this movement belongs to.
    pub ref_id: Option<u64>,
    pub created_at: Timestamp,
}

/// In-memory append-only store. Entries are never updated or removed.
#[derive(Debug, Default)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(
        &mut self,
        user_id: UserId,
        delta: Usdc,
        reason: EntryReason,
        ref_id: Option<u64>,
        created_at: Timestamp,
    ) -> u64 {
        let seq = self.entries.len() as u64;
        self.entries.push(LedgerEntry {
            seq,
            user_id,
            delta,
            reason,
            ref_id,
            created_at,
        });
        seq
    }

    /// Replay all entries for a user. This is the source of truth the hot
    /// balance must agree with.
    pub fn balance_of(&self, user_id: UserId) -> Usdc {
        self.entries
            .iter()
            .filter(|e| e.user_id == user_id)
            .map(|e| e.delta)
            .sum()
    }

    pub fn entries_for(&self, user_id: UserId) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.iter().filter(move |e| e.user_id == user_id)
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
