//! User accounts and hot balances.
//!
//! The hot balance is the spendable USDC a user holds inside the exchange.
//! Order reservations and pool contributions move funds out of it; trade
//! proceeds, refunds, and withdrawals move funds back in. Every mutation is
//! paired with a ledger entry by the engine.

use crate::types::{Timestamp, Usdc, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: UserId,
    pub hot_balance: Usdc,
    pub total_deposited: Usdc,
    pub total_withdrawn: Usdc,
    pub created_at: Timestamp,
}

impl Account {
    pub fn new(id: UserId, timestamp: Timestamp) -> Self {
        Self {
            id,
            hot_balance: Usdc::zero(),
            total_deposited: Usdc::zero(),
            total_withdrawn: Usdc::zero(),
            created_at: timestamp,
        }
    }

    pub fn deposit(&mut self, amount: Usdc) {
        self.hot_balance = self.hot_balance.add(amount);
        self.total_deposited = self.total_deposited.add(amount);
    }

    pub fn withdraw(&mut self, amount: Usdc) -> Result<(), AccountError> {
        self.debit(amount)?;
        self.total_withdrawn = self.total_withdrawn.add(amount);
        Ok(())
    }

    /// Remove funds from the hot balance (reservation, contribution).
    pub fn debit(&mut self, amount: Usdc) -> Result<(), AccountError> {
        if amount.value() > self.hot_balance.value() {
            return Err(AccountError::InsufficientBalance {
                requested: amount,
                available: self.hot_balance,
            });
        }
        self.hot_balance = self.hot_balance.sub(amount);
        Ok(())
    }

    /// Return funds to the hot balance (proceeds, refund, release).
    pub fn credit(&mut self, amount: Usdc) {
        self.hot_balance = self.hot_balance.add(amount);
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AccountError {
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Usdc, available: Usdc },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn deposit_and_withdraw() {
        let mut account = Account::new(UserId(1), Timestamp::from_millis(0));
        account.deposit(Usdc::new(dec!(1000)));
        assert_eq!(account.hot_balance.value(), dec!(1000));

        account.withdraw(Usdc::new(dec!(300))).unwrap();
        assert_eq!(account.hot_balance.value(), dec!(700));
        assert_eq!(account.total_withdrawn.value(), dec!(300));
    }

    #[test]
    fn overdraft_rejected() {
        let mut account = Account::new(UserId(1), Timestamp::from_millis(0));
        account.deposit(Usdc::new(dec!(100)));

        let result = account.debit(Usdc::new(dec!(101)));
        assert!(matches!(
            result,
            Err(AccountError::InsufficientBalance { .. })
        ));
        // no partial effect
        assert_eq!(account.hot_balance.value(), dec!(100));
    }

    #[test]
    fn debit_credit_round_trip() {
        let mut account = Account::new(UserId(1), Timestamp::from_millis(0));
        account.deposit(Usdc::new(dec!(500)));

        account.debit(Usdc::new(dec!(200))).unwrap();
        account.credit(Usdc::new(dec!(200)));
        assert_eq!(account.hot_balance.value(), dec!(500));
    }
}
