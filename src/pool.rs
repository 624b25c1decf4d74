//! Liquidity pool share accounting and the withdrawal queue.
//!
//! LP shares are minted and burned at net asset value. Trading fees accrue
//! into `total_usdc` without minting, which is how every holder's NAV rises.

use crate::types::{AssetId, PoolId, Timestamp, Usdc, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityPool {
    pub pool_id: PoolId,
    pub asset_id: AssetId,
    pub total_usdc: Usdc,
    pub total_lp_shares: Decimal,
    pub created_at: Timestamp,
}

impl LiquidityPool {
    pub fn new(pool_id: PoolId, asset_id: AssetId, created_at: Timestamp) -> Self {
        Self {
            pool_id,
            asset_id,
            total_usdc: Usdc(Decimal::ZERO),
            total_lp_shares: Decimal::ZERO,
            created_at,
        }
    }

    /// Shares a contribution of `amount` buys at current NAV. The first
    /// contribution into an empty pool mints 1:1. Multiply before dividing
    /// so a 1:1 NAV stays exact under Decimal rounding.
    pub fn shares_for_contribution(&self, amount: Usdc) -> Decimal {
        if self.total_lp_shares.is_zero() || self.total_usdc.value().is_zero() {
            amount.value()
        } else {
            amount.value() * self.total_lp_shares / self.total_usdc.value()
        }
    }

    /// USDC value of `shares` at current NAV.
    pub fn usdc_for_shares(&self, shares: Decimal) -> Usdc {
        if self.total_lp_shares.is_zero() {
            Usdc(Decimal::ZERO)
        } else {
            Usdc(shares * self.total_usdc.value() / self.total_lp_shares)
        }
    }

    pub fn mint(&mut self, amount: Usdc) -> Decimal {
        let shares = self.shares_for_contribution(amount);
        self.total_usdc = self.total_usdc.add(amount);
        self.total_lp_shares += shares;
        shares
    }

    /// Burn `shares` and release their NAV. Fails if the pool cannot cover
    /// the payout.
    pub fn burn(&mut self, shares: Decimal) -> Result<Usdc, PoolError> {
        if shares > self.total_lp_shares {
            return Err(PoolError::InsufficientShares {
                pool_id: self.pool_id,
                requested: shares,
                available: self.total_lp_shares,
            });
        }
        let payout = self.usdc_for_shares(shares);
        if payout > self.total_usdc {
            return Err(PoolError::InsufficientLiquidity {
                pool_id: self.pool_id,
                requested: payout,
                available: self.total_usdc,
            });
        }
        self.total_usdc = self.total_usdc.sub(payout);
        self.total_lp_shares -= shares;
        Ok(payout)
    }

    /// Burn `shares` against a fixed `amount` payout, for principal-based
    /// redemptions where the payout is specified up front rather than
    /// derived from NAV.
    pub fn burn_for_amount(&mut self, shares: Decimal, amount: Usdc) -> Result<(), PoolError> {
        if shares > self.total_lp_shares {
            return Err(PoolError::InsufficientShares {
                pool_id: self.pool_id,
                requested: shares,
                available: self.total_lp_shares,
            });
        }
        if amount > self.total_usdc {
            return Err(PoolError::InsufficientLiquidity {
                pool_id: self.pool_id,
                requested: amount,
                available: self.total_usdc,
            });
        }
        self.total_usdc = self.total_usdc.sub(amount);
        self.total_lp_shares -= shares;
        Ok(())
    }

    /// Fees raise pool value without minting shares.
    pub fn accrue_fee(&mut self, fee: Usdc) {
        self.total_usdc = self.total_usdc.add(fee);
    }
}

/// One LP position per (pool, user).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LpShare {
    pub pool_id: PoolId,
    pub user_id: UserId,
    pub lp_shares: Decimal,
    /// Lifetime contributed principal, the base the vesting schedule applies
    /// to. Not reduced by withdrawals.
    pub contributed_usdc: Usdc,
    /// Principal already taken out through instant withdrawals.
    pub withdrawn_principal: Usdc,
}

impl LpShare {
    pub fn new(pool_id: PoolId, user_id: UserId) -> Self {
        Self {
            pool_id,
            user_id,
            lp_shares: Decimal::ZERO,
            contributed_usdc: Usdc(Decimal::ZERO),
            withdrawn_principal: Usdc(Decimal::ZERO),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WithdrawalStatus {
    Pending,
    Processed,
    Cancelled,
}

/// A deferred withdrawal waiting for pool liquidity. Rows are processed in
/// FIFO order and each transitions out of `Pending` at most once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedWithdrawal {
    pub id: u64,
    pub pool_id: PoolId,
    pub user_id: UserId,
    pub amount_usdc: Usdc,
    pub status: WithdrawalStatus,
    pub created_at: Timestamp,
    pub processed_at: Option<Timestamp>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum PoolError {
    #[error("Pool {pool_id:?}: burn of {requested} shares exceeds {available} outstanding")]
    InsufficientShares {
        pool_id: PoolId,
        requested: Decimal,
        available: Decimal,
    },
    #[error("Pool {pool_id:?}: payout {requested:?} exceeds liquidity {available:?}")]
    InsufficientLiquidity {
        pool_id: PoolId,
        requested: Usdc,
        available: Usdc,
    },
}
