// 8.0.2: result types and errors for engine operations.

use crate::account::AccountError;
use crate::asset::AssetError;
use crate::config::ConfigError;
use crate::order::Fill;
use crate::pool::PoolError;
use crate::types::{AssetId, OrderId, PoolId, Price, Usdc, UserId};
use crate::vesting::VestingError;
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub struct OrderResult {
    pub order_id: OrderId,
    pub filled_quantity: Decimal,
    pub remaining_quantity: Decimal,
    pub average_price: Option<Price>,
    /// True when a remainder was posted to the book.
    pub is_posted: bool,
    pub fills: Vec<Fill>,
    /// Unspent buy-side reservation returned on price improvement.
    pub refund: Usdc,
}

#[derive(Debug, Clone)]
pub struct ContributionResult {
    pub pool_id: PoolId,
    pub lp_shares_minted: Decimal,
    pub pool_total_usdc: Usdc,
    /// Set when this contribution crossed the soft cap.
    pub activated_asset: Option<AssetId>,
}

#[derive(Debug, Clone)]
pub struct WithdrawalResult {
    pub pool_id: PoolId,
    pub amount_paid: Usdc,
    pub lp_shares_burned: Decimal,
    /// Queue row id when the request was deferred instead of paid.
    pub queued_id: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct QueueProcessResult {
    pub pool_id: PoolId,
    pub rows_processed: usize,
    pub total_paid: Usdc,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("Asset {0:?} not found")]
    AssetNotFound(AssetId),

    #[error("Asset {0:?} is not open for trading")]
    AssetNotTradable(AssetId),

    #[error("Account {0:?} not found")]
    AccountNotFound(UserId),

    #[error("Order {0:?} not found")]
    OrderNotFound(OrderId),

    #[error("Pool {0:?} not found")]
    PoolNotFound(PoolId),

    #[error("Withdrawal queue row {0} not found")]
    QueueRowNotFound(u64),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("State conflict: {0}")]
    StateConflict(String),

    #[error("Insufficient funds: requested {requested:?}, available {available:?}")]
    InsufficientFunds { requested: Usdc, available: Usdc },

    #[error("Insufficient share balance: requested {requested}, available {available}")]
    InsufficientShares {
        requested: Decimal,
        available: Decimal,
    },

    #[error("Account error: {0}")]
    Account(#[from] AccountError),

    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Vesting error: {0}")]
    Vesting(#[from] VestingError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}
