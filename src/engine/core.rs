// 8.1 engine/core.rs: main engine. holds all assets, books, accounts, pools,
// the ledger, and the commit pipeline every operation funnels through.

use super::results::EngineError;
use crate::account::Account;
use crate::asset::{AssetConfig, AssetState};
use crate::config::EngineConfig;
use crate::events::{EventPayload, EventPublisher, NoopPublisher};
use crate::ledger::{EntryReason, Ledger, LedgerEntry};
use crate::oracle::OracleLog;
use crate::order::{LimitOrder, OrderBook, Trade};
use crate::pool::{LiquidityPool, LpShare, QueuedWithdrawal};
use crate::position::Position;
use crate::types::{AssetId, OrderId, PoolId, Price, Timestamp, Usdc, UserId};
use crate::vesting::UnlockSchedule;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, info};

/// Funds held against an open order. Buy orders hold USDC at the limit
/// price; sell orders hold long shares and, for any shorted remainder,
/// collateral at the limit price.
#[derive(Debug, Clone)]
pub(super) struct Reservation {
    pub usdc_remaining: Usdc,
    pub shares_remaining: Decimal,
    pub limit: Price,
}

/// Unit of work for one engine operation. Ledger entries and events are
/// buffered here and only land when the operation commits, so a failed
/// validation never leaves partial entries behind.
#[derive(Debug, Default)]
pub(super) struct Tx {
    entries: Vec<(UserId, Usdc, EntryReason, Option<u64>)>,
    events: Vec<EventPayload>,
}

impl Tx {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&mut self, user_id: UserId, delta: Usdc, reason: EntryReason, ref_id: Option<u64>) {
        self.entries.push((user_id, delta, reason, ref_id));
    }

    pub fn event(&mut self, payload: EventPayload) {
        self.events.push(payload);
    }
}

// 8.1.1: main engine struct. all state lives here.
pub struct Engine {
    pub(super) config: EngineConfig,
    pub(super) assets: HashMap<AssetId, AssetState>,
    pub(super) books: HashMap<AssetId, OrderBook>,
    pub(super) orders: HashMap<OrderId, LimitOrder>,
    pub(super) reservations: HashMap<OrderId, Reservation>,
    pub(super) accounts: HashMap<UserId, Account>,
    pub(super) positions: HashMap<(UserId, AssetId), Position>,
    pub(super) pools: HashMap<PoolId, LiquidityPool>,
    pub(super) pool_by_asset: HashMap<AssetId, PoolId>,
    pub(super) lp_shares: HashMap<(PoolId, UserId), LpShare>,
    pub(super) schedules: HashMap<(PoolId, UserId), UnlockSchedule>,
    pub(super) queue: Vec<QueuedWithdrawal>,
    pub(super) ledger: Ledger,
    pub(super) trades: Vec<Trade>,
    pub(super) oracle_logs: Vec<OracleLog>,
    pub(super) publisher: Box<dyn EventPublisher>,
    pub(super) next_order_id: u64,
    pub(super) next_trade_id: u64,
    pub(super) next_pool_id: u32,
    pub(super) next_queue_id: u64,
    pub(super) current_time: Timestamp,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config,
            assets: HashMap::new(),
            books: HashMap::new(),
            orders: HashMap::new(),
            reservations: HashMap::new(),
            accounts: HashMap::new(),
            positions: HashMap::new(),
            pools: HashMap::new(),
            pool_by_asset: HashMap::new(),
            lp_shares: HashMap::new(),
            schedules: HashMap::new(),
            queue: Vec::new(),
            ledger: Ledger::new(),
            trades: Vec::new(),
            oracle_logs: Vec::new(),
            publisher: Box::new(NoopPublisher),
            next_order_id: 1,
            next_trade_id: 1,
            next_pool_id: 1,
            next_queue_id: 1,
            current_time: Timestamp::from_millis(0),
        })
    }

    pub fn set_publisher(&mut self, publisher: Box<dyn EventPublisher>) {
        self.publisher = publisher;
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn advance_time(&mut self, millis: i64) {
        self.current_time = Timestamp::from_millis(self.current_time.as_millis() + millis);
    }

    pub fn advance_days(&mut self, days: u32) {
        self.current_time = self.current_time.plus_days(days);
    }

    /// Register an asset together with its dedicated liquidity pool and
    /// order book. The asset starts in Funding.
    pub fn create_asset(&mut self, config: AssetConfig) -> (AssetId, PoolId) {
        let asset_id = config.id;
        let pool_id = PoolId(self.next_pool_id);
        self.next_pool_id += 1;

        info!(asset = asset_id.0, pool = pool_id.0, symbol = %config.symbol, "asset created");

        self.assets
            .insert(asset_id, AssetState::new(config, self.current_time));
        self.books.insert(asset_id, OrderBook::new(asset_id));
        self.pools
            .insert(pool_id, LiquidityPool::new(pool_id, asset_id, self.current_time));
        self.pool_by_asset.insert(asset_id, pool_id);

        (asset_id, pool_id)
    }

    pub fn create_account(&mut self) -> UserId {
        let id = UserId(self.accounts.len() as u64 + 1);
        self.accounts.insert(id, Account::new(id, self.current_time));
        id
    }

    pub fn deposit(&mut self, user_id: UserId, amount: Usdc) -> Result<(), EngineError> {
        if amount.value() <= Decimal::ZERO {
            return Err(EngineError::Validation(format!(
                "deposit amount {amount} must be positive"
            )));
        }
        let account = self
            .accounts
            .get_mut(&user_id)
            .ok_or(EngineError::AccountNotFound(user_id))?;
        account.deposit(amount);

        let mut tx = Tx::new();
        tx.entry(user_id, amount, EntryReason::Deposit, None);
        self.commit(tx);
        Ok(())
    }

    /// Withdraw from the hot balance. Reserved funds are already outside the
    /// hot balance, so no extra check is needed here.
    pub fn withdraw(&mut self, user_id: UserId, amount: Usdc) -> Result<(), EngineError> {
        if amount.value() <= Decimal::ZERO {
            return Err(EngineError::Validation(format!(
                "withdrawal amount {amount} must be positive"
            )));
        }
        let account = self
            .accounts
            .get_mut(&user_id)
            .ok_or(EngineError::AccountNotFound(user_id))?;
        account.withdraw(amount)?;

        let mut tx = Tx::new();
        tx.entry(user_id, amount.negate(), EntryReason::Withdrawal, None);
        self.commit(tx);
        Ok(())
    }

    pub fn pause_asset(&mut self, asset_id: AssetId) -> Result<(), EngineError> {
        let asset = self
            .assets
            .get_mut(&asset_id)
            .ok_or(EngineError::AssetNotFound(asset_id))?;
        asset.pause()?;
        info!(asset = asset_id.0, "asset paused");
        Ok(())
    }

    pub fn resume_asset(&mut self, asset_id: AssetId) -> Result<(), EngineError> {
        let asset = self
            .assets
            .get_mut(&asset_id)
            .ok_or(EngineError::AssetNotFound(asset_id))?;
        asset.resume()?;
        info!(asset = asset_id.0, "asset resumed");
        Ok(())
    }

    // accessors

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn get_asset(&self, asset_id: AssetId) -> Option<&AssetState> {
        self.assets.get(&asset_id)
    }

    pub fn get_account(&self, user_id: UserId) -> Option<&Account> {
        self.accounts.get(&user_id)
    }

    pub fn get_order(&self, order_id: OrderId) -> Option<&LimitOrder> {
        self.orders.get(&order_id)
    }

    pub fn get_book(&self, asset_id: AssetId) -> Option<&OrderBook> {
        self.books.get(&asset_id)
    }

    pub fn get_position(&self, user_id: UserId, asset_id: AssetId) -> Option<&Position> {
        self.positions.get(&(user_id, asset_id))
    }

    pub fn get_pool(&self, pool_id: PoolId) -> Option<&LiquidityPool> {
        self.pools.get(&pool_id)
    }

    pub fn pool_for_asset(&self, asset_id: AssetId) -> Option<&LiquidityPool> {
        self.pool_by_asset
            .get(&asset_id)
            .and_then(|id| self.pools.get(id))
    }

    pub fn get_lp_share(&self, pool_id: PoolId, user_id: UserId) -> Option<&LpShare> {
        self.lp_shares.get(&(pool_id, user_id))
    }

    pub fn get_schedule(&self, pool_id: PoolId, user_id: UserId) -> Option<&UnlockSchedule> {
        self.schedules.get(&(pool_id, user_id))
    }

    pub fn withdrawal_queue(&self) -> &[QueuedWithdrawal] {
        &self.queue
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn ledger_entries(&self) -> &[LedgerEntry] {
        self.ledger.entries()
    }

    pub fn ledger_balance(&self, user_id: UserId) -> Usdc {
        self.ledger.balance_of(user_id)
    }

    pub fn oracle_logs(&self) -> &[OracleLog] {
        &self.oracle_logs
    }

    /// Commit point. Ledger entries land first, then events go out to the
    /// publisher fire-and-forget. Committed state never depends on the
    /// publisher succeeding.
    pub(super) fn commit(&mut self, tx: Tx) {
        debug!(
            entries = tx.entries.len(),
            events = tx.events.len(),
            "committing transaction"
        );
        for (user_id, delta, reason, ref_id) in tx.entries {
            self.ledger
                .append(user_id, delta, reason, ref_id, self.current_time);
        }
        for event in tx.events {
            self.publisher.publish(event.topic(), &event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn engine() -> Engine {
        Engine::new(EngineConfig::default()).unwrap()
    }

    #[test]
    fn deposit_updates_balance_and_ledger() {
        let mut e = engine();
        let user = e.create_account();
        e.deposit(user, Usdc::new(dec!(1000))).unwrap();

        assert_eq!(e.get_account(user).unwrap().hot_balance.value(), dec!(1000));
        assert_eq!(e.ledger_balance(user).value(), dec!(1000));
    }

    #[test]
    fn withdraw_rejects_overdraft() {
        let mut e = engine();
        let user = e.create_account();
        e.deposit(user, Usdc::new(dec!(100))).unwrap();

        assert!(e.withdraw(user, Usdc::new(dec!(200))).is_err());
        // failed operation leaves no ledger trace
        assert_eq!(e.ledger_entries().len(), 1);
    }

    #[test]
    fn unknown_account_rejected() {
        let mut e = engine();
        assert!(matches!(
            e.deposit(UserId(99), Usdc::new(dec!(1))),
            Err(EngineError::AccountNotFound(_))
        ));
    }

    #[test]
    fn create_asset_registers_pool_and_book() {
        let mut e = engine();
        let config = crate::asset::AssetConfig {
            id: AssetId(1),
            name: "Synthetic Example".to_string(),
            symbol: "sEX".to_string(),
            soft_cap: dec!(5000),
            hard_cap: dec!(100000),
            curve: crate::pricing::CurveParams { p0: dec!(10), k: dec!(0) },
            funding_deadline: None,
        };
        let (asset_id, pool_id) = e.create_asset(config);

        assert!(e.get_asset(asset_id).is_some());
        assert!(e.get_book(asset_id).is_some());
        assert_eq!(e.pool_for_asset(asset_id).unwrap().pool_id, pool_id);
    }
}
