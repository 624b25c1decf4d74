// 8.2 engine/orders.rs: order submission, matching, settlement, cancellation.
//
// Funds flow: a buy reserves quantity * limit up front; every fill releases
// that fill's share of the hold and debits the actual cost, so price
// improvement comes back automatically. A sell locks long shares first and
// holds collateral at the limit price for any shorted remainder. The fee
// comes out of the seller's proceeds and accrues to the asset's pool.

use super::core::{Engine, Reservation, Tx};
use super::results::{EngineError, OrderResult};
use crate::events::EventPayload;
use crate::ledger::EntryReason;
use crate::order::{match_order, Fill, LimitOrder, OrderStatus, Trade};
use crate::position::{apply_buy, apply_sell, Position};
use crate::types::{AssetId, OrderId, Price, Side, TradeId, Usdc, UserId};
use rust_decimal::Decimal;
use tracing::debug;

impl Engine {
    fn next_order_id(&mut self) -> OrderId {
        let id = OrderId(self.next_order_id);
        self.next_order_id += 1;
        id
    }

    /// Long shares of this user already committed to other open sell orders
    /// on this asset.
    fn reserved_sell_shares(&self, user_id: UserId, asset_id: AssetId) -> Decimal {
        self.reservations
            .iter()
            .filter_map(|(order_id, res)| {
                let order = self.orders.get(order_id)?;
                (order.user_id == user_id
                    && order.asset_id == asset_id
                    && order.side == Side::Sell
                    && order.is_open())
                .then_some(res.shares_remaining)
            })
            .sum()
    }

    /// Submit a limit order. Matches immediately against the book; any
    /// remainder above dust rests.
    pub fn submit_order(
        &mut self,
        user_id: UserId,
        asset_id: AssetId,
        side: Side,
        quantity: Decimal,
        limit_price: Price,
    ) -> Result<OrderResult, EngineError> {
        let dust = self.config.dust;
        if quantity <= dust {
            return Err(EngineError::Validation(format!(
                "order quantity {quantity} must exceed dust tolerance"
            )));
        }

        let asset = self
            .assets
            .get(&asset_id)
            .ok_or(EngineError::AssetNotFound(asset_id))?;
        if !asset.is_tradable() {
            return Err(EngineError::AssetNotTradable(asset_id));
        }
        if !self.accounts.contains_key(&user_id) {
            return Err(EngineError::AccountNotFound(user_id));
        }

        // size the reservation without touching anything yet
        let (usdc_hold, share_lock) = match side {
            Side::Buy => (Usdc::new(quantity * limit_price.value()), Decimal::ZERO),
            Side::Sell => {
                let long = self
                    .positions
                    .get(&(user_id, asset_id))
                    .map(|p| p.shares.value().max(Decimal::ZERO))
                    .unwrap_or(Decimal::ZERO);
                let free_long = (long - self.reserved_sell_shares(user_id, asset_id))
                    .max(Decimal::ZERO);
                let share_lock = quantity.min(free_long);
                let short_part = quantity - share_lock;
                (Usdc::new(short_part * limit_price.value()), share_lock)
            }
        };
        let account = self
            .accounts
            .get(&user_id)
            .ok_or(EngineError::AccountNotFound(user_id))?;
        if usdc_hold > account.hot_balance {
            return Err(EngineError::InsufficientFunds {
                requested: usdc_hold,
                available: account.hot_balance,
            });
        }

        let order_id = self.next_order_id();
        let order = LimitOrder::new(
            order_id,
            asset_id,
            user_id,
            side,
            limit_price,
            quantity,
            self.current_time,
        );

        // plan the sweep on a scratch book so a settlement the seller cannot
        // fund rejects the whole order while nothing has changed
        let book = self
            .books
            .get(&asset_id)
            .ok_or(EngineError::AssetNotFound(asset_id))?;
        let planned = {
            let mut scratch_book = book.clone();
            let mut scratch_order = order.clone();
            match_order(&mut scratch_book, &mut scratch_order, dust)
        };
        if side == Side::Sell {
            self.check_sell_settlement(
                &planned.fills,
                user_id,
                asset_id,
                usdc_hold,
                share_lock,
                limit_price,
            )?;
        }

        // all checks passed; apply
        let mut tx = Tx::new();
        let account = self
            .accounts
            .get_mut(&user_id)
            .ok_or(EngineError::AccountNotFound(user_id))?;
        if !usdc_hold.is_zero() {
            account.debit(usdc_hold)?;
            tx.entry(user_id, usdc_hold.negate(), EntryReason::OrderReserve, Some(order_id.0));
        }
        self.reservations.insert(
            order_id,
            Reservation {
                usdc_remaining: usdc_hold,
                shares_remaining: share_lock,
                limit: limit_price,
            },
        );

        let mut order = order;
        let book = self
            .books
            .get_mut(&asset_id)
            .ok_or(EngineError::AssetNotFound(asset_id))?;
        let match_result = match_order(book, &mut order, dust);

        debug!(
            order = order_id.0,
            fills = match_result.fills.len(),
            remaining = %match_result.remaining_quantity,
            "order matched"
        );

        let mut total_filled = Decimal::ZERO;
        let mut total_cost = Decimal::ZERO;
        let mut taker_refund = Usdc::zero();

        for fill in &match_result.fills {
            total_filled += fill.quantity;
            total_cost += fill.quantity * fill.price.value();
            if side == Side::Buy {
                let improvement = (limit_price.value() - fill.price.value()) * fill.quantity;
                taker_refund = taker_refund.add(Usdc::new(improvement));
            }
            self.settle_fill(asset_id, fill, dust, &mut tx)?;
        }

        // remainder handling
        self.orders.insert(order_id, order.clone());
        if order.is_open() {
            if let Some(book) = self.books.get_mut(&asset_id) {
                book.insert(order.clone());
            }
        } else {
            self.release_reservation(order_id, &mut tx);
        }

        if total_filled > Decimal::ZERO {
            self.refresh_display_price(asset_id, &mut tx)?;
        }
        tx.event(EventPayload::OrderBookChanged {
            asset_id,
            order_id,
            timestamp: self.current_time,
        });
        self.commit(tx);

        let average_price = if total_filled > Decimal::ZERO {
            Some(Price::new_unchecked(total_cost / total_filled))
        } else {
            None
        };

        Ok(OrderResult {
            order_id,
            filled_quantity: total_filled,
            remaining_quantity: order.remaining_quantity,
            average_price,
            is_posted: order.is_open(),
            fills: match_result.fills,
            refund: taker_refund,
        })
    }

    /// Cancel an open order, releasing whatever the reservation still holds.
    /// Allowed while the asset is paused.
    pub fn cancel_order(&mut self, user_id: UserId, order_id: OrderId) -> Result<(), EngineError> {
        let order = self
            .orders
            .get(&order_id)
            .ok_or(EngineError::OrderNotFound(order_id))?;
        if order.user_id != user_id {
            return Err(EngineError::Validation(format!(
                "order {} does not belong to user {}",
                order_id.0, user_id.0
            )));
        }
        if !order.is_open() {
            return Err(EngineError::StateConflict(format!(
                "order {} is already {:?}",
                order_id.0, order.status
            )));
        }
        let asset_id = order.asset_id;

        let mut tx = Tx::new();
        if let Some(book) = self.books.get_mut(&asset_id) {
            book.remove(order_id);
        }
        self.release_reservation(order_id, &mut tx);
        if let Some(order) = self.orders.get_mut(&order_id) {
            order.status = OrderStatus::Cancelled;
        }

        tx.event(EventPayload::OrderBookChanged {
            asset_id,
            order_id,
            timestamp: self.current_time,
        });
        self.commit(tx);
        Ok(())
    }

    /// Return any USDC still held against an order and drop the reservation.
    fn release_reservation(&mut self, order_id: OrderId, tx: &mut Tx) {
        if let Some(res) = self.reservations.remove(&order_id) {
            if !res.usdc_remaining.is_zero() {
                if let Some(order) = self.orders.get(&order_id) {
                    if let Some(account) = self.accounts.get_mut(&order.user_id) {
                        account.credit(res.usdc_remaining);
                        tx.entry(
                            order.user_id,
                            res.usdc_remaining,
                            EntryReason::OrderRelease,
                            Some(order_id.0),
                        );
                    }
                }
            }
        }
    }

    /// Fills execute at the maker's price, so the only party who can come up
    /// short at settlement is a taker sell whose short collateral locks at a
    /// fill price above its own limit. Walk the planned fills against a
    /// scratch balance and reject the order while nothing has been touched.
    fn check_sell_settlement(
        &self,
        fills: &[Fill],
        user_id: UserId,
        asset_id: AssetId,
        usdc_hold: Usdc,
        share_lock: Decimal,
        limit: Price,
    ) -> Result<(), EngineError> {
        let account = self
            .accounts
            .get(&user_id)
            .ok_or(EngineError::AccountNotFound(user_id))?;
        let mut balance = account.hot_balance.sub(usdc_hold);
        let mut hold_left = usdc_hold;
        let mut shares_left = share_lock;
        let mut position = self
            .positions
            .get(&(user_id, asset_id))
            .cloned()
            .unwrap_or_else(|| Position::new(user_id, asset_id, self.current_time));

        for fill in fills {
            let covered = fill.quantity.min(shares_left);
            shares_left -= covered;
            let short_part = fill.quantity - covered;
            let release = Usdc::new(short_part * limit.value()).min(hold_left);
            hold_left = hold_left.sub(release);

            let notional = Usdc::new(fill.quantity * fill.price.value());
            let credit = notional.sub(notional.mul(self.config.swap_fee));
            let change = apply_sell(&position, fill.quantity, fill.price, self.current_time);
            position = change.position;

            balance = balance
                .add(release)
                .add(credit)
                .sub(change.collateral_locked);
            if balance.is_negative() {
                return Err(EngineError::InsufficientFunds {
                    requested: change.collateral_locked,
                    available: balance.add(change.collateral_locked),
                });
            }
        }
        Ok(())
    }

    /// Settle one fill: move money for both sides, update both positions,
    /// pay the fee into the pool, and record the trade.
    fn settle_fill(
        &mut self,
        asset_id: AssetId,
        fill: &Fill,
        dust: Decimal,
        tx: &mut Tx,
    ) -> Result<(), EngineError> {
        let (buyer_id, buyer_order, seller_id, seller_order) = match fill.taker_side {
            Side::Buy => (
                fill.taker_user_id,
                fill.taker_order_id,
                fill.maker_user_id,
                fill.maker_order_id,
            ),
            Side::Sell => (
                fill.maker_user_id,
                fill.maker_order_id,
                fill.taker_user_id,
                fill.taker_order_id,
            ),
        };

        let quantity = fill.quantity;
        let price = fill.price;
        let notional = Usdc::new(quantity * price.value());
        let fee = notional.mul(self.config.swap_fee);
        let seller_credit = notional.sub(fee);

        // keep the canonical maker copy in step with the book
        if let Some(maker) = self.orders.get_mut(&fill.maker_order_id) {
            maker.fill(quantity, dust);
        }

        // buyer: release this fill's share of the hold, pay actual cost
        let buyer_release = self.consume_usdc_hold(buyer_order, quantity);
        let buyer_change = {
            let position = self.position_or_new(buyer_id, asset_id);
            apply_buy(&position, quantity, price, self.current_time)
        };
        {
            let account = self
                .accounts
                .get_mut(&buyer_id)
                .ok_or(EngineError::AccountNotFound(buyer_id))?;
            account.credit(buyer_release);
            if !buyer_change.collateral_released.is_zero() {
                account.credit(buyer_change.collateral_released);
            }
            account.debit(notional)?;
        }
        if !buyer_release.is_zero() {
            tx.entry(buyer_id, buyer_release, EntryReason::OrderRelease, Some(buyer_order.0));
        }
        if !buyer_change.collateral_released.is_zero() {
            tx.entry(
                buyer_id,
                buyer_change.collateral_released,
                EntryReason::CollateralRelease,
                Some(buyer_order.0),
            );
        }
        tx.entry(buyer_id, notional.negate(), EntryReason::TradeDebit, Some(buyer_order.0));

        // seller: consume locked shares first, then the collateral hold
        let (_shares_consumed, seller_hold_release) =
            self.consume_sell_hold(seller_order, quantity);
        let seller_change = {
            let position = self.position_or_new(seller_id, asset_id);
            apply_sell(&position, quantity, price, self.current_time)
        };
        {
            let account = self
                .accounts
                .get_mut(&seller_id)
                .ok_or(EngineError::AccountNotFound(seller_id))?;
            account.credit(seller_hold_release);
            account.credit(seller_credit);
            if !seller_change.collateral_locked.is_zero() {
                account.debit(seller_change.collateral_locked)?;
            }
        }
        if !seller_hold_release.is_zero() {
            tx.entry(
                seller_id,
                seller_hold_release,
                EntryReason::OrderRelease,
                Some(seller_order.0),
            );
        }
        tx.entry(seller_id, seller_credit, EntryReason::TradeCredit, Some(seller_order.0));
        if !seller_change.collateral_locked.is_zero() {
            tx.entry(
                seller_id,
                seller_change.collateral_locked.negate(),
                EntryReason::CollateralLock,
                Some(seller_order.0),
            );
        }

        self.positions
            .insert((buyer_id, asset_id), buyer_change.position);
        self.positions
            .insert((seller_id, asset_id), seller_change.position);

        // fee raises the pool's NAV without minting
        let pool_id = self
            .pool_by_asset
            .get(&asset_id)
            .copied()
            .ok_or(EngineError::AssetNotFound(asset_id))?;
        if let Some(pool) = self.pools.get_mut(&pool_id) {
            pool.accrue_fee(fee);
        }

        if let Some(asset) = self.assets.get_mut(&asset_id) {
            asset.record_trade(price, quantity, self.current_time);
        }

        let trade_id = TradeId(self.next_trade_id);
        self.next_trade_id += 1;
        self.trades.push(Trade {
            id: trade_id,
            asset_id,
            buyer_id,
            seller_id,
            maker_order_id: fill.maker_order_id,
            taker_order_id: fill.taker_order_id,
            price,
            quantity,
            fee,
            side: fill.taker_side,
            executed_at: self.current_time,
        });

        tx.event(EventPayload::Trade {
            asset_id,
            trade_id,
            price,
            quantity,
            buyer_id,
            seller_id,
            timestamp: self.current_time,
        });

        // maker finished in this fill: hand back whatever its hold still has
        let maker_done = self
            .orders
            .get(&fill.maker_order_id)
            .map(|o| !o.is_open())
            .unwrap_or(false);
        if maker_done {
            self.release_reservation(fill.maker_order_id, tx);
        }

        Ok(())
    }

    fn position_or_new(&mut self, user_id: UserId, asset_id: AssetId) -> Position {
        self.positions
            .get(&(user_id, asset_id))
            .cloned()
            .unwrap_or_else(|| Position::new(user_id, asset_id, self.current_time))
    }

    /// Release `quantity * limit` from an order's USDC hold, capped at what
    /// the hold still contains.
    fn consume_usdc_hold(&mut self, order_id: OrderId, quantity: Decimal) -> Usdc {
        if let Some(res) = self.reservations.get_mut(&order_id) {
            let portion = Usdc::new(quantity * res.limit.value()).min(res.usdc_remaining);
            res.usdc_remaining = res.usdc_remaining.sub(portion);
            portion
        } else {
            Usdc::zero()
        }
    }

    /// Consume a sell order's hold: locked shares first, then collateral for
    /// the shorted remainder. Returns (shares consumed, USDC released).
    fn consume_sell_hold(&mut self, order_id: OrderId, quantity: Decimal) -> (Decimal, Usdc) {
        if let Some(res) = self.reservations.get_mut(&order_id) {
            let shares = quantity.min(res.shares_remaining);
            res.shares_remaining -= shares;
            let short_part = quantity - shares;
            let release = Usdc::new(short_part * res.limit.value()).min(res.usdc_remaining);
            res.usdc_remaining = res.usdc_remaining.sub(release);
            (shares, release)
        } else {
            (Decimal::ZERO, Usdc::zero())
        }
    }
}
