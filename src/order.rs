//! Limit orders and the order book.
//!
//! Resting limit orders are matched under price-time priority. Fills always
//! execute at the resting (maker) order's price, so a crossing taker gets
//! price improvement. Matching never pairs two orders from the same user.

use crate::types::{AssetId, OrderId, Price, Side, Timestamp, TradeId, Usdc, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Resting on the book (possibly partially filled).
    Open,
    /// Remaining quantity at or below dust.
    Filled,
    /// Removed by the user before completion.
    Cancelled,
}

/// A resting or incoming limit order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitOrder {
    pub id: OrderId,
    pub asset_id: AssetId,
    pub user_id: UserId,
    pub side: Side,
    pub price: Price,
    pub original_quantity: Decimal,
    pub remaining_quantity: Decimal,
    pub status: OrderStatus,
    pub created_at: Timestamp,
}

impl LimitOrder {
    pub fn new(
        id: OrderId,
        asset_id: AssetId,
        user_id: UserId,
        side: Side,
        price: Price,
        quantity: Decimal,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id,
            asset_id,
            user_id,
            side,
            price,
            original_quantity: quantity,
            remaining_quantity: quantity,
            status: OrderStatus::Open,
            created_at: timestamp,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Open
    }

    pub fn filled_quantity(&self) -> Decimal {
        self.original_quantity - self.remaining_quantity
    }

    /// Reduce remaining quantity, flipping to Filled once only dust is left.
    pub fn fill(&mut self, quantity: Decimal, dust: Decimal) {
        debug_assert!(
            quantity <= self.remaining_quantity,
            "cannot fill more than remaining"
        );
        self.remaining_quantity -= quantity;
        if self.remaining_quantity <= dust {
            self.remaining_quantity = Decimal::ZERO;
            self.status = OrderStatus::Filled;
        }
    }
}

/// Priority key for price-time ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OrderKey {
    price: Price,
    timestamp: Timestamp,
    order_id: OrderId,
}

impl OrderKey {
    fn new(price: Price, timestamp: Timestamp, order_id: OrderId) -> Self {
        Self {
            price,
            timestamp,
            order_id,
        }
    }
}

impl PartialOrd for OrderKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // price first, then earlier timestamp, then order id as tiebreaker
        self.price
            .cmp(&other.price)
            .then(self.timestamp.cmp(&other.timestamp))
            .then(self.order_id.0.cmp(&other.order_id.0))
    }
}

/// One side-aggregated price level, for orderbook snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Price,
    pub total_quantity: Decimal,
    pub order_count: usize,
}

/// Central limit order book for one asset.
#[derive(Debug, Clone)]
pub struct OrderBook {
    pub asset_id: AssetId,
    /// Buy orders; best bid is the highest key.
    bids: BTreeMap<OrderKey, LimitOrder>,
    /// Sell orders; best ask is the lowest key.
    asks: BTreeMap<OrderKey, LimitOrder>,
    order_index: std::collections::HashMap<OrderId, (Side, OrderKey)>,
}

impl OrderBook {
    pub fn new(asset_id: AssetId) -> Self {
        Self {
            asset_id,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            order_index: std::collections::HashMap::new(),
        }
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.bids.iter().next_back().map(|(k, _)| k.price)
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.iter().next().map(|(k, _)| k.price)
    }

    pub fn insert(&mut self, order: LimitOrder) {
        debug_assert!(order.is_open(), "only open orders rest on the book");
        let key = OrderKey::new(order.price, order.created_at, order.id);
        let side = order.side;

        self.order_index.insert(order.id, (side, key));

        match side {
            Side::Buy => {
                self.bids.insert(key, order);
            }
            Side::Sell => {
                self.asks.insert(key, order);
            }
        }
    }

    pub fn remove(&mut self, order_id: OrderId) -> Option<LimitOrder> {
        if let Some((side, key)) = self.order_index.remove(&order_id) {
            match side {
                Side::Buy => self.bids.remove(&key),
                Side::Sell => self.asks.remove(&key),
            }
        } else {
            None
        }
    }

    pub fn get(&self, order_id: OrderId) -> Option<&LimitOrder> {
        if let Some((side, key)) = self.order_index.get(&order_id) {
            match side {
                Side::Buy => self.bids.get(key),
                Side::Sell => self.asks.get(key),
            }
        } else {
            None
        }
    }

    /// Aggregate depth per price level, best levels first.
    pub fn levels(&self, side: Side, max_levels: usize) -> Vec<PriceLevel> {
        let mut levels: Vec<PriceLevel> = Vec::new();
        let mut current_price: Option<Price> = None;

        let iter: Box<dyn Iterator<Item = (&OrderKey, &LimitOrder)>> = match side {
            Side::Buy => Box::new(self.bids.iter().rev()),
            Side::Sell => Box::new(self.asks.iter()),
        };

        for (key, order) in iter {
            if Some(key.price) != current_price {
                if levels.len() >= max_levels {
                    break;
                }
                current_price = Some(key.price);
                levels.push(PriceLevel {
                    price: key.price,
                    total_quantity: Decimal::ZERO,
                    order_count: 0,
                });
            }
            if let Some(level) = levels.last_mut() {
                level.total_quantity += order.remaining_quantity;
                level.order_count += 1;
            }
        }

        levels
    }

    pub fn order_count(&self) -> usize {
        self.bids.len() + self.asks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

/// Result of matching an incoming order against the book.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub fills: Vec<Fill>,
    pub remaining_quantity: Decimal,
    pub fully_filled: bool,
}

/// An executed trade, as recorded in the trade log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub asset_id: AssetId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub maker_order_id: OrderId,
    pub taker_order_id: OrderId,
    /// Execution price, always the maker's.
    pub price: Price,
    pub quantity: Decimal,
    /// Fee taken from the seller's proceeds, accrued to the asset's pool.
    pub fee: Usdc,
    /// The aggressing side: which way the taker crossed the book.
    pub side: Side,
    pub executed_at: Timestamp,
}

impl Trade {
    pub fn notional(&self) -> Usdc {
        Usdc(self.quantity * self.price.value())
    }
}

/// A single execution between a resting maker and a crossing taker.
#[derive(Debug, Clone)]
pub struct Fill {
    pub maker_order_id: OrderId,
    pub maker_user_id: UserId,
    pub taker_order_id: OrderId,
    pub taker_user_id: UserId,
    /// Always the maker's price.
    pub price: Price,
    pub quantity: Decimal,
    pub taker_side: Side,
}

/// Match an incoming order against the book, draining crossable liquidity.
///
/// Candidates are walked best-price-first, earliest-first within a level.
/// Orders from the taker's own user are skipped, as is anything that is not
/// Open (a candidate racing with another resolution is legitimate, not an
/// error). The loop is bounded by the liquidity resting when the pass
/// started; it never waits for new orders.
pub fn match_order(book: &mut OrderBook, order: &mut LimitOrder, dust: Decimal) -> MatchResult {
    let mut fills = Vec::new();
    let is_buy = order.side == Side::Buy;
    let limit = order.price.value();

    // Snapshot crossing candidates in priority order so self-trade skips
    // still reach deeper levels.
    let candidate_keys: Vec<OrderKey> = if is_buy {
        book.asks
            .iter()
            .take_while(|(k, _)| k.price.value() <= limit)
            .map(|(k, _)| *k)
            .collect()
    } else {
        book.bids
            .iter()
            .rev()
            .take_while(|(k, _)| k.price.value() >= limit)
            .map(|(k, _)| *k)
            .collect()
    };

    for key in candidate_keys {
        if !order.is_open() || order.remaining_quantity <= dust {
            break;
        }

        let maker = match if is_buy {
            book.asks.get_mut(&key)
        } else {
            book.bids.get_mut(&key)
        } {
            Some(m) => m,
            None => continue,
        };

        // no self-trade: filtered, never matched, never an error
        if maker.user_id == order.user_id {
            continue;
        }
        if !maker.is_open() {
            continue;
        }

        let quantity = order.remaining_quantity.min(maker.remaining_quantity);

        let fill = Fill {
            maker_order_id: maker.id,
            maker_user_id: maker.user_id,
            taker_order_id: order.id,
            taker_user_id: order.user_id,
            price: key.price,
            quantity,
            taker_side: order.side,
        };

        maker.fill(quantity, dust);
        order.fill(quantity, dust);

        let maker_done = !maker.is_open();
        let maker_id = maker.id;

        fills.push(fill);

        if maker_done {
            book.remove(maker_id);
        }
    }

    MatchResult {
        fills,
        remaining_quantity: order.remaining_quantity,
        fully_filled: order.status == OrderStatus::Filled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const DUST: Decimal = Decimal::from_parts(1, 0, 0, false, 6); // 1e-6

    fn bid(id: u64, user: u64, price: Decimal, qty: Decimal, ts: i64) -> LimitOrder {
        LimitOrder::new(
            OrderId(id),
            AssetId(1),
            UserId(user),
            Side::Buy,
            Price::new_unchecked(price),
            qty,
            Timestamp::from_millis(ts),
        )
    }

    fn ask(id: u64, user: u64, price: Decimal, qty: Decimal, ts: i64) -> LimitOrder {
        LimitOrder::new(
            OrderId(id),
            AssetId(1),
            UserId(user),
            Side::Sell,
            Price::new_unchecked(price),
            qty,
            Timestamp::from_millis(ts),
        )
    }

    #[test]
    fn empty_book() {
        let book = OrderBook::new(AssetId(1));
        assert!(book.is_empty());
        assert!(book.best_bid().is_none());
        assert!(book.best_ask().is_none());
    }

    #[test]
    fn insert_and_best_prices() {
        let mut book = OrderBook::new(AssetId(1));
        book.insert(bid(1, 1, dec!(9.50), dec!(10), 0));
        book.insert(ask(2, 2, dec!(10.50), dec!(10), 0));

        assert_eq!(book.best_bid().unwrap().value(), dec!(9.50));
        assert_eq!(book.best_ask().unwrap().value(), dec!(10.50));
    }

    #[test]
    fn maker_price_improvement() {
        let mut book = OrderBook::new(AssetId(1));
        book.insert(ask(1, 1, dec!(10), dec!(5), 0));

        // buy at 12 crosses the 10 ask, fills at 10
        let mut taker = bid(2, 2, dec!(12), dec!(3), 100);
        let result = match_order(&mut book, &mut taker, DUST);

        assert_eq!(result.fills.len(), 1);
        assert!(result.fully_filled);
        assert_eq!(result.fills[0].price.value(), dec!(10));
        assert_eq!(result.fills[0].quantity, dec!(3));

        // maker keeps the remainder, still open
        let maker = book.get(OrderId(1)).unwrap();
        assert_eq!(maker.remaining_quantity, dec!(2));
        assert!(maker.is_open());
    }

    #[test]
    fn price_time_priority_at_same_level() {
        let mut book = OrderBook::new(AssetId(1));
        book.insert(ask(1, 1, dec!(10), dec!(1), 200));
        book.insert(ask(2, 2, dec!(10), dec!(1), 50)); // earlier, fills first
        book.insert(ask(3, 3, dec!(9.50), dec!(1), 500)); // better price, fills first overall

        let mut taker = bid(4, 9, dec!(10), dec!(2), 1000);
        let result = match_order(&mut book, &mut taker, DUST);

        assert_eq!(result.fills.len(), 2);
        assert_eq!(result.fills[0].maker_order_id, OrderId(3));
        assert_eq!(result.fills[1].maker_order_id, OrderId(2));
    }

    #[test]
    fn self_trade_skipped_not_failed() {
        let mut book = OrderBook::new(AssetId(1));
        book.insert(ask(1, 7, dec!(10), dec!(1), 0)); // same user as taker
        book.insert(ask(2, 2, dec!(10.50), dec!(1), 0));

        let mut taker = bid(3, 7, dec!(11), dec!(2), 100);
        let result = match_order(&mut book, &mut taker, DUST);

        // skips own order, matches the deeper level
        assert_eq!(result.fills.len(), 1);
        assert_eq!(result.fills[0].maker_order_id, OrderId(2));
        assert_eq!(result.remaining_quantity, dec!(1));
        assert!(book.get(OrderId(1)).is_some());
    }

    #[test]
    fn no_cross_no_fill() {
        let mut book = OrderBook::new(AssetId(1));
        book.insert(ask(1, 1, dec!(10), dec!(1), 0));

        let mut taker = bid(2, 2, dec!(9), dec!(1), 100);
        let result = match_order(&mut book, &mut taker, DUST);

        assert!(result.fills.is_empty());
        assert_eq!(result.remaining_quantity, dec!(1));
        assert!(!result.fully_filled);
    }

    #[test]
    fn sell_matches_highest_bid_first() {
        let mut book = OrderBook::new(AssetId(1));
        book.insert(bid(1, 1, dec!(10), dec!(1), 0));
        book.insert(bid(2, 2, dec!(11), dec!(1), 0));

        let mut taker = ask(3, 3, dec!(10), dec!(2), 100);
        let result = match_order(&mut book, &mut taker, DUST);

        assert_eq!(result.fills.len(), 2);
        assert_eq!(result.fills[0].price.value(), dec!(11));
        assert_eq!(result.fills[1].price.value(), dec!(10));
        assert!(result.fully_filled);
    }

    #[test]
    fn dust_remainder_counts_as_filled() {
        let mut order = ask(1, 1, dec!(10), dec!(1), 0);
        order.fill(dec!(0.9999995), DUST);
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.remaining_quantity, Decimal::ZERO);
    }

    #[test]
    fn remove_order() {
        let mut book = OrderBook::new(AssetId(1));
        book.insert(bid(1, 1, dec!(10), dec!(1), 0));
        assert_eq!(book.order_count(), 1);

        assert!(book.remove(OrderId(1)).is_some());
        assert!(book.is_empty());
    }

    #[test]
    fn depth_levels() {
        let mut book = OrderBook::new(AssetId(1));
        book.insert(bid(1, 1, dec!(10), dec!(1), 0));
        book.insert(bid(2, 2, dec!(10), dec!(2), 10));
        book.insert(bid(3, 3, dec!(9.50), dec!(1), 20));

        let levels = book.levels(Side::Buy, 10);
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].price.value(), dec!(10));
        assert_eq!(levels[0].total_quantity, dec!(3));
        assert_eq!(levels[0].order_count, 2);
        assert_eq!(levels[1].price.value(), dec!(9.50));
    }
}
