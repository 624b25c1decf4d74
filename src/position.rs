// 4.0: per-user-per-asset share bookkeeping. shares signed: >0 long, <0 short.
// cost basis (avg_price) is recomputed as a weighted average whenever absolute
// exposure increases, and never touched when it shrinks (account-level FIFO,
// not lot-level). shorts lock collateral at entry; 4.2 has the valuation
// formulas portfolio consumers rely on.

use crate::types::{AssetId, Price, Shares, Timestamp, Usdc, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub user_id: UserId,
    pub asset_id: AssetId,
    pub shares: Shares,
    /// Cost basis. Zero while flat; entry price for the short side too.
    pub avg_price: Decimal,
    /// Margin locked for the short side. Zero for longs.
    pub collateral: Usdc,
    /// Advisory levels; the engine stores them but never acts on them.
    pub stop_loss: Option<Price>,
    pub take_profit: Option<Price>,
    pub opened_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Position {
    pub fn new(user_id: UserId, asset_id: AssetId, timestamp: Timestamp) -> Self {
        Self {
            user_id,
            asset_id,
            shares: Shares::zero(),
            avg_price: Decimal::ZERO,
            collateral: Usdc::zero(),
            stop_loss: None,
            take_profit: None,
            opened_at: timestamp,
            updated_at: timestamp,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.shares.is_zero()
    }

    // 4.2: valuation. longs: shares * price. shorts: collateral + (entry - price) * |shares|.
    pub fn value(&self, current_price: Price) -> Usdc {
        if self.shares.is_short() {
            let gain = (self.avg_price - current_price.value()) * self.shares.abs();
            Usdc::new(self.collateral.value() + gain)
        } else {
            Usdc::new(self.shares.value() * current_price.value())
        }
    }
}

/// Result of applying one fill to a position. Collateral deltas tell the
/// engine how much short margin to lock from or release to the hot balance.
#[derive(Debug, Clone)]
pub struct PositionChange {
    pub position: Position,
    pub collateral_locked: Usdc,
    pub collateral_released: Usdc,
}

// 4.1: buyer side of a fill. covers short exposure first (releasing its
// collateral proportionally), then grows the long side with a weighted-average
// cost basis update.
pub fn apply_buy(
    position: &Position,
    quantity: Decimal,
    fill_price: Price,
    timestamp: Timestamp,
) -> PositionChange {
    debug_assert!(quantity > Decimal::ZERO, "buy quantity must be positive");

    let old = position.shares.value();
    let price = fill_price.value();
    let mut new_position = position.clone();
    let mut released = Usdc::zero();

    let long_add = if old < Decimal::ZERO {
        // cover the short first
        let short_abs = -old;
        let cover = quantity.min(short_abs);
        let fraction = cover / short_abs;
        released = Usdc::new(position.collateral.value() * fraction);
        new_position.collateral = position.collateral.sub(released);
        quantity - cover
    } else {
        quantity
    };

    let new_shares = old + quantity;
    new_position.shares = Shares::new(new_shares);
    new_position.updated_at = timestamp;

    if long_add > Decimal::ZERO {
        let old_long = new_shares - long_add; // long shares before this buy
        new_position.avg_price = if old_long > Decimal::ZERO {
            (old_long * position.avg_price + long_add * price) / new_shares
        } else {
            price
        };
    } else if new_shares.is_zero() {
        new_position.avg_price = Decimal::ZERO;
    }
    // still short after a partial cover: entry basis untouched

    PositionChange {
        position: new_position,
        collateral_locked: Usdc::zero(),
        collateral_released: released,
    }
}

// 4.1b: seller side of a fill. reduces the long side without touching the
// cost basis; anything past flat opens or grows a short, locking collateral
// at the fill price and averaging the short entry.
pub fn apply_sell(
    position: &Position,
    quantity: Decimal,
    fill_price: Price,
    timestamp: Timestamp,
) -> PositionChange {
    debug_assert!(quantity > Decimal::ZERO, "sell quantity must be positive");

    let old = position.shares.value();
    let price = fill_price.value();
    let mut new_position = position.clone();
    let mut locked = Usdc::zero();

    let new_shares = old - quantity;
    new_position.shares = Shares::new(new_shares);
    new_position.updated_at = timestamp;

    // portion that grows short exposure
    let short_add = (-new_shares).min(quantity).max(Decimal::ZERO);

    if short_add > Decimal::ZERO {
        locked = Usdc::new(short_add * price);
        new_position.collateral = position.collateral.add(locked);

        let old_short = -new_shares - short_add; // short exposure before this sell
        new_position.avg_price = if old_short > Decimal::ZERO {
            (old_short * position.avg_price + short_add * price) / -new_shares
        } else {
            price
        };
    } else if new_shares.is_zero() {
        new_position.avg_price = Decimal::ZERO;
    }
    // plain long reduction: basis untouched

    PositionChange {
        position: new_position,
        collateral_locked: locked,
        collateral_released: Usdc::zero(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn flat() -> Position {
        Position::new(UserId(1), AssetId(1), Timestamp::from_millis(0))
    }

    fn long(shares: Decimal, avg: Decimal) -> Position {
        let mut p = flat();
        p.shares = Shares::new(shares);
        p.avg_price = avg;
        p
    }

    #[test]
    fn buy_from_flat_sets_basis() {
        let change = apply_buy(&flat(), dec!(10), Price::new_unchecked(dec!(5)), Timestamp(1));
        assert_eq!(change.position.shares.value(), dec!(10));
        assert_eq!(change.position.avg_price, dec!(5));
    }

    #[test]
    fn buy_increase_weighted_average() {
        let pos = long(dec!(10), dec!(5));
        let change = apply_buy(&pos, dec!(10), Price::new_unchecked(dec!(7)), Timestamp(1));
        // (10*5 + 10*7) / 20 = 6
        assert_eq!(change.position.shares.value(), dec!(20));
        assert_eq!(change.position.avg_price, dec!(6));
    }

    #[test]
    fn sell_reduction_keeps_basis() {
        let pos = long(dec!(20), dec!(6));
        let change = apply_sell(&pos, dec!(5), Price::new_unchecked(dec!(9)), Timestamp(1));
        assert_eq!(change.position.shares.value(), dec!(15));
        assert_eq!(change.position.avg_price, dec!(6));
        assert!(change.collateral_locked.is_zero());
    }

    #[test]
    fn sell_past_flat_opens_short_with_collateral() {
        let pos = long(dec!(3), dec!(6));
        let change = apply_sell(&pos, dec!(5), Price::new_unchecked(dec!(10)), Timestamp(1));
        assert_eq!(change.position.shares.value(), dec!(-2));
        // 2 uncovered shares locked at fill price
        assert_eq!(change.collateral_locked.value(), dec!(20));
        assert_eq!(change.position.avg_price, dec!(10));
    }

    #[test]
    fn buy_covers_short_and_releases_collateral() {
        let mut pos = flat();
        pos.shares = Shares::new(dec!(-4));
        pos.avg_price = dec!(10);
        pos.collateral = Usdc::new(dec!(40));

        let change = apply_buy(&pos, dec!(2), Price::new_unchecked(dec!(8)), Timestamp(1));
        assert_eq!(change.position.shares.value(), dec!(-2));
        assert_eq!(change.collateral_released.value(), dec!(20));
        // still short: entry basis untouched
        assert_eq!(change.position.avg_price, dec!(10));
    }

    #[test]
    fn buy_flips_short_to_long() {
        let mut pos = flat();
        pos.shares = Shares::new(dec!(-2));
        pos.avg_price = dec!(10);
        pos.collateral = Usdc::new(dec!(20));

        let change = apply_buy(&pos, dec!(5), Price::new_unchecked(dec!(9)), Timestamp(1));
        assert_eq!(change.position.shares.value(), dec!(3));
        assert_eq!(change.collateral_released.value(), dec!(20));
        // long part entered at the fill price
        assert_eq!(change.position.avg_price, dec!(9));
    }

    #[test]
    fn long_valuation() {
        let pos = long(dec!(10), dec!(5));
        assert_eq!(pos.value(Price::new_unchecked(dec!(7))).value(), dec!(70));
    }

    #[test]
    fn short_valuation() {
        let mut pos = flat();
        pos.shares = Shares::new(dec!(-10));
        pos.avg_price = dec!(10);
        pos.collateral = Usdc::new(dec!(100));

        // collateral + (entry - current) * |shares| = 100 + (10-8)*10 = 120
        assert_eq!(pos.value(Price::new_unchecked(dec!(8))).value(), dec!(120));
        // price above entry eats into collateral
        assert_eq!(pos.value(Price::new_unchecked(dec!(12))).value(), dec!(80));
    }

    #[test]
    fn full_close_zeroes_basis() {
        let pos = long(dec!(10), dec!(5));
        let change = apply_sell(&pos, dec!(10), Price::new_unchecked(dec!(6)), Timestamp(1));
        assert!(change.position.is_flat());
        assert_eq!(change.position.avg_price, Decimal::ZERO);
    }
}
