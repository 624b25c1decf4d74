//! Synthetic asset configuration and price state.
//!
//! An asset is born in `Funding` and flips to `Active` exactly once, when its
//! pool crosses the soft cap. It never goes back. `Paused` stops new orders
//! and contributions but not cancels or queued-withdrawal processing.

use crate::pricing::CurveParams;
use crate::types::{AssetId, Price, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetStatus {
    /// Collecting pool liquidity; not tradable yet.
    Funding,
    /// Soft cap reached; open for trading.
    Active,
    /// Temporarily halted by an operator.
    Paused,
}

/// Static asset configuration (immutable after creation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    pub id: AssetId,
    pub name: String,
    pub symbol: String,
    /// Pool liquidity required to activate.
    pub soft_cap: Decimal,
    /// Maximum liquidity the pool will accept.
    pub hard_cap: Decimal,
    /// Bonding curve parameters seeding the market price.
    pub curve: CurveParams,
    pub funding_deadline: Option<Timestamp>,
}

/// Dynamic asset state (changes with trading and oracle updates).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetState {
    pub config: AssetConfig,
    pub status: AssetStatus,
    /// Circulating synthetic shares, feeds the bonding curve.
    pub total_supply: Decimal,
    pub last_market_price: Price,
    pub last_fundamental: Price,
    pub last_display_price: Price,
    /// Rolling traded notional driving the market weight. Reset per pricing
    /// cycle by the caller; no wall-clock decay of its own.
    pub vol_recent: Decimal,
    pub last_updated: Timestamp,
}

impl AssetState {
    pub fn new(config: AssetConfig, timestamp: Timestamp) -> Self {
        let seed = crate::pricing::curve_price(&config.curve, Decimal::ZERO);
        Self {
            config,
            status: AssetStatus::Funding,
            total_supply: Decimal::ZERO,
            last_market_price: seed,
            last_fundamental: seed,
            last_display_price: seed,
            vol_recent: Decimal::ZERO,
            last_updated: timestamp,
        }
    }

    pub fn is_tradable(&self) -> bool {
        self.status == AssetStatus::Active
    }

    pub fn accepts_contributions(&self) -> bool {
        matches!(self.status, AssetStatus::Funding | AssetStatus::Active)
    }

    /// Funding -> Active, exactly once. Any other starting state is a no-op
    /// so repeated soft-cap crossings stay idempotent.
    pub fn activate(&mut self) -> bool {
        if self.status == AssetStatus::Funding {
            self.status = AssetStatus::Active;
            true
        } else {
            false
        }
    }

    pub fn pause(&mut self) -> Result<(), AssetError> {
        if self.status != AssetStatus::Active {
            return Err(AssetError::InvalidTransition {
                asset_id: self.config.id,
                from: self.status,
                to: AssetStatus::Paused,
            });
        }
        self.status = AssetStatus::Paused;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), AssetError> {
        if self.status != AssetStatus::Paused {
            return Err(AssetError::InvalidTransition {
                asset_id: self.config.id,
                from: self.status,
                to: AssetStatus::Active,
            });
        }
        self.status = AssetStatus::Active;
        Ok(())
    }

    /// Record an executed trade: market price follows the last fill, recent
    /// volume accumulates notional.
    pub fn record_trade(&mut self, price: Price, quantity: Decimal, timestamp: Timestamp) {
        self.last_market_price = price;
        self.vol_recent += quantity * price.value();
        self.last_updated = timestamp;
    }

    /// Current market price: last trade when one exists, curve seed otherwise.
    pub fn market_price(&self) -> Price {
        self.last_market_price
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AssetError {
    #[error("Asset {asset_id:?}: invalid status transition {from:?} -> {to:?}")]
    InvalidTransition {
        asset_id: AssetId,
        from: AssetStatus,
        to: AssetStatus,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn test_asset() -> AssetState {
        AssetState::new(
            AssetConfig {
                id: AssetId(1),
                name: "Synthetic Example".to_string(),
                symbol: "sEX".to_string(),
                soft_cap: dec!(5000),
                hard_cap: dec!(100000),
                curve: CurveParams {
                    p0: dec!(10),
                    k: dec!(0),
                },
                funding_deadline: None,
            },
            Timestamp::from_millis(0),
        )
    }

    #[test]
    fn starts_in_funding() {
        let asset = test_asset();
        assert_eq!(asset.status, AssetStatus::Funding);
        assert!(!asset.is_tradable());
        assert!(asset.accepts_contributions());
        // curve seeds all three prices
        assert_eq!(asset.last_display_price.value(), dec!(10));
    }

    #[test]
    fn activation_is_one_way_and_idempotent() {
        let mut asset = test_asset();
        assert!(asset.activate());
        assert_eq!(asset.status, AssetStatus::Active);

        // second crossing does nothing
        assert!(!asset.activate());
        assert_eq!(asset.status, AssetStatus::Active);
    }

    #[test]
    fn pause_only_from_active() {
        let mut asset = test_asset();
        assert!(asset.pause().is_err());

        asset.activate();
        asset.pause().unwrap();
        assert_eq!(asset.status, AssetStatus::Paused);
        assert!(!asset.is_tradable());
        assert!(!asset.accepts_contributions());

        // paused assets never re-enter funding
        assert!(!asset.activate());
        asset.resume().unwrap();
        assert_eq!(asset.status, AssetStatus::Active);
    }

    #[test]
    fn trade_recording_moves_market_price_and_volume() {
        let mut asset = test_asset();
        asset.record_trade(Price::new_unchecked(dec!(11)), dec!(3), Timestamp(5));

        assert_eq!(asset.market_price().value(), dec!(11));
        assert_eq!(asset.vol_recent, dec!(33));
    }
}
