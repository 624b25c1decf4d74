// 3.0: dual-price derivation. blends the trading-driven market price with the
// oracle-driven fundamental using a volume-adaptive weight, and smooths
// fundamental moves with a clamped delta + EMA so one bad oracle call cannot
// crash or spike the price.
//
// everything here is a pure function over Decimal. no state, no I/O.

use crate::types::Price;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Tuning constants for the dual-price engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingParams {
    /// Volume scale for the market weight curve. At vol == v0 the market
    /// contributes 0.5 of its 0.6 swing.
    pub v0: Decimal,
    /// EMA smoothing factor for fundamental updates.
    pub beta: Decimal,
    /// Hard cap on a single oracle delta, in percent.
    pub max_delta_percent: Decimal,
    /// Floor of the market weight. The fundamental never fully disappears.
    pub min_weight: Decimal,
    /// Ceiling of the market weight. The oracle is never fully silenced.
    pub max_weight: Decimal,
}

impl Default for PricingParams {
    fn default() -> Self {
        Self {
            v0: dec!(1000),
            beta: dec!(0.2),
            max_delta_percent: dec!(30),
            min_weight: dec!(0.2),
            max_weight: dec!(0.85),
        }
    }
}

/// Per-asset bonding curve parameters: price = p0 * (1 + k * supply).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveParams {
    pub p0: Decimal,
    pub k: Decimal,
}

/// Output of combining market and fundamental prices.
#[derive(Debug, Clone, Copy)]
pub struct CombinedPrice {
    pub display_price: Price,
    pub market_weight: Decimal,
}

/// Weight of the market component as a function of recent volume.
///
/// `clamp(0.2 + 0.6 * vol / (vol + v0), 0.2, 0.85)` — quiet assets lean on
/// the fundamental, heavy trading lets the market dominate, capped so the
/// oracle always keeps a voice.
pub fn market_weight(vol_recent: Decimal, params: &PricingParams) -> Decimal {
    let vol = vol_recent.max(Decimal::ZERO);
    let raw = params.min_weight + dec!(0.6) * vol / (vol + params.v0);
    raw.max(params.min_weight).min(params.max_weight)
}

/// Apply one oracle delta to the fundamental price.
///
/// The delta is clamped to ±max_delta_percent, then EMA-smoothed:
/// `beta * f_prev * (1 + delta/100) + (1 - beta) * f_prev`.
pub fn update_fundamental(
    fundamental_prev: Decimal,
    delta_percent: Decimal,
    params: &PricingParams,
) -> Decimal {
    let clamped = delta_percent
        .max(-params.max_delta_percent)
        .min(params.max_delta_percent);
    let raw = fundamental_prev * (Decimal::ONE + clamped / dec!(100));
    params.beta * raw + (Decimal::ONE - params.beta) * fundamental_prev
}

/// Blend market and fundamental into the display price.
pub fn combine_price(
    market_price: Price,
    fundamental_price: Price,
    vol_recent: Decimal,
    params: &PricingParams,
) -> CombinedPrice {
    let w = market_weight(vol_recent, params);
    let blended = w * market_price.value() + (Decimal::ONE - w) * fundamental_price.value();
    CombinedPrice {
        display_price: Price::new_unchecked(blended),
        market_weight: w,
    }
}

/// Bonding curve price for a given circulating supply. Seeds the market
/// price before any trade exists.
pub fn curve_price(curve: &CurveParams, total_supply: Decimal) -> Price {
    Price::new_unchecked(curve.p0 * (Decimal::ONE + curve.k * total_supply))
}
