// Oracle input boundary.
//
// The engine is agnostic to which model or provider produced a signal; it
// depends only on the {delta_percent, confidence} shape. Raw signals may
// contain garbage (out-of-range deltas, confidence outside [0,1]) and must
// be sanitized, never trusted. When the oracle is unreachable the engine
// substitutes a neutral fallback signal and flags the log row so downstream
// consumers can discount it.

use crate::types::{AssetId, Timestamp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// One signal from the external oracle, as delivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleSignal {
    pub delta_percent: Decimal,
    /// Confidence in [0, 1]. Out-of-range values are clamped on sanitize.
    pub confidence: Decimal,
    pub summary: String,
    pub source_urls: Vec<String>,
}

impl OracleSignal {
    pub fn new(delta_percent: Decimal, confidence: Decimal) -> Self {
        Self {
            delta_percent,
            confidence,
            summary: String::new(),
            source_urls: Vec::new(),
        }
    }

    /// Neutral signal used when the oracle cannot be reached: no price move,
    /// zero confidence.
    pub fn fallback() -> Self {
        Self {
            delta_percent: Decimal::ZERO,
            confidence: Decimal::ZERO,
            summary: "oracle unavailable".to_string(),
            source_urls: Vec::new(),
        }
    }

    /// Clamp the signal into the range the pricing engine accepts. Garbage in
    /// never propagates: delta is capped at ±max_delta_percent, confidence is
    /// forced into [0, 1] (negative values read as no confidence).
    pub fn sanitize(&self, max_delta_percent: Decimal) -> OracleSignal {
        let delta = self
            .delta_percent
            .max(-max_delta_percent)
            .min(max_delta_percent);
        let confidence = self.confidence.max(Decimal::ZERO).min(dec!(1));
        OracleSignal {
            delta_percent: delta,
            confidence,
            summary: self.summary.clone(),
            source_urls: self.source_urls.clone(),
        }
    }
}

/// Audit row recorded for every signal the engine applies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleLog {
    pub asset_id: AssetId,
    pub delta_percent: Decimal,
    pub confidence: Decimal,
    pub summary: String,
    pub source_urls: Vec<String>,
    /// True when this row is the neutral substitute for an unreachable
    /// oracle, not a real signal.
    pub is_fallback: bool,
    pub created_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn sanitize_clamps_delta() {
        let raw = OracleSignal::new(dec!(250), dec!(0.9));
        let clean = raw.sanitize(dec!(30));
        assert_eq!(clean.delta_percent, dec!(30));

        let raw = OracleSignal::new(dec!(-99), dec!(0.9));
        assert_eq!(raw.sanitize(dec!(30)).delta_percent, dec!(-30));
    }

    #[test]
    fn sanitize_clamps_confidence() {
        let raw = OracleSignal::new(dec!(5), dec!(7));
        assert_eq!(raw.sanitize(dec!(30)).confidence, dec!(1));

        let raw = OracleSignal::new(dec!(5), dec!(-3));
        assert_eq!(raw.sanitize(dec!(30)).confidence, dec!(0));
    }

    #[test]
    fn fallback_is_neutral() {
        let fb = OracleSignal::fallback();
        assert_eq!(fb.delta_percent, Decimal::ZERO);
        assert_eq!(fb.confidence, Decimal::ZERO);
    }
}
