// 8.4 engine/pricing.rs: oracle ingestion and display price refresh.
//
// The display price is recomputed from the same three inputs everywhere:
// last market price, smoothed fundamental, recent volume. Trades and oracle
// signals both funnel through refresh_display_price so no code path can
// publish a stale blend.

use super::core::{Engine, Tx};
use super::results::EngineError;
use crate::events::EventPayload;
use crate::oracle::{OracleLog, OracleSignal};
use crate::pricing::{combine_price, update_fundamental};
use crate::types::{AssetId, Price};
use tracing::{info, warn};

impl Engine {
    /// Apply a sanitized oracle signal to an asset's fundamental price and
    /// republish the display price. Works in every asset state; a paused or
    /// still-funding asset keeps tracking its fundamental.
    pub fn apply_oracle_signal(
        &mut self,
        asset_id: AssetId,
        signal: &OracleSignal,
    ) -> Result<Price, EngineError> {
        self.ingest_signal(asset_id, signal, false)
    }

    /// Oracle unreachable: record a neutral fallback row. The fundamental is
    /// left exactly where it was, but the tick still goes out so consumers
    /// see a fresh timestamp.
    pub fn apply_oracle_failure(&mut self, asset_id: AssetId) -> Result<Price, EngineError> {
        warn!(asset = asset_id.0, "oracle unavailable, applying neutral fallback");
        self.ingest_signal(asset_id, &OracleSignal::fallback(), true)
    }

    fn ingest_signal(
        &mut self,
        asset_id: AssetId,
        signal: &OracleSignal,
        is_fallback: bool,
    ) -> Result<Price, EngineError> {
        let max_delta = self.config.pricing.max_delta_percent;
        let clean = signal.sanitize(max_delta);

        let asset = self
            .assets
            .get_mut(&asset_id)
            .ok_or(EngineError::AssetNotFound(asset_id))?;

        let next = update_fundamental(
            asset.last_fundamental.value(),
            clean.delta_percent,
            &self.config.pricing,
        );
        asset.last_fundamental = Price::new_unchecked(next);
        asset.last_updated = self.current_time;

        info!(
            asset = asset_id.0,
            delta = %clean.delta_percent,
            confidence = %clean.confidence,
            fundamental = %next,
            fallback = is_fallback,
            "oracle signal applied"
        );

        self.oracle_logs.push(OracleLog {
            asset_id,
            delta_percent: clean.delta_percent,
            confidence: clean.confidence,
            summary: clean.summary,
            source_urls: clean.source_urls,
            is_fallback,
            created_at: self.current_time,
        });

        let mut tx = Tx::new();
        self.refresh_display_price(asset_id, &mut tx)?;
        self.commit(tx);

        let asset = self.assets.get(&asset_id).ok_or(EngineError::AssetNotFound(asset_id))?;
        Ok(asset.last_display_price)
    }

    /// Recompute the blended display price and queue a tick.
    pub(super) fn refresh_display_price(
        &mut self,
        asset_id: AssetId,
        tx: &mut Tx,
    ) -> Result<(), EngineError> {
        let asset = self
            .assets
            .get_mut(&asset_id)
            .ok_or(EngineError::AssetNotFound(asset_id))?;

        let combined = combine_price(
            asset.last_market_price,
            asset.last_fundamental,
            asset.vol_recent,
            &self.config.pricing,
        );
        asset.last_display_price = combined.display_price;

        tx.event(EventPayload::PriceTick {
            asset_id,
            price_display: asset.last_display_price,
            price_market: asset.last_market_price,
            price_fundamental: asset.last_fundamental,
            timestamp: self.current_time,
        });
        Ok(())
    }

    /// Close one volume window. The weight curve reads vol_recent, so a
    /// scheduler is expected to call this at a fixed cadence.
    pub fn reset_recent_volume(&mut self, asset_id: AssetId) -> Result<(), EngineError> {
        let asset = self
            .assets
            .get_mut(&asset_id)
            .ok_or(EngineError::AssetNotFound(asset_id))?;
        asset.vol_recent = rust_decimal::Decimal::ZERO;
        Ok(())
    }
}
