//! Domain events published after commit.
//!
//! Publishing is fire-and-forget: the engine commits its state first and
//! then hands every buffered event to the publisher. A slow or failing
//! publisher can never roll a committed operation back.

use crate::types::{AssetId, OrderId, PoolId, Price, Timestamp, TradeId, Usdc, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const TOPIC_TRADES: &str = "trades.executed";
pub const TOPIC_PRICES: &str = "prices.updated";
pub const TOPIC_ORDERBOOK: &str = "orderbook.changed";
pub const TOPIC_POOLS: &str = "pools.changed";
pub const TOPIC_ASSETS: &str = "assets.lifecycle";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventPayload {
    Trade {
        asset_id: AssetId,
        trade_id: TradeId,
        price: Price,
        quantity: Decimal,
        buyer_id: UserId,
        seller_id: UserId,
        timestamp: Timestamp,
    },
    PriceTick {
        asset_id: AssetId,
        price_display: Price,
        price_market: Price,
        price_fundamental: Price,
        timestamp: Timestamp,
    },
    OrderBookChanged {
        asset_id: AssetId,
        order_id: OrderId,
        timestamp: Timestamp,
    },
    PoolContribution {
        pool_id: PoolId,
        user_id: UserId,
        amount: Usdc,
        lp_shares_minted: Decimal,
        timestamp: Timestamp,
    },
    PoolWithdrawal {
        pool_id: PoolId,
        user_id: UserId,
        amount: Usdc,
        lp_shares_burned: Decimal,
        queued: bool,
        timestamp: Timestamp,
    },
    AssetActivated {
        asset_id: AssetId,
        pool_id: PoolId,
        timestamp: Timestamp,
    },
}

impl EventPayload {
    pub fn topic(&self) -> &'static str {
        match self {
            EventPayload::Trade { .. } => TOPIC_TRADES,
            EventPayload::PriceTick { .. } => TOPIC_PRICES,
            EventPayload::OrderBookChanged { .. } => TOPIC_ORDERBOOK,
            EventPayload::PoolContribution { .. } | EventPayload::PoolWithdrawal { .. } => {
                TOPIC_POOLS
            }
            EventPayload::AssetActivated { .. } => TOPIC_ASSETS,
        }
    }
}

/// Sink for committed events. Implementations must not fail the caller.
pub trait EventPublisher {
    fn publish(&mut self, topic: &str, payload: &EventPayload);
}

/// Discards everything. Default for embedding the engine without a bus.
#[derive(Debug, Default)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&mut self, _topic: &str, _payload: &EventPayload) {}
}

/// Buffers events for inspection. Used by tests and the simulator.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    pub published: Vec<(String, EventPayload)>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of_topic<'a>(&'a self, topic: &'a str) -> impl Iterator<Item = &'a EventPayload> {
        self.published
            .iter()
            .filter(move |(t, _)| t == topic)
            .map(|(_, p)| p)
    }
}

impl EventPublisher for MemoryPublisher {
    fn publish(&mut self, topic: &str, payload: &EventPayload) {
        self.published.push((topic.to_string(), payload.clone()));
    }
}

// Shared handle so a test can keep inspecting the sink after handing it to
// the engine.
impl EventPublisher for std::rc::Rc<std::cell::RefCell<MemoryPublisher>> {
    fn publish(&mut self, topic: &str, payload: &EventPayload) {
        self.borrow_mut().publish(topic, payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn topics_route_by_variant() {
        let tick = EventPayload::PriceTick {
            asset_id: AssetId(1),
            price_display: Price::new_unchecked(dec!(10.4)),
            price_market: Price::new_unchecked(dec!(10)),
            price_fundamental: Price::new_unchecked(dec!(10.6)),
            timestamp: Timestamp(0),
        };
        assert_eq!(tick.topic(), TOPIC_PRICES);

        let activated = EventPayload::AssetActivated {
            asset_id: AssetId(1),
            pool_id: PoolId(1),
            timestamp: Timestamp(0),
        };
        assert_eq!(activated.topic(), TOPIC_ASSETS);
    }

    #[test]
    fn payloads_serialize_with_type_tag() {
        let event = EventPayload::AssetActivated {
            asset_id: AssetId(3),
            pool_id: PoolId(7),
            timestamp: Timestamp(42),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "AssetActivated");
        assert_eq!(json["pool_id"], 7);
    }

    #[test]
    fn memory_publisher_filters_by_topic() {
        let mut publisher = MemoryPublisher::new();
        let event = EventPayload::OrderBookChanged {
            asset_id: AssetId(1),
            order_id: OrderId(1),
            timestamp: Timestamp(0),
        };
        publisher.publish(event.topic(), &event);
        publisher.publish(
            TOPIC_ASSETS,
            &EventPayload::AssetActivated {
                asset_id: AssetId(1),
                pool_id: PoolId(1),
                timestamp: Timestamp(0),
            },
        );

        assert_eq!(publisher.of_topic(TOPIC_ORDERBOOK).count(), 1);
        assert_eq!(publisher.of_topic(TOPIC_POOLS).count(), 0);
    }
}
