// synth-core: synthetic asset exchange engine.
// accounting-first architecture: every balance move is a ledger entry.
// all computation is deterministic with no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: AssetId, Side, Price, Usdc, Shares
//   2.x  order.rs: CLOB order book and price-time matching
//   3.x  pricing.rs: dual-price blend: market weight, fundamental EMA
//   3.5  oracle.rs: oracle signal sanitizing, fallback, audit log
//   4.x  position.rs: signed share positions, short collateral
//   5.x  account.rs: hot balances
//   5.5  ledger.rs: append-only ledger, balance reconstruction
//   6.x  asset.rs: asset lifecycle: Funding -> Active, Paused
//   7.x  pool.rs: LP share NAV math, withdrawal queue rows
//   7.5  vesting.rs: cumulative unlock schedules
//   8.x  engine/: core engine: orders, pools, pricing, commit pipeline
//   9.x  events.rs: post-commit domain events
//   10.x config.rs: fees, vesting milestones, pricing params

// core trading modules
pub mod account;
pub mod asset;
pub mod engine;
pub mod events;
pub mod ledger;
pub mod order;
pub mod position;
pub mod types;

// pricing modules
pub mod oracle;
pub mod pricing;

// liquidity modules
pub mod pool;
pub mod vesting;

pub mod config;

// re exports for convenience
pub use account::*;
pub use asset::*;
pub use config::{ConfigError, EngineConfig};
pub use engine::*;
pub use events::*;
pub use ledger::*;
pub use oracle::*;
pub use order::*;
pub use pool::*;
pub use position::*;
pub use pricing::*;
pub use types::*;
pub use vesting::*;
