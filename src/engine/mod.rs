// 8.0: core exchange engine. coordinates order execution, dual-price
// updates, pool contributions and withdrawals, and the ledger commit
// pipeline. deterministic and event-driven with no external I/O.

mod core;
mod orders;
mod pools;
mod pricing;
mod results;

pub use self::core::Engine;
pub use results::{
    ContributionResult, EngineError, OrderResult, QueueProcessResult, WithdrawalResult,
};
