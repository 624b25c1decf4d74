//! Synthetic Asset Exchange Core Simulation.
//!
//! Demonstrates the engine lifecycle: pool funding and activation, order
//! matching with price improvement, dual-price oracle updates, short
//! collateral, vesting withdrawals, and ledger reconciliation.

use rust_decimal_macros::dec;
use synth_core::*;

fn main() {
    println!("Synthetic Asset Exchange Core Simulation");
    println!("Single Asset, Pooled Liquidity, Full Lifecycle\n");

    scenario_1_funding_and_activation();
    scenario_2_order_matching();
    scenario_3_dual_price();
    scenario_4_short_selling();
    scenario_5_vesting_and_queue();
    scenario_6_ledger_audit();

    println!("\nAll simulations completed successfully.");
}

fn demo_asset() -> AssetConfig {
    AssetConfig {
        id: AssetId(1),
        name: "Synthetic OpenAI".to_string(),
        symbol: "sOAI".to_string(),
        soft_cap: dec!(5000),
        hard_cap: dec!(100000),
        curve: CurveParams { p0: dec!(10), k: dec!(0) },
        funding_deadline: None,
    }
}

/// Engine with one active asset and two funded traders, for the scenarios
/// that start past the funding phase.
fn active_engine() -> (Engine, UserId, UserId) {
    let mut engine = Engine::new(EngineConfig::default()).unwrap();
    engine.create_asset(demo_asset());

    let lp = engine.create_account();
    engine.deposit(lp, Usdc::new(dec!(10000))).unwrap();
    engine.contribute(lp, AssetId(1), Usdc::new(dec!(5000))).unwrap();

    let alice = engine.create_account();
    let bob = engine.create_account();
    engine.deposit(alice, Usdc::new(dec!(1000))).unwrap();
    engine.deposit(bob, Usdc::new(dec!(1000))).unwrap();

    (engine, alice, bob)
}

/// Pool funding crosses the soft cap and activates the asset.
fn scenario_1_funding_and_activation() {
    println!("Scenario 1: Funding and Activation\n");

    let mut engine = Engine::new(EngineConfig::default()).unwrap();
    let (asset_id, pool_id) = engine.create_asset(demo_asset());

    let lp1 = engine.create_account();
    let lp2 = engine.create_account();
    engine.deposit(lp1, Usdc::new(dec!(10000))).unwrap();
    engine.deposit(lp2, Usdc::new(dec!(10000))).unwrap();

    let r = engine.contribute(lp1, asset_id, Usdc::new(dec!(3000))).unwrap();
    println!("  LP1 contributes $3,000 -> {} LP shares, asset still funding", r.lp_shares_minted);

    let r = engine.contribute(lp2, asset_id, Usdc::new(dec!(2000))).unwrap();
    println!(
        "  LP2 contributes $2,000 -> {} LP shares, activated: {}",
        r.lp_shares_minted,
        r.activated_asset.is_some()
    );

    let r = engine.contribute(lp1, asset_id, Usdc::new(dec!(1000))).unwrap();
    let pool = engine.get_pool(pool_id).unwrap();
    println!(
        "  LP1 adds $1,000 at NAV -> {} shares, pool holds ${} / {} shares\n",
        r.lp_shares_minted, pool.total_usdc, pool.total_lp_shares
    );
}

/// Price-time matching with maker price improvement and buyer refund.
fn scenario_2_order_matching() {
    println!("Scenario 2: Order Matching\n");

    let (mut engine, alice, bob) = active_engine();

    let sell = engine
        .submit_order(bob, AssetId(1), Side::Sell, dec!(5), Price::new_unchecked(dec!(10)))
        .unwrap();
    println!("  Bob places SELL 5 @ $10, posted: {}", sell.is_posted);

    let buy = engine
        .submit_order(alice, AssetId(1), Side::Buy, dec!(3), Price::new_unchecked(dec!(12)))
        .unwrap();
    println!(
        "  Alice places BUY 3 @ $12 -> filled {} @ ${}, refund ${}",
        buy.filled_quantity,
        buy.average_price.unwrap(),
        buy.refund
    );

    let position = engine.get_position(alice, AssetId(1)).unwrap();
    println!("  Alice holds {} shares @ ${}", position.shares, position.avg_price);

    let book = engine.get_book(AssetId(1)).unwrap();
    println!("  Best ask after the trade: ${}\n", book.best_ask().unwrap());
}

/// Oracle deltas are clamped and smoothed; volume shifts the blend.
fn scenario_3_dual_price() {
    println!("Scenario 3: Dual-Price Engine\n");

    let (mut engine, alice, bob) = active_engine();

    let asset = engine.get_asset(AssetId(1)).unwrap();
    println!("  Curve seeds all prices at ${}", asset.last_display_price);

    let display = engine
        .apply_oracle_signal(AssetId(1), &OracleSignal::new(dec!(50), dec!(0.9)))
        .unwrap();
    println!("  Oracle says +50%, clamped to +30%, smoothed -> display ${}", display);

    engine
        .submit_order(bob, AssetId(1), Side::Sell, dec!(10), Price::new_unchecked(dec!(12)))
        .unwrap();
    engine
        .submit_order(alice, AssetId(1), Side::Buy, dec!(10), Price::new_unchecked(dec!(12)))
        .unwrap();

    let asset = engine.get_asset(AssetId(1)).unwrap();
    println!(
        "  After $120 of trading at $12: market ${}, fundamental ${}, display ${}",
        asset.last_market_price, asset.last_fundamental, asset.last_display_price
    );

    let display = engine.apply_oracle_failure(AssetId(1)).unwrap();
    println!("  Oracle outage: neutral fallback, display stays ${}\n", display);
}

/// Selling without shares opens a short backed by locked collateral.
fn scenario_4_short_selling() {
    println!("Scenario 4: Short Selling\n");

    let (mut engine, alice, bob) = active_engine();

    engine
        .submit_order(bob, AssetId(1), Side::Sell, dec!(4), Price::new_unchecked(dec!(10)))
        .unwrap();
    engine
        .submit_order(alice, AssetId(1), Side::Buy, dec!(4), Price::new_unchecked(dec!(10)))
        .unwrap();

    let short = engine.get_position(bob, AssetId(1)).unwrap();
    println!(
        "  Bob is short {} shares @ ${}, collateral locked ${}",
        short.shares.abs(),
        short.avg_price,
        short.collateral
    );

    println!(
        "  Short value at $8: ${}",
        short.value(Price::new_unchecked(dec!(8)))
    );
    println!(
        "  Short value at $12: ${}\n",
        short.value(Price::new_unchecked(dec!(12)))
    );
}

/// Vesting milestones gate withdrawals; the queue drains FIFO.
fn scenario_5_vesting_and_queue() {
    println!("Scenario 5: Vesting and Withdrawal Queue\n");

    let mut engine = Engine::new(EngineConfig::fast_vesting()).unwrap();
    let (asset_id, pool_id) = engine.create_asset(demo_asset());

    let lp = engine.create_account();
    engine.deposit(lp, Usdc::new(dec!(10000))).unwrap();
    engine.contribute(lp, asset_id, Usdc::new(dec!(6000))).unwrap();

    let early = engine.withdraw_instant(lp, pool_id, Usdc::new(dec!(100)));
    println!("  Day 0 instant withdrawal: {}", if early.is_err() { "rejected, nothing vested" } else { "paid" });

    engine.advance_days(1);
    let allowance = engine.instant_allowance(pool_id, lp).unwrap();
    println!("  Day 1: 50% vested, instant allowance ${}", allowance);

    let paid = engine.withdraw_instant(lp, pool_id, Usdc::new(dec!(500))).unwrap();
    println!("  Instant withdrawal pays ${}, burns {} shares", paid.amount_paid, paid.lp_shares_burned);

    let queued = engine.queue_withdrawal(lp, pool_id, Usdc::new(dec!(1000))).unwrap();
    println!("  $1,000 queued as row {}", queued.queued_id.unwrap());

    let processed = engine.process_withdrawal_queue(pool_id).unwrap();
    println!(
        "  Queue drained: {} rows, ${} paid\n",
        processed.rows_processed, processed.total_paid
    );
}

/// Every hot balance is reproducible from the ledger alone.
fn scenario_6_ledger_audit() {
    println!("Scenario 6: Ledger Audit\n");

    let (mut engine, alice, bob) = active_engine();

    engine
        .submit_order(bob, AssetId(1), Side::Sell, dec!(5), Price::new_unchecked(dec!(10)))
        .unwrap();
    engine
        .submit_order(alice, AssetId(1), Side::Buy, dec!(3), Price::new_unchecked(dec!(12)))
        .unwrap();
    engine.withdraw(alice, Usdc::new(dec!(100))).unwrap();

    for user in [alice, bob] {
        let hot = engine.get_account(user).unwrap().hot_balance;
        let replayed = engine.ledger_balance(user);
        println!(
            "  User {}: hot balance ${}, ledger replay ${}, match: {}",
            user.0,
            hot,
            replayed,
            hot == replayed
        );
    }
    println!("  {} ledger entries recorded", engine.ledger_entries().len());
}
