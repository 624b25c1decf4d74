//! Property-based tests for stress testing core math.
//!
//! These tests verify invariants hold under random inputs.

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use synth_core::*;

// Strategies for generating test data
fn price_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|x| Decimal::new(x, 2)) // $0.01 to $10,000
}

fn volume_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..100_000_000i64).prop_map(|x| Decimal::new(x, 2))
}

fn delta_strategy() -> impl Strategy<Value = Decimal> {
    (-20_000i64..=20_000i64).prop_map(|x| Decimal::new(x, 2)) // -200% to +200%
}

fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000i64).prop_map(|x| Decimal::new(x, 2))
}

proptest! {
    /// The market weight always stays inside its configured band.
    #[test]
    fn market_weight_bounded(vol in volume_strategy()) {
        let params = PricingParams::default();
        let w = market_weight(vol, &params);
        prop_assert!(w >= params.min_weight);
        prop_assert!(w <= params.max_weight);
    }

    /// More volume never decreases the market weight.
    #[test]
    fn market_weight_monotonic(
        vol in volume_strategy(),
        extra in 1i64..1_000_000i64,
    ) {
        let params = PricingParams::default();
        let lo = market_weight(vol, &params);
        let hi = market_weight(vol + Decimal::from(extra), &params);
        prop_assert!(hi >= lo);
    }

    /// One oracle update can move the fundamental by at most
    /// beta * max_delta, regardless of how wild the raw delta is.
    #[test]
    fn fundamental_update_bounded(
        f_prev in price_strategy(),
        delta in delta_strategy(),
    ) {
        let params = PricingParams::default();
        let next = update_fundamental(f_prev, delta, &params);

        let max_move = params.beta * f_prev * params.max_delta_percent / dec!(100);
        prop_assert!((next - f_prev).abs() <= max_move);
        prop_assert!(next > Decimal::ZERO);
    }

    /// The display price is a convex combination: always between the market
    /// and fundamental prices.
    #[test]
    fn display_price_between_inputs(
        market in price_strategy(),
        fundamental in price_strategy(),
        vol in volume_strategy(),
    ) {
        let params = PricingParams::default();
        let out = combine_price(
            Price::new_unchecked(market),
            Price::new_unchecked(fundamental),
            vol,
            &params,
        );
        let lo = market.min(fundamental);
        let hi = market.max(fundamental);
        prop_assert!(out.display_price.value() >= lo);
        prop_assert!(out.display_price.value() <= hi);
    }

    /// Minting then burning the same shares returns the contribution and
    /// leaves the pool where it started.
    #[test]
    fn pool_mint_burn_round_trip(
        seed in amount_strategy(),
        contribution in amount_strategy(),
    ) {
        let mut pool = LiquidityPool::new(PoolId(1), AssetId(1), Timestamp(0));
        pool.mint(Usdc::new(seed));

        let minted = pool.mint(Usdc::new(contribution));
        let payout = pool.burn(minted).unwrap();

        // NAV is 1:1 here, so the round trip is exact up to Decimal scale
        let diff = (payout.value() - contribution).abs();
        prop_assert!(diff < dec!(0.000001), "payout {} vs contribution {}", payout, contribution);
        prop_assert!((pool.total_lp_shares - seed).abs() < dec!(0.000001));
    }

    /// Fee accrual never mints shares and never lowers the value of an
    /// existing share.
    #[test]
    fn fee_accrual_raises_share_value(
        seed in amount_strategy(),
        fee in (1i64..1_000_000i64).prop_map(|x| Decimal::new(x, 2)),
    ) {
        let mut pool = LiquidityPool::new(PoolId(1), AssetId(1), Timestamp(0));
        pool.mint(Usdc::new(seed));

        let before = pool.usdc_for_shares(dec!(1));
        let shares_before = pool.total_lp_shares;
        pool.accrue_fee(Usdc::new(fee));

        prop_assert_eq!(pool.total_lp_shares, shares_before);
        prop_assert!(pool.usdc_for_shares(dec!(1)) >= before);
    }

    /// A buy and the matching sell move share counts symmetrically: what the
    /// buyer gains the seller loses.
    #[test]
    fn fill_share_deltas_symmetric(
        quantity in (1i64..100_000i64).prop_map(|x| Decimal::new(x, 4)),
        price in price_strategy(),
        buyer_start in -50_000i64..50_000i64,
        seller_start in -50_000i64..50_000i64,
    ) {
        let ts = Timestamp(0);
        let fill_price = Price::new_unchecked(price);

        let mut buyer = Position::new(UserId(1), AssetId(1), ts);
        buyer.shares = Shares::new(Decimal::new(buyer_start, 4));
        if buyer.shares.is_short() {
            buyer.avg_price = price;
            buyer.collateral = Usdc::new(buyer.shares.abs() * price);
        }
        let mut seller = Position::new(UserId(2), AssetId(1), ts);
        seller.shares = Shares::new(Decimal::new(seller_start, 4));
        if seller.shares.is_short() {
            seller.avg_price = price;
            seller.collateral = Usdc::new(seller.shares.abs() * price);
        }

        let buy = apply_buy(&buyer, quantity, fill_price, ts);
        let sell = apply_sell(&seller, quantity, fill_price, ts);

        let buyer_delta = buy.position.shares.value() - buyer.shares.value();
        let seller_delta = sell.position.shares.value() - seller.shares.value();
        prop_assert_eq!(buyer_delta, quantity);
        prop_assert_eq!(seller_delta, -quantity);
    }

    /// Vested fraction never decreases as time passes and never leaves [0, 1].
    #[test]
    fn vesting_monotonic(
        days_a in 0u32..400u32,
        days_b in 0u32..400u32,
    ) {
        let start = Timestamp::from_millis(0);
        let milestones = EngineConfig::default().vesting_milestones;
        let schedule = UnlockSchedule::new(UserId(1), PoolId(1), &milestones, start);

        let (early, late) = if days_a <= days_b { (days_a, days_b) } else { (days_b, days_a) };
        let f_early = schedule.vested_fraction(start.plus_days(early));
        let f_late = schedule.vested_fraction(start.plus_days(late));

        prop_assert!(f_early <= f_late);
        prop_assert!(f_early >= Decimal::ZERO && f_late <= Decimal::ONE);
    }

    /// Oracle sanitizing always lands in the accepted range.
    #[test]
    fn sanitize_in_range(
        delta in delta_strategy(),
        confidence in (-500i64..=500i64).prop_map(|x| Decimal::new(x, 2)),
    ) {
        let clean = OracleSignal::new(delta, confidence).sanitize(dec!(30));
        prop_assert!(clean.delta_percent >= dec!(-30) && clean.delta_percent <= dec!(30));
        prop_assert!(clean.confidence >= Decimal::ZERO && clean.confidence <= Decimal::ONE);
    }
}
