use lino_bandwidth::rate_stats::update_ema;
use lino_bandwidth::{approx_exp, AppBandwidthInfo, BandwidthError, BandwidthParams};
use lino_types::Dec;
use proptest::prelude::*;

// Exponents valid state can produce, with three fractional digits. Fee and
// vacancy exponents stay within about +-25; a full default bucket spent in a
// one-second block gives a punishment exponent of about
// 2.8 * (10 / e^-0.69 - 1) = 53. Below -20 results round to the same
// 18-digit value, so strict monotonicity is only checked above it.
fn exponent() -> impl Strategy<Value = Dec> {
    (-20_000i64..=120_000).prop_map(|milli| Dec::from_ratio(milli, 1000))
}

fn bucket(expected_mps: i64, pool: i64, credit: i64) -> AppBandwidthInfo {
    let mut info = AppBandwidthInfo::new(
        "dapp".parse().unwrap(),
        Dec::from_int(expected_mps),
        Dec::from_int(expected_mps * pool),
        0,
    );
    info.cur_bandwidth_credit = Dec::from_int(credit);
    info
}

proptest! {
    #[test]
    fn exp_is_strictly_increasing(a in exponent(), b in exponent()) {
        prop_assume!(a != b);
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        prop_assert!(approx_exp(lo).unwrap() < approx_exp(hi).unwrap());
    }
}

proptest! {
    #[test]
    fn exp_never_panics(x in -1_000_000_000i64..=1_000_000_000) {
        match approx_exp(Dec::from_int(x)) {
            Ok(y) => prop_assert!(!y.is_negative()),
            Err(err) => {
                let is_overflow = matches!(err, BandwidthError::Overflow { .. });
                prop_assert!(is_overflow);
            }
        }
    }
}

proptest! {
    #[test]
    fn ema_converges_monotonically(
        rate in 0i64..=10_000,
        start in 0i64..=10_000,
        factor_pct in 1i64..=100,
    ) {
        let rate = Dec::from_int(rate);
        let factor = Dec::from_ratio(factor_pct, 100);
        let mut ema = Dec::from_int(start);
        let mut distance = (ema - rate).abs();

        for _ in 0..50 {
            ema = update_ema(ema, factor, rate);
            let next = (ema - rate).abs();
            prop_assert!(next <= distance, "ema moved away: {} -> {}", distance, next);
            distance = next;
        }
    }
}

proptest! {
    #[test]
    fn refill_never_exceeds_max_credit(
        expected_mps in 1i64..=1_000,
        pool in 1i64..=20,
        credit in -100_000i64..=20_000,
        steps in prop::collection::vec(-10i64..=5_000, 1..30),
    ) {
        let mut info = bucket(expected_mps, pool, credit);
        let start = info.cur_bandwidth_credit;
        let mut now = 0;
        for step in steps {
            now += step;
            info.refill(now);
            prop_assert!(info.cur_bandwidth_credit <= info.max_bandwidth_credit.max(start));
        }
    }
}

proptest! {
    #[test]
    fn punishment_is_one_within_expected_rate(
        expected_mps in 1i64..=1_000,
        elapsed in 1i64..=60,
        fraction_pct in 0i64..=100,
    ) {
        let params = BandwidthParams::default();
        let mut info = bucket(expected_mps, 10, 0);
        info.messages_in_cur_block = expected_mps * elapsed * fraction_pct / 100;
        let p = info.punishment(1_000 + elapsed, 1_000, &params).unwrap();
        prop_assert_eq!(p, Dec::one());
    }
}

proptest! {
    #[test]
    fn punishment_grows_with_overshoot(
        expected_mps in 1i64..=1_000,
        overshoot_pct in 1i64..=1_900,
        elapsed in 1i64..=5,
    ) {
        // with U >= e^-0.69 a bucket of 10 * expected_mps credits admits at
        // most about 20 * expected_mps messages in one block
        let params = BandwidthParams::default();
        let mut info = bucket(expected_mps, 10, 0);
        let expected = expected_mps * elapsed;
        let extra = (expected * overshoot_pct / 100).max(1);
        info.messages_in_cur_block = expected + extra;

        let p = info.punishment(1_000 + elapsed, 1_000, &params).unwrap();
        prop_assert!(p > Dec::one());

        info.messages_in_cur_block += 1;
        let steeper = info.punishment(1_000 + elapsed, 1_000, &params).unwrap();
        prop_assert!(steeper >= p);

        info.messages_in_cur_block -= 1;
        let u = Dec::from_ratio(1, 2);
        prop_assert!(info.settle(u, p).is_ok());
        prop_assert!(info.cur_bandwidth_credit.is_negative());
    }
}
