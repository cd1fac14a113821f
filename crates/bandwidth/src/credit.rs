//! Per-app credit buckets and stake-weighted quota allocation.

use lino_types::{AccountKey, Coin, Dec, UnixTime};

use crate::errors::{BandwidthError, Result};
use crate::math::approx_exp;
use crate::model::AppBandwidthInfo;
use crate::params::BandwidthParams;

impl AppBandwidthInfo {
    /// Top the bucket up at `expected_mps` credits per second since the last
    /// refill, capped at `max_bandwidth_credit`.
    ///
    /// A full bucket or a clock that has not advanced leaves the row,
    /// including `last_refilled_at`, untouched.
    pub fn refill(&mut self, now: UnixTime) {
        if now <= self.last_refilled_at || self.cur_bandwidth_credit >= self.max_bandwidth_credit {
            return;
        }
        let elapsed = Dec::from_int(now - self.last_refilled_at);
        let refilled = self.cur_bandwidth_credit + self.expected_mps * elapsed;
        self.cur_bandwidth_credit = refilled.min(self.max_bandwidth_credit);
        self.last_refilled_at = now;
    }

    /// Reserve `u` credits for one message before its final cost is known.
    pub fn precheck_and_reserve(&mut self, u: Dec) -> Result<()> {
        if self.cur_bandwidth_credit < u {
            return Err(BandwidthError::AppBandwidthNotEnough {
                app: self.username.clone(),
                credit: self.cur_bandwidth_credit,
                cost: u,
            });
        }
        self.cur_bandwidth_credit -= u;
        self.messages_in_cur_block += 1;
        Ok(())
    }

    /// Swap the block's reservations for the real cost `u * p` per message.
    ///
    /// The balance may go negative; the deficit is repaid by later refills.
    /// On overflow the row is left untouched.
    pub fn settle(&mut self, u: Dec, p: Dec) -> Result<()> {
        let overflow = || BandwidthError::Overflow { context: "app credit settlement" };
        let n = Dec::from_int(self.messages_in_cur_block);
        let reserved = n.checked_mul(u).ok_or_else(overflow)?;
        let cost = u
            .checked_mul(p)
            .and_then(|per_msg| n.checked_mul(per_msg))
            .ok_or_else(overflow)?;
        self.cur_bandwidth_credit = self
            .cur_bandwidth_credit
            .checked_add(reserved)
            .and_then(|credit| credit.checked_sub(cost))
            .ok_or_else(overflow)?;
        self.messages_in_cur_block = 0;
        Ok(())
    }

    /// Punishment coefficient P for the messages sent in the current block.
    ///
    /// Exactly one while the app stays within its expected rate, growing
    /// exponentially with the relative overshoot.
    pub fn punishment(
        &self,
        now: UnixTime,
        last_block_time: UnixTime,
        params: &BandwidthParams,
    ) -> Result<Dec> {
        let elapsed = now - last_block_time;
        if elapsed <= 0 {
            return Ok(Dec::one());
        }
        if !self.expected_mps.is_positive() {
            return Err(BandwidthError::InvalidExpectedMPS {
                app: self.username.clone(),
                expected_mps: self.expected_mps,
            });
        }
        let cur_mps = Dec::from_ratio(self.messages_in_cur_block, elapsed);
        let overshoot = (cur_mps - self.expected_mps).max(Dec::zero());
        let exponent = overshoot
            .checked_quo(self.expected_mps)
            .and_then(|ratio| ratio.checked_mul(params.app_punishment_factor))
            .ok_or(BandwidthError::Overflow { context: "punishment exponent" })?;
        approx_exp(exponent)
    }
}

/// An app's slice of the app message quota.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaAllocation {
    pub app: AccountKey,
    pub expected_mps: Dec,
    pub max_credit: Dec,
}

/// Split `app_quota` between apps in proportion to their stake.
///
/// Returns nothing when there are no apps or no stake at all, in which case
/// existing allocations should be kept as they are.
pub fn allocate_quotas(
    stakes: &[(AccountKey, Coin)],
    app_quota: Dec,
    params: &BandwidthParams,
) -> Result<Vec<QuotaAllocation>> {
    let total = stakes
        .iter()
        .fold(Coin::zero(), |acc, (_, stake)| acc + *stake);
    if stakes.is_empty() || !total.is_positive() {
        return Ok(Vec::new());
    }
    let total = total.to_dec();

    stakes
        .iter()
        .map(|(app, stake)| {
            let share = stake.to_dec() / total;
            let expected_mps = app_quota * share;
            Ok(QuotaAllocation {
                app: app.clone(),
                expected_mps,
                max_credit: expected_mps * params.app_bandwidth_pool_size,
            })
        })
        .collect()
}

/// Apply a new allocation to an app's bucket.
///
/// A new app starts fully funded. An existing app is first refilled at its
/// old rate so the time already elapsed is credited at the rate that applied
/// during it.
pub fn apply_allocation(
    existing: Option<AppBandwidthInfo>,
    allocation: &QuotaAllocation,
    now: UnixTime,
) -> AppBandwidthInfo {
    match existing {
        None => AppBandwidthInfo::new(
            allocation.app.clone(),
            allocation.expected_mps,
            allocation.max_credit,
            now,
        ),
        Some(mut info) => {
            info.refill(now);
            info.expected_mps = allocation.expected_mps;
            info.max_bandwidth_credit = allocation.max_credit;
            info
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Dec {
        s.parse().unwrap()
    }

    fn app(name: &str) -> AccountKey {
        name.parse().unwrap()
    }

    fn bucket() -> AppBandwidthInfo {
        AppBandwidthInfo::new(app("dapp"), Dec::from_int(240), Dec::from_int(2400), 1_000)
    }

    #[test]
    fn refill_is_capped_and_skips_full_buckets() {
        let mut info = bucket();
        info.refill(1_003);
        assert_eq!(info.cur_bandwidth_credit, Dec::from_int(2400));
        assert_eq!(info.last_refilled_at, 1_000);

        info.cur_bandwidth_credit = Dec::from_int(100);
        info.refill(1_002);
        assert_eq!(info.cur_bandwidth_credit, Dec::from_int(580));
        assert_eq!(info.last_refilled_at, 1_002);

        info.refill(2_000);
        assert_eq!(info.cur_bandwidth_credit, Dec::from_int(2400));
    }

    #[test]
    fn refill_ignores_stale_clock() {
        let mut info = bucket();
        info.cur_bandwidth_credit = Dec::zero();
        info.refill(999);
        info.refill(1_000);
        assert_eq!(info.cur_bandwidth_credit, Dec::zero());
        assert_eq!(info.last_refilled_at, 1_000);
    }

    #[test]
    fn reserve_rejects_without_mutating() {
        let mut info = bucket();
        info.cur_bandwidth_credit = dec("0.5");
        let before = info.clone();

        let err = info.precheck_and_reserve(dec("0.6")).unwrap_err();
        assert!(err.is_rejection());
        assert_eq!(info, before);

        info.precheck_and_reserve(dec("0.5")).unwrap();
        assert_eq!(info.cur_bandwidth_credit, Dec::zero());
        assert_eq!(info.messages_in_cur_block, 1);
    }

    #[test]
    fn settle_charges_true_cost_and_may_go_negative() {
        let mut info = bucket();
        info.cur_bandwidth_credit = Dec::from_int(10);
        info.messages_in_cur_block = 10;

        info.settle(Dec::one(), Dec::from_int(3)).unwrap();
        assert_eq!(info.cur_bandwidth_credit, Dec::from_int(-10));
        assert_eq!(info.messages_in_cur_block, 0);
    }

    #[test]
    fn full_bucket_burst_in_one_second_settles() {
        let params = BandwidthParams::default();
        let u = dec("0.501692631996395802");
        let mut info = bucket();
        info.cur_bandwidth_credit = dec("0.404141161238879034");
        info.messages_in_cur_block = 4783;

        let p = info.punishment(1_001, 1_000, &params).unwrap();
        assert_eq!(p, dec("27695727763022675406715.419367183330966283"));
        info.settle(u, p).unwrap();
        assert_eq!(
            info.cur_bandwidth_credit,
            dec("-66458553647674917130512452.526839087225910067")
        );
    }

    #[test]
    fn settle_overflow_leaves_row_untouched() {
        let mut info = bucket();
        info.messages_in_cur_block = 10;
        let before = info.clone();
        let p = format!("2{}", "0".repeat(58)).parse().unwrap();

        let err = info.settle(Dec::one(), p).unwrap_err();
        assert!(matches!(err, BandwidthError::Overflow { .. }));
        assert_eq!(info, before);
    }

    #[test]
    fn unbounded_overshoot_is_an_error_not_a_panic() {
        let params = BandwidthParams::default();
        let mut info = bucket();
        info.expected_mps = dec("0.000001");
        info.messages_in_cur_block = 1_000_000;
        let err = info.punishment(1_001, 1_000, &params).unwrap_err();
        assert!(matches!(err, BandwidthError::Overflow { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn punishment_is_one_within_expected_rate() {
        let params = BandwidthParams::default();
        let mut info = bucket();
        info.messages_in_cur_block = 720;
        assert_eq!(info.punishment(1_003, 1_000, &params).unwrap(), Dec::one());

        info.messages_in_cur_block = 1000;
        assert_eq!(
            info.punishment(1_003, 1_000, &params).unwrap(),
            dec("2.969252845969129897")
        );
        assert_eq!(info.punishment(1_000, 1_000, &params).unwrap(), Dec::one());
    }

    #[test]
    fn punishment_requires_positive_expected_rate() {
        let params = BandwidthParams::default();
        let mut info = bucket();
        info.expected_mps = Dec::zero();
        let err = info.punishment(1_003, 1_000, &params).unwrap_err();
        assert!(matches!(err, BandwidthError::InvalidExpectedMPS { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn allocation_is_proportional_to_stake() {
        let params = BandwidthParams::default();
        let stakes = vec![
            (app("big"), Coin::from_lno(300)),
            (app("small"), Coin::from_lno(100)),
        ];
        let allocations = allocate_quotas(&stakes, Dec::from_int(240), &params).unwrap();
        assert_eq!(allocations[0].expected_mps, Dec::from_int(180));
        assert_eq!(allocations[0].max_credit, Dec::from_int(1800));
        assert_eq!(allocations[1].expected_mps, Dec::from_int(60));
    }

    #[test]
    fn allocation_without_stake_is_empty() {
        let params = BandwidthParams::default();
        assert!(allocate_quotas(&[], Dec::from_int(240), &params).unwrap().is_empty());
        let stakes = vec![(app("idle"), Coin::zero())];
        assert!(allocate_quotas(&stakes, Dec::from_int(240), &params)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn existing_bucket_refills_at_old_rate_before_resize() {
        let mut existing = bucket();
        existing.cur_bandwidth_credit = Dec::zero();
        let allocation = QuotaAllocation {
            app: app("dapp"),
            expected_mps: Dec::from_int(100),
            max_credit: Dec::from_int(1000),
        };

        let updated = apply_allocation(Some(existing), &allocation, 1_002);
        assert_eq!(updated.cur_bandwidth_credit, Dec::from_int(480));
        assert_eq!(updated.expected_mps, Dec::from_int(100));
        assert_eq!(updated.max_bandwidth_credit, Dec::from_int(1000));

        let fresh = apply_allocation(None, &allocation, 1_002);
        assert_eq!(fresh.cur_bandwidth_credit, Dec::from_int(1000));
        assert_eq!(fresh.last_refilled_at, 1_002);
    }
}
