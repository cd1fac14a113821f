//! Per-block counters and the two prices fixed at the start of each block.

use lino_types::{Coin, Dec};
use tracing::warn;

use crate::errors::{BandwidthError, Result};
use crate::math::approx_exp;
use crate::model::{BandwidthInfo, BlockInfo};
use crate::params::BandwidthParams;

/// Capacity share of one message class: `ratio * max(expected_max_mps, max_mps)`.
pub fn msg_quota(ratio: Dec, info: &BandwidthInfo, params: &BandwidthParams) -> Result<Dec> {
    let capacity = params.expected_max_mps.max(info.max_mps);
    let quota = ratio * capacity;
    if !quota.is_positive() {
        warn!(%ratio, %capacity, "message quota is not positive");
        return Err(BandwidthError::InvalidMsgQuota { quota });
    }
    Ok(quota)
}

/// Fee in LNO a general message must pay:
/// `B * exp(A * (general_ema - quota) / quota)`.
pub fn compute_general_fee(info: &BandwidthInfo, params: &BandwidthParams) -> Result<Dec> {
    let quota = msg_quota(params.general_msg_quota_ratio, info, params)?;
    let load = (info.general_msg_ema - quota) / quota;
    approx_exp(load * params.msg_fee_factor_a)?
        .checked_mul(params.msg_fee_factor_b)
        .ok_or(BandwidthError::Overflow { context: "general message fee" })
}

/// Vacancy coefficient U: `exp(vacancy_factor * (app_ema - quota) / quota)`.
pub fn compute_vacancy(info: &BandwidthInfo, params: &BandwidthParams) -> Result<Dec> {
    let quota = msg_quota(params.app_msg_quota_ratio, info, params)?;
    let load = (info.app_msg_ema - quota) / quota;
    approx_exp(load * params.app_vacancy_factor)
}

impl BlockInfo {
    /// Price the coming block from the previous block's averages and zero
    /// the counters.
    pub fn start_block(&mut self, info: &BandwidthInfo, params: &BandwidthParams) -> Result<()> {
        let fee = compute_general_fee(info, params)?;
        let u = compute_vacancy(info, params)?;
        // Fee-to-coin is the only conversion that rounds to an integer.
        self.cur_msg_fee = Coin::from_dec_rounded(fee)
            .ok_or(BandwidthError::Overflow { context: "message fee in coins" })?;
        self.cur_u = u;
        self.clear();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.total_msg_signed_by_app = 0;
        self.total_msg_signed_by_user = 0;
    }

    pub fn add_msg_signed_by_user(&mut self, n: i64) {
        self.total_msg_signed_by_user += n;
    }

    pub fn add_msg_signed_by_app(&mut self, n: i64) {
        self.total_msg_signed_by_app += n;
    }
}
