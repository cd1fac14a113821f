//! Bandwidth parameters owned by the param module and read once per call.

use lino_types::Dec;
use serde::{Deserialize, Serialize};

use crate::errors::{BandwidthError, Result};

/// Coefficients of the fee, vacancy and punishment curves.
///
/// Missing fields deserialize to their genesis values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandwidthParams {
    /// Share of network capacity reserved for general (fee-paying) messages.
    pub general_msg_quota_ratio: Dec,
    /// EMA smoothing factor for the general message rate.
    pub general_msg_ema_factor: Dec,
    /// Share of network capacity reserved for app-signed messages.
    pub app_msg_quota_ratio: Dec,
    /// EMA smoothing factor for the app message rate.
    pub app_msg_ema_factor: Dec,
    /// Capacity floor used until the observed peak exceeds it.
    pub expected_max_mps: Dec,
    /// Steepness of the general fee curve.
    pub msg_fee_factor_a: Dec,
    /// Fee in LNO when general traffic sits exactly at its quota.
    pub msg_fee_factor_b: Dec,
    /// Multiplier applied to the observed peak by the periodic decay.
    pub max_mps_decay_rate: Dec,
    /// Credit bucket size in seconds of expected traffic.
    pub app_bandwidth_pool_size: Dec,
    pub app_vacancy_factor: Dec,
    pub app_punishment_factor: Dec,
}

impl Default for BandwidthParams {
    fn default() -> Self {
        Self {
            general_msg_quota_ratio: Dec::from_ratio(20, 100),
            general_msg_ema_factor: Dec::from_ratio(1, 10),
            app_msg_quota_ratio: Dec::from_ratio(80, 100),
            app_msg_ema_factor: Dec::from_ratio(1, 10),
            expected_max_mps: Dec::from_int(300),
            msg_fee_factor_a: Dec::from_int(6),
            msg_fee_factor_b: Dec::from_int(10),
            max_mps_decay_rate: Dec::from_ratio(99, 100),
            app_bandwidth_pool_size: Dec::from_int(10),
            app_vacancy_factor: Dec::from_ratio(69, 100),
            app_punishment_factor: Dec::from_ratio(14, 5),
        }
    }
}

impl BandwidthParams {
    pub fn validate(&self) -> Result<()> {
        let unit_interval = [
            ("general_msg_quota_ratio", self.general_msg_quota_ratio),
            ("general_msg_ema_factor", self.general_msg_ema_factor),
            ("app_msg_quota_ratio", self.app_msg_quota_ratio),
            ("app_msg_ema_factor", self.app_msg_ema_factor),
            ("max_mps_decay_rate", self.max_mps_decay_rate),
        ];
        for (name, value) in unit_interval {
            if value.is_negative() || value > Dec::one() {
                return Err(BandwidthError::InvalidParams(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        let positive = [
            ("expected_max_mps", self.expected_max_mps),
            ("msg_fee_factor_b", self.msg_fee_factor_b),
            ("app_bandwidth_pool_size", self.app_bandwidth_pool_size),
        ];
        for (name, value) in positive {
            if !value.is_positive() {
                return Err(BandwidthError::InvalidParams(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }

        let non_negative = [
            ("msg_fee_factor_a", self.msg_fee_factor_a),
            ("app_vacancy_factor", self.app_vacancy_factor),
            ("app_punishment_factor", self.app_punishment_factor),
        ];
        for (name, value) in non_negative {
            if value.is_negative() {
                return Err(BandwidthError::InvalidParams(format!(
                    "{name} must not be negative, got {value}"
                )));
            }
        }
        Ok(())
    }
}
