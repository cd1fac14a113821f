//! Persisted rows of the bandwidth module.

use lino_types::{AccountKey, Coin, Dec, UnixTime};
use serde::{Deserialize, Serialize};

/// Network-wide decaying load averages, updated once per block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandwidthInfo {
    pub general_msg_ema: Dec,
    pub app_msg_ema: Dec,
    /// Highest total messages-per-second observed in a single block.
    pub max_mps: Dec,
}

/// Counters and prices for the block being processed.
///
/// The counters are zeroed at the start of each block; the two prices are
/// derived from the previous block's [`BandwidthInfo`] and stay fixed for
/// the rest of the block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub total_msg_signed_by_app: i64,
    pub total_msg_signed_by_user: i64,
    pub cur_msg_fee: Coin,
    /// Vacancy coefficient U applied to every app message in this block.
    pub cur_u: Dec,
}

/// Token bucket of one application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppBandwidthInfo {
    pub username: AccountKey,
    pub max_bandwidth_credit: Dec,
    /// May drop below zero after settlement; the deficit is paid back by refills.
    pub cur_bandwidth_credit: Dec,
    pub messages_in_cur_block: i64,
    pub expected_mps: Dec,
    pub last_refilled_at: UnixTime,
}

impl AppBandwidthInfo {
    /// A freshly allocated, fully funded bucket.
    pub fn new(username: AccountKey, expected_mps: Dec, max_credit: Dec, now: UnixTime) -> Self {
        Self {
            username,
            max_bandwidth_credit: max_credit,
            cur_bandwidth_credit: max_credit,
            messages_in_cur_block: 0,
            expected_mps,
            last_refilled_at: now,
        }
    }
}
