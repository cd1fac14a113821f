//! Network-wide message rate averages and the observed peak throughput.

use lino_types::Dec;
use tracing::debug;

use crate::model::{BandwidthInfo, BlockInfo};
use crate::params::BandwidthParams;

/// `prev * (1 - factor) + rate * factor`
pub fn update_ema(prev: Dec, factor: Dec, rate: Dec) -> Dec {
    prev * (Dec::one() - factor) + rate * factor
}

impl BandwidthInfo {
    /// Replace the peak with `total_mps` when it is larger.
    pub fn bump_max_mps(&mut self, total_mps: Dec) {
        if total_mps > self.max_mps {
            self.max_mps = total_mps;
        }
    }

    /// Fold one block's counters into the averages.
    ///
    /// Returns `false` without touching anything when the clock has not
    /// advanced since the previous block, so replaying a block at the same
    /// timestamp cannot count its messages twice.
    pub fn record_block(
        &mut self,
        stats: &BlockInfo,
        elapsed_secs: i64,
        params: &BandwidthParams,
    ) -> bool {
        if elapsed_secs <= 0 {
            return false;
        }

        let general_mps = Dec::from_ratio(stats.total_msg_signed_by_user, elapsed_secs);
        self.general_msg_ema = update_ema(
            self.general_msg_ema,
            params.general_msg_ema_factor,
            general_mps,
        );

        let app_mps = Dec::from_ratio(stats.total_msg_signed_by_app, elapsed_secs);
        self.app_msg_ema = update_ema(self.app_msg_ema, params.app_msg_ema_factor, app_mps);

        let total_mps = Dec::from_ratio(
            stats.total_msg_signed_by_user + stats.total_msg_signed_by_app,
            elapsed_secs,
        );
        self.bump_max_mps(total_mps);

        debug!(
            general_ema = %self.general_msg_ema,
            app_ema = %self.app_msg_ema,
            max_mps = %self.max_mps,
            elapsed_secs,
            "updated message rate averages"
        );
        true
    }

    /// Let an old traffic peak fade so capacity estimates follow current load.
    pub fn decay_max_mps(&mut self, decay_rate: Dec) {
        self.max_mps = self.max_mps * decay_rate;
    }
}
