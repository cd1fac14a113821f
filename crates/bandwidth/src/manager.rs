//! Block lifecycle of the bandwidth module.
//!
//! The chain drives a [`BandwidthManager`] strictly in order:
//! `begin_blocker`, then `check_bandwidth` once per message in transaction
//! order, then `end_blocker`. Quota reallocation and peak decay are run by
//! periodic drivers between blocks.

use lino_storage::KvStore;
use lino_types::{AccountKey, Coin};
use tracing::{debug, info, trace, warn};

use crate::block_stats::msg_quota;
use crate::credit::{allocate_quotas, apply_allocation};
use crate::deps::{BlockContext, Dependencies, InflationPool};
use crate::errors::{BandwidthError, Result};
use crate::model::{AppBandwidthInfo, BandwidthInfo, BlockInfo};
use crate::params::BandwidthParams;
use crate::storage::BandwidthStorage;

/// Height at which quotas are first allocated.
const BOOTSTRAP_HEIGHT: i64 = 1;

pub struct BandwidthManager<S> {
    storage: BandwidthStorage<S>,
    deps: Dependencies,
    /// Keep every check but skip fee transfers.
    simulate: bool,
}

impl<S: KvStore> BandwidthManager<S> {
    pub fn new(store: S, deps: Dependencies, simulate: bool) -> Self {
        Self {
            storage: BandwidthStorage::new(store),
            deps,
            simulate,
        }
    }

    pub fn is_simulation(&self) -> bool {
        self.simulate
    }

    pub fn init_genesis(&self) -> Result<()> {
        self.params()?;
        self.storage.init_genesis()?;
        info!("bandwidth genesis state initialized");
        Ok(())
    }

    /// Fix the general fee and the vacancy coefficient for this block.
    pub fn begin_blocker(&self, ctx: &BlockContext) -> Result<()> {
        if ctx.height == BOOTSTRAP_HEIGHT {
            self.recalculate_app_bandwidth_info(ctx)?;
        }

        let params = self.params()?;
        let info = self.storage.get_bandwidth_info()?;
        let mut block = self.storage.get_block_info()?;
        block.start_block(&info, &params)?;
        self.storage.set_block_info(&block)?;

        debug!(
            height = ctx.height,
            fee = %block.cur_msg_fee,
            u = %block.cur_u,
            "priced block"
        );
        Ok(())
    }

    /// Admit or reject one message paid for by `payer`.
    ///
    /// A rejected message leaves every row untouched.
    pub fn check_bandwidth(
        &self,
        ctx: &BlockContext,
        payer: &AccountKey,
        declared_fee: Coin,
    ) -> Result<()> {
        match self.deps.affiliations.resolve_app(payer)? {
            Some(app) => self.check_app_bandwidth(ctx, payer, &app),
            None => self.check_user_fee(payer, declared_fee),
        }
    }

    fn check_app_bandwidth(
        &self,
        ctx: &BlockContext,
        payer: &AccountKey,
        app: &AccountKey,
    ) -> Result<()> {
        let mut info = self
            .storage
            .get_app_bandwidth_info(app)?
            .ok_or_else(|| BandwidthError::AppNotParticipating { app: app.clone() })?;
        let mut block = self.storage.get_block_info()?;

        info.refill(ctx.time);
        info.precheck_and_reserve(block.cur_u)?;
        block.add_msg_signed_by_app(1);

        self.storage.set_app_bandwidth_info(&info)?;
        self.storage.set_block_info(&block)?;
        trace!(%payer, %app, credit = %info.cur_bandwidth_credit, "app message admitted");
        Ok(())
    }

    fn check_user_fee(&self, payer: &AccountKey, declared_fee: Coin) -> Result<()> {
        let mut block = self.storage.get_block_info()?;
        if declared_fee < block.cur_msg_fee {
            return Err(BandwidthError::UserMsgFeeNotEnough {
                required: block.cur_msg_fee,
                provided: declared_fee,
            });
        }

        let fee = block.cur_msg_fee;
        if fee.is_positive() {
            let balance = self.deps.ledger.balance(payer)?;
            if balance < fee {
                return Err(BandwidthError::InsufficientBalance {
                    account: payer.clone(),
                    balance,
                    required: fee,
                });
            }
            if !self.simulate {
                self.deps
                    .ledger
                    .transfer_to_pool(payer, InflationPool::Validator, fee)?;
            }
        }
        block.add_msg_signed_by_user(1);
        self.storage.set_block_info(&block)?;
        trace!(%payer, %fee, "general message admitted");
        Ok(())
    }

    /// Update the rate averages and settle every app that sent messages.
    pub fn end_blocker(&self, ctx: &BlockContext) -> Result<()> {
        let params = self.params()?;
        let last_block_time = self.deps.clock.last_block_time()?;
        let block = self.storage.get_block_info()?;

        let mut info = self.storage.get_bandwidth_info()?;
        if info.record_block(&block, ctx.time - last_block_time, &params) {
            self.storage.set_bandwidth_info(&info)?;
        } else {
            debug!(
                height = ctx.height,
                time = ctx.time,
                last_block_time,
                "clock did not advance, rate averages unchanged"
            );
        }

        for mut app in self.storage.get_all_app_bandwidth_info()? {
            if app.messages_in_cur_block <= 0 {
                continue;
            }
            let p = app
                .punishment(ctx.time, last_block_time, &params)
                .inspect_err(|err| warn!(app = %app.username, %err, "cannot settle app"))?;
            let messages = app.messages_in_cur_block;
            app.settle(block.cur_u, p)
                .inspect_err(|err| warn!(app = %app.username, %p, %err, "cannot settle app"))?;
            self.storage.set_app_bandwidth_info(&app)?;
            debug!(
                app = %app.username,
                messages,
                p = %p,
                credit = %app.cur_bandwidth_credit,
                "settled app bandwidth"
            );
        }
        Ok(())
    }

    /// Split the app quota between live apps by stake.
    ///
    /// Leaves existing allocations in place when there are no live apps or
    /// none of them has stake.
    pub fn recalculate_app_bandwidth_info(&self, ctx: &BlockContext) -> Result<()> {
        let params = self.params()?;
        let info = self.storage.get_bandwidth_info()?;

        let stakes = self
            .deps
            .apps
            .list_live_apps()?
            .into_iter()
            .map(|app| {
                let stake = self.deps.stakes.stake(&app)?;
                Ok((app, stake))
            })
            .collect::<Result<Vec<_>>>()?;

        let app_quota = msg_quota(params.app_msg_quota_ratio, &info, &params)?;
        let allocations = allocate_quotas(&stakes, app_quota, &params)?;
        if allocations.is_empty() {
            warn!(
                apps = stakes.len(),
                "no staked live apps, keeping current bandwidth allocation"
            );
            return Ok(());
        }

        for allocation in &allocations {
            let existing = self.storage.get_app_bandwidth_info(&allocation.app)?;
            let updated = apply_allocation(existing, allocation, ctx.time);
            self.storage.set_app_bandwidth_info(&updated)?;
        }
        info!(
            height = ctx.height,
            apps = allocations.len(),
            %app_quota,
            "reallocated app bandwidth"
        );
        Ok(())
    }

    /// Fade the observed throughput peak by the configured decay rate.
    pub fn decay_max_mps(&self) -> Result<()> {
        let params = self.params()?;
        let mut info = self.storage.get_bandwidth_info()?;
        info.decay_max_mps(params.max_mps_decay_rate);
        self.storage.set_bandwidth_info(&info)?;
        debug!(max_mps = %info.max_mps, "decayed max mps");
        Ok(())
    }

    pub fn bandwidth_info(&self) -> Result<BandwidthInfo> {
        self.storage.get_bandwidth_info()
    }

    pub fn block_info(&self) -> Result<BlockInfo> {
        self.storage.get_block_info()
    }

    pub fn app_bandwidth_info(&self, app: &AccountKey) -> Result<Option<AppBandwidthInfo>> {
        self.storage.get_app_bandwidth_info(app)
    }

    pub fn all_app_bandwidth_info(&self) -> Result<Vec<AppBandwidthInfo>> {
        self.storage.get_all_app_bandwidth_info()
    }

    fn params(&self) -> Result<BandwidthParams> {
        let params = self.deps.params.bandwidth_params()?;
        params.validate()?;
        Ok(params)
    }
}
