//! Interfaces to the chain modules the bandwidth manager depends on.

use std::fmt;
use std::sync::Arc;

use lino_types::{AccountKey, Coin, UnixTime};

use crate::params::BandwidthParams;

/// Header data of the block being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockContext {
    pub height: i64,
    pub time: UnixTime,
}

impl BlockContext {
    pub fn new(height: i64, time: UnixTime) -> Self {
        Self { height, time }
    }
}

/// Staked weight of an app, used to split the app quota.
pub trait StakeProvider: Send + Sync {
    fn stake(&self, app: &AccountKey) -> anyhow::Result<Coin>;
}

/// Currently registered developer apps.
pub trait LiveAppRegistry: Send + Sync {
    /// Live apps in a deterministic order.
    fn list_live_apps(&self) -> anyhow::Result<Vec<AccountKey>>;
}

/// Maps a message payer to the live app that pays for its messages.
pub trait AffiliationResolver: Send + Sync {
    /// `None` for ordinary users, who pay the general message fee.
    fn resolve_app(&self, payer: &AccountKey) -> anyhow::Result<Option<AccountKey>>;
}

/// Pools that receive collected message fees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InflationPool {
    Validator,
}

impl fmt::Display for InflationPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InflationPool::Validator => f.write_str("validator"),
        }
    }
}

/// Balance movements for general message fees.
pub trait AccountLedger: Send + Sync {
    /// Spendable balance; zero for accounts the ledger has never seen.
    fn balance(&self, account: &AccountKey) -> anyhow::Result<Coin>;

    /// Move `amount` from `account` into `pool` in one step. Either both
    /// sides change or neither does.
    fn transfer_to_pool(
        &self,
        account: &AccountKey,
        pool: InflationPool,
        amount: Coin,
    ) -> anyhow::Result<()>;
}

/// Time of the last committed block.
pub trait ClockSource: Send + Sync {
    fn last_block_time(&self) -> anyhow::Result<UnixTime>;
}

/// Current bandwidth parameters.
pub trait ParamSource: Send + Sync {
    fn bandwidth_params(&self) -> anyhow::Result<BandwidthParams>;
}

impl ParamSource for BandwidthParams {
    fn bandwidth_params(&self) -> anyhow::Result<BandwidthParams> {
        Ok(self.clone())
    }
}

/// Collaborators injected into [`crate::BandwidthManager`].
#[derive(Clone)]
pub struct Dependencies {
    pub stakes: Arc<dyn StakeProvider>,
    pub apps: Arc<dyn LiveAppRegistry>,
    pub affiliations: Arc<dyn AffiliationResolver>,
    pub ledger: Arc<dyn AccountLedger>,
    pub clock: Arc<dyn ClockSource>,
    pub params: Arc<dyn ParamSource>,
}
