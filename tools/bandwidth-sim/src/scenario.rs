use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File as ConfigFile};
use lino_bandwidth::BandwidthParams;
use lino_types::{AccountKey, UnixTime};
use serde::{Deserialize, Serialize};

/// Prefix of environment overrides, e.g. `LINO_SIM__BLOCKS=40`.
const ENV_PREFIX: &str = "LINO_SIM";

/// One app taking part in the simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppScenario {
    pub name: AccountKey,
    /// Stake in whole LNO.
    pub stake_lno: i64,
    /// Messages the app submits in every block.
    #[serde(default)]
    pub msgs_per_block: u64,
}

/// Chain activity replayed block by block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub genesis_time: UnixTime,
    pub block_interval_secs: i64,
    pub blocks: u64,
    pub general_msgs_per_block: u64,
    /// Fee declared by every general message, in whole LNO.
    pub general_fee_lno: i64,
    /// Re-split the app quota every N blocks, 0 to only allocate at height 1.
    pub reallocate_every: u64,
    /// Decay the peak throughput every N blocks, 0 to disable.
    pub decay_every: u64,
    /// Persist state in a sled database instead of memory.
    pub store_path: Option<PathBuf>,
    pub apps: Vec<AppScenario>,
    pub params: BandwidthParams,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            genesis_time: 1_600_000_000,
            block_interval_secs: 3,
            blocks: 10,
            general_msgs_per_block: 0,
            general_fee_lno: 1,
            // hourly at the default block interval
            reallocate_every: 1_200,
            // daily at the default block interval
            decay_every: 28_800,
            store_path: None,
            apps: Vec::new(),
            params: BandwidthParams::default(),
        }
    }
}

impl Scenario {
    /// Layer an optional scenario file and `LINO_SIM__*` environment
    /// variables over the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(ConfigFile::from(path));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let scenario: Scenario = builder
            .build()
            .context("failed to read scenario")?
            .try_deserialize()
            .context("invalid scenario")?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_interval_secs <= 0 {
            bail!("block_interval_secs must be positive");
        }
        if self.general_fee_lno < 0 {
            bail!("general_fee_lno must not be negative");
        }
        if let Some(app) = self.apps.iter().find(|app| app.stake_lno < 0) {
            bail!("app {} has negative stake", app.name);
        }
        self.params
            .validate()
            .context("invalid bandwidth parameters")?;
        Ok(())
    }

    pub fn block_time(&self, height: u64) -> UnixTime {
        self.genesis_time + (height as i64 - 1) * self.block_interval_secs
    }
}
