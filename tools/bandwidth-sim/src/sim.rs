//! Block-by-block replay of a [`Scenario`].

use std::sync::Arc;

use anyhow::{Context, Result};
use lino_bandwidth::{AppBandwidthInfo, BandwidthInfo, BandwidthManager, BlockContext, BlockInfo};
use lino_storage::{KvStore, MemoryStore, SledStore};
use lino_types::{AccountKey, Coin};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::chain::SimChain;
use crate::scenario::Scenario;

const GENERAL_USER: &str = "sim-user";

/// Admission counters for one message class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Admissions {
    pub admitted: u64,
    pub rejected: u64,
}

impl Admissions {
    fn record(&mut self, outcome: lino_bandwidth::Result<()>) -> Result<()> {
        match outcome {
            Ok(()) => self.admitted += 1,
            Err(err) if err.is_rejection() => {
                self.rejected += 1;
                debug!(%err, "message rejected");
            }
            Err(err) => return Err(err.into()),
        }
        Ok(())
    }
}

/// Final state printed after a run.
#[derive(Debug, Clone, Serialize)]
pub struct SimReport {
    pub height: u64,
    pub time: i64,
    pub simulate: bool,
    pub general: Admissions,
    pub app: Admissions,
    pub fees_collected: Coin,
    pub bandwidth_info: BandwidthInfo,
    pub block_info: BlockInfo,
    pub apps: Vec<AppBandwidthInfo>,
}

/// Run `scenario` against the configured store.
pub fn run(scenario: &Scenario, simulate: bool) -> Result<SimReport> {
    match &scenario.store_path {
        Some(path) => {
            let store = SledStore::open(path)
                .with_context(|| format!("failed to open store at {}", path.display()))?;
            run_with_store(scenario, simulate, store)
        }
        None => run_with_store(scenario, simulate, MemoryStore::new()),
    }
}

pub fn run_with_store<S: KvStore>(
    scenario: &Scenario,
    simulate: bool,
    store: S,
) -> Result<SimReport> {
    let chain = SimChain::from_scenario(scenario);
    let user: AccountKey = GENERAL_USER.parse()?;
    let declared_fee = Coin::from_lno(scenario.general_fee_lno);
    let budget = scenario.blocks as i128 * scenario.general_msgs_per_block as i128;
    chain.deposit(&user, Coin::new(declared_fee.amount() * budget));

    let manager = BandwidthManager::new(store, chain.dependencies(), simulate);
    manager.init_genesis()?;
    info!(
        blocks = scenario.blocks,
        apps = scenario.apps.len(),
        simulate,
        "starting bandwidth simulation"
    );

    let mut general = Admissions::default();
    let mut app = Admissions::default();
    let mut last = BlockContext::new(0, scenario.genesis_time);

    for height in 1..=scenario.blocks {
        let ctx = BlockContext::new(height as i64, scenario.block_time(height));
        run_block(&manager, &chain, scenario, &ctx, &user, &mut general, &mut app)
            .inspect_err(|err| error!(height, %err, "block processing halted"))?;
        last = ctx;
    }

    Ok(SimReport {
        height: last.height as u64,
        time: last.time,
        simulate,
        general,
        app,
        fees_collected: chain.validator_pool(),
        bandwidth_info: manager.bandwidth_info()?,
        block_info: manager.block_info()?,
        apps: manager.all_app_bandwidth_info()?,
    })
}

fn run_block<S: KvStore>(
    manager: &BandwidthManager<S>,
    chain: &Arc<SimChain>,
    scenario: &Scenario,
    ctx: &BlockContext,
    user: &AccountKey,
    general: &mut Admissions,
    app: &mut Admissions,
) -> Result<()> {
    let height = ctx.height as u64;
    if height > 1 && is_due(height, scenario.reallocate_every) {
        manager.recalculate_app_bandwidth_info(ctx)?;
    }
    if is_due(height, scenario.decay_every) {
        manager.decay_max_mps()?;
    }

    manager.begin_blocker(ctx)?;
    let declared_fee = Coin::from_lno(scenario.general_fee_lno);
    for _ in 0..scenario.general_msgs_per_block {
        general.record(manager.check_bandwidth(ctx, user, declared_fee))?;
    }
    for spec in &scenario.apps {
        for _ in 0..spec.msgs_per_block {
            app.record(manager.check_bandwidth(ctx, &spec.name, Coin::zero()))?;
        }
    }
    manager.end_blocker(ctx)?;
    chain.commit(ctx.time);
    Ok(())
}

fn is_due(height: u64, every: u64) -> bool {
    every > 0 && height % every == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::AppScenario;
    use lino_types::Dec;

    fn burst_scenario(blocks: u64) -> Scenario {
        Scenario {
            blocks,
            apps: vec![AppScenario {
                name: "dapp".parse().unwrap(),
                stake_lno: 1_000_000,
                msgs_per_block: 1000,
            }],
            ..Scenario::default()
        }
    }

    #[test]
    fn reproduces_reference_app_credit() {
        let mut scenario = burst_scenario(3);
        let chain = SimChain::from_scenario(&scenario);
        let manager = BandwidthManager::new(MemoryStore::new(), chain.dependencies(), false);
        manager.init_genesis().unwrap();
        let user: AccountKey = GENERAL_USER.parse().unwrap();
        let mut general = Admissions::default();
        let mut app = Admissions::default();

        for height in 1..=3u64 {
            let ctx = BlockContext::new(height as i64, scenario.block_time(height));
            // block 1 carries no traffic in the reference run
            scenario.apps[0].msgs_per_block = if height == 1 { 0 } else { 1000 };
            run_block(&manager, &chain, &scenario, &ctx, &user, &mut general, &mut app).unwrap();
            let credit = manager
                .app_bandwidth_info(&scenario.apps[0].name)
                .unwrap()
                .unwrap()
                .cur_bandwidth_credit;
            match height {
                2 => assert_eq!(credit, "910.849417274954801802".parse::<Dec>().unwrap()),
                3 => assert_eq!(credit, "7.099448771136388802".parse::<Dec>().unwrap()),
                _ => {}
            }
        }
        assert_eq!(app, Admissions { admitted: 2000, rejected: 0 });
    }

    #[test]
    fn sustained_overload_gets_rejected() {
        let report = run(&burst_scenario(6), false).unwrap();
        assert_eq!(report.height, 6);
        assert!(report.app.rejected > 0);
        assert_eq!(report.app.admitted + report.app.rejected, 6000);
        assert_eq!(report.apps.len(), 1);
    }

    #[test]
    fn general_fees_reach_the_validator_pool() {
        let scenario = Scenario {
            blocks: 2,
            general_msgs_per_block: 5,
            ..Scenario::default()
        };
        let report = run(&scenario, false).unwrap();
        assert_eq!(report.general, Admissions { admitted: 10, rejected: 0 });
        // 10 * exp(-6) LNO, rounded to coins, per message
        assert_eq!(report.fees_collected, Coin::new(10 * 2523));

        let simulated = run(&scenario, true).unwrap();
        assert_eq!(simulated.fees_collected, Coin::zero());
    }

    #[test]
    fn sled_store_runs_the_same_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let mut scenario = burst_scenario(2);
        scenario.store_path = Some(dir.path().join("bandwidth"));
        let on_disk = run(&scenario, false).unwrap();

        scenario.store_path = None;
        let in_memory = run(&scenario, false).unwrap();
        assert_eq!(on_disk.apps, in_memory.apps);
        assert_eq!(on_disk.bandwidth_info, in_memory.bandwidth_info);
    }
}
