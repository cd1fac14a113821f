//! In-memory chain modules backing a simulated run.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use lino_bandwidth::{
    AccountLedger, AffiliationResolver, BandwidthParams, ClockSource, Dependencies,
    InflationPool, LiveAppRegistry, ParamSource, StakeProvider,
};
use lino_types::{AccountKey, Coin, UnixTime};
use parking_lot::RwLock;

use crate::scenario::Scenario;

pub struct SimChain {
    stakes: RwLock<BTreeMap<AccountKey, Coin>>,
    affiliations: RwLock<HashMap<AccountKey, AccountKey>>,
    balances: RwLock<HashMap<AccountKey, Coin>>,
    validator_pool: RwLock<Coin>,
    last_block_time: RwLock<UnixTime>,
    params: BandwidthParams,
}

impl SimChain {
    pub fn from_scenario(scenario: &Scenario) -> Arc<Self> {
        let mut stakes = BTreeMap::new();
        let mut affiliations = HashMap::new();
        for app in &scenario.apps {
            stakes.insert(app.name.clone(), Coin::from_lno(app.stake_lno));
            // apps sign their own messages
            affiliations.insert(app.name.clone(), app.name.clone());
        }

        Arc::new(Self {
            stakes: RwLock::new(stakes),
            affiliations: RwLock::new(affiliations),
            balances: RwLock::new(HashMap::new()),
            validator_pool: RwLock::new(Coin::zero()),
            last_block_time: RwLock::new(scenario.genesis_time),
            params: scenario.params.clone(),
        })
    }

    pub fn deposit(&self, account: &AccountKey, amount: Coin) {
        let mut balances = self.balances.write();
        let balance = balances.entry(account.clone()).or_default();
        *balance = *balance + amount;
    }

    pub fn validator_pool(&self) -> Coin {
        *self.validator_pool.read()
    }

    pub fn commit(&self, time: UnixTime) {
        *self.last_block_time.write() = time;
    }

    pub fn dependencies(self: &Arc<Self>) -> Dependencies {
        Dependencies {
            stakes: self.clone(),
            apps: self.clone(),
            affiliations: self.clone(),
            ledger: self.clone(),
            clock: self.clone(),
            params: self.clone(),
        }
    }
}

impl StakeProvider for SimChain {
    fn stake(&self, app: &AccountKey) -> Result<Coin> {
        self.stakes
            .read()
            .get(app)
            .copied()
            .ok_or_else(|| anyhow!("unknown app {app}"))
    }
}

impl LiveAppRegistry for SimChain {
    fn list_live_apps(&self) -> Result<Vec<AccountKey>> {
        Ok(self.stakes.read().keys().cloned().collect())
    }
}

impl AffiliationResolver for SimChain {
    fn resolve_app(&self, payer: &AccountKey) -> Result<Option<AccountKey>> {
        Ok(self.affiliations.read().get(payer).cloned())
    }
}

impl AccountLedger for SimChain {
    fn balance(&self, account: &AccountKey) -> Result<Coin> {
        Ok(self.balances.read().get(account).copied().unwrap_or_default())
    }

    fn transfer_to_pool(
        &self,
        account: &AccountKey,
        pool: InflationPool,
        amount: Coin,
    ) -> Result<()> {
        let mut balances = self.balances.write();
        let balance = balances
            .get_mut(account)
            .ok_or_else(|| anyhow!("account {account} does not exist"))?;
        if *balance < amount {
            return Err(anyhow!(
                "account {account} balance {balance} cannot cover {amount}"
            ));
        }
        match pool {
            InflationPool::Validator => {
                let mut total = self.validator_pool.write();
                *total = *total + amount;
            }
        }
        *balance = *balance - amount;
        Ok(())
    }
}

impl ClockSource for SimChain {
    fn last_block_time(&self) -> Result<UnixTime> {
        Ok(*self.last_block_time.read())
    }
}

impl ParamSource for SimChain {
    fn bandwidth_params(&self) -> Result<BandwidthParams> {
        Ok(self.params.clone())
    }
}
