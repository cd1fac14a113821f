//! Keyspaces of the bandwidth module inside the chain's [`KvStore`].

use lino_storage::{KvStore, KvStoreExt};
use lino_types::AccountKey;

use crate::errors::{BandwidthError, Result};
use crate::model::{AppBandwidthInfo, BandwidthInfo, BlockInfo};

const BANDWIDTH_INFO_SUBSTORE: &[u8] = &[0x00];
const BLOCK_INFO_SUBSTORE: &[u8] = &[0x01];
const APP_BANDWIDTH_SUBSTORE: &[u8] = &[0x02];

pub fn bandwidth_info_key() -> Vec<u8> {
    BANDWIDTH_INFO_SUBSTORE.to_vec()
}

pub fn block_info_key() -> Vec<u8> {
    BLOCK_INFO_SUBSTORE.to_vec()
}

/// app bandwidth substore ++ username
pub fn app_bandwidth_info_key(app: &AccountKey) -> Vec<u8> {
    let mut key = APP_BANDWIDTH_SUBSTORE.to_vec();
    key.extend_from_slice(app.as_bytes());
    key
}

/// Typed access to the bandwidth rows.
pub struct BandwidthStorage<S> {
    store: S,
}

impl<S: KvStore> BandwidthStorage<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Write zeroed singleton rows.
    pub fn init_genesis(&self) -> Result<()> {
        self.set_bandwidth_info(&BandwidthInfo::default())?;
        self.set_block_info(&BlockInfo::default())
    }

    pub fn get_bandwidth_info(&self) -> Result<BandwidthInfo> {
        self.store
            .get_json(&bandwidth_info_key())?
            .ok_or(BandwidthError::BandwidthInfoNotFound)
    }

    pub fn set_bandwidth_info(&self, info: &BandwidthInfo) -> Result<()> {
        Ok(self.store.set_json(&bandwidth_info_key(), info)?)
    }

    pub fn get_block_info(&self) -> Result<BlockInfo> {
        self.store
            .get_json(&block_info_key())?
            .ok_or(BandwidthError::BlockInfoNotFound)
    }

    pub fn set_block_info(&self, info: &BlockInfo) -> Result<()> {
        Ok(self.store.set_json(&block_info_key(), info)?)
    }

    /// `None` until the app has been allocated a quota.
    pub fn get_app_bandwidth_info(&self, app: &AccountKey) -> Result<Option<AppBandwidthInfo>> {
        Ok(self.store.get_json(&app_bandwidth_info_key(app))?)
    }

    pub fn set_app_bandwidth_info(&self, info: &AppBandwidthInfo) -> Result<()> {
        Ok(self
            .store
            .set_json(&app_bandwidth_info_key(&info.username), info)?)
    }

    /// Every app row, ordered by username.
    pub fn get_all_app_bandwidth_info(&self) -> Result<Vec<AppBandwidthInfo>> {
        self.store
            .prefix_scan(APP_BANDWIDTH_SUBSTORE)?
            .into_iter()
            .map(|(_, value)| {
                serde_json::from_slice(&value)
                    .map_err(|e| BandwidthError::Storage(e.into()))
            })
            .collect()
    }
}
