use lino_types::{AccountKey, Coin, Dec};
use thiserror::Error;

/// Errors raised by the bandwidth module.
///
/// Rejections abort a single message and leave state untouched. Fatal
/// errors mean the chain parameters or persisted rows are inconsistent and
/// block processing must stop.
#[derive(Debug, Error)]
pub enum BandwidthError {
    #[error("app {app} bandwidth credit {credit} is below the message cost {cost}")]
    AppBandwidthNotEnough {
        app: AccountKey,
        credit: Dec,
        cost: Dec,
    },

    #[error("message fee {provided} is below the current fee {required}")]
    UserMsgFeeNotEnough { required: Coin, provided: Coin },

    #[error("app {app} has no bandwidth allocation yet")]
    AppNotParticipating { app: AccountKey },

    #[error("account {account} balance {balance} cannot cover the message fee {required}")]
    InsufficientBalance {
        account: AccountKey,
        balance: Coin,
        required: Coin,
    },

    #[error("invalid message quota {quota}")]
    InvalidMsgQuota { quota: Dec },

    #[error("invalid expected MPS {expected_mps} for app {app}")]
    InvalidExpectedMPS { app: AccountKey, expected_mps: Dec },

    #[error("invalid bandwidth parameter: {0}")]
    InvalidParams(String),

    #[error("bandwidth info not found")]
    BandwidthInfoNotFound,

    #[error("block info not found")]
    BlockInfoNotFound,

    #[error("decimal overflow computing {context}")]
    Overflow { context: &'static str },

    #[error("storage error: {0}")]
    Storage(#[from] lino_storage::StorageError),

    #[error("collaborator error: {0}")]
    External(#[from] anyhow::Error),
}

impl BandwidthError {
    /// Message-scoped failures: drop the message, keep producing the block.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            BandwidthError::AppBandwidthNotEnough { .. }
                | BandwidthError::UserMsgFeeNotEnough { .. }
                | BandwidthError::AppNotParticipating { .. }
                | BandwidthError::InsufficientBalance { .. }
        )
    }

    /// Failures that must halt block processing.
    pub fn is_fatal(&self) -> bool {
        !self.is_rejection()
    }
}

pub type Result<T> = std::result::Result<T, BandwidthError>;
