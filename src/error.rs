use thiserror::Error;
use crate::types::account::AccountType;
use crate::types::balance::Balance;
use crate::types::ids::{AccountId, AssetId, MarketId, PartyId};

#[derive(Error, Debug)]
pub enum Error {
    // Account Store Errors
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("System accounts missing for market {market_id}, asset {asset}")]
    SystemAccountsMissing {
        market_id: MarketId,
        asset: AssetId,
    },

    #[error("Insufficient balance: account={account_id}, balance={balance}, requested={requested}")]
    InsufficientBalance {
        account_id: AccountId,
        balance: Balance,
        requested: Balance,
    },

    #[error("Account balance not zero: {0}")]
    AccountBalanceNotZero(AccountId),

    #[error("Party {party} has no general account for asset {asset}")]
    NoGeneralAccount {
        party: PartyId,
        asset: AssetId,
    },

    #[error("Invalid account type {account_type} for {operation}")]
    InvalidAccountType {
        operation: &'static str,
        account_type: AccountType,
    },

    #[error("Fee accounts missing for market {market_id}, asset {asset}")]
    FeeAccountsMissing {
        market_id: MarketId,
        asset: AssetId,
    },

    #[error("Party {party} cannot pay fees: required={required}, available={available}")]
    InsufficientFundsToPayFees {
        party: PartyId,
        required: Balance,
        available: Balance,
    },

    // Asset Errors
    #[error("Asset already enabled: {0}")]
    AssetAlreadyEnabled(AssetId),

    #[error("Asset not enabled: {0}")]
    AssetNotEnabled(AssetId),

    #[error("Asset mismatch: expected {expected}, got {actual}")]
    AssetMismatch {
        expected: AssetId,
        actual: AssetId,
    },

    // Settlement Errors
    #[error("Invalid transfer type {transfer_type} for {operation}")]
    InvalidTransferType {
        operation: &'static str,
        transfer_type: String,
    },

    #[error("Loss transfer at index {index} follows a win transfer")]
    UnorderedSettlementBatch {
        index: usize,
    },

    #[error("Settlement account {account_id} left with non-zero balance {balance}")]
    SettlementBalanceNotZero {
        account_id: AccountId,
        balance: Balance,
    },

    #[error("Minimum amount not reached: required={required}, available={available}")]
    MinAmountNotReached {
        required: Balance,
        available: Balance,
    },

    #[error("Not enough funds to withdraw: requested={requested}, available={available}")]
    NotEnoughFundsToWithdraw {
        requested: Balance,
        available: Balance,
    },

    // Invariant Errors
    #[error("Invariant violation: {0}")]
    InvariantViolation(InvariantViolation),

    #[error("Conservation of value violated for {asset}: expected={expected}, actual={actual}")]
    ConservationOfValueViolation {
        asset: AssetId,
        expected: Balance,
        actual: Balance,
    },

    #[error("Kill switch active: {0}")]
    KillSwitchActive(String),

    // Checkpoint Errors
    #[error("Checkpoint deserialization failed: {0}")]
    DeserializationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid checksum")]
    InvalidChecksum,

    #[error("Unsupported checkpoint version: {version}, max supported: {max_supported}")]
    UnsupportedCheckpointVersion {
        version: u32,
        max_supported: u32,
    },

    #[error("Cannot load checkpoint, account {0} already holds funds")]
    CheckpointTargetNotEmpty(AccountId),

    #[error("No checkpoint found")]
    NoCheckpointFound,

    // System Errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Error {
    /// Errors after which the books can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::InsufficientBalance { .. }
                | Error::SettlementBalanceNotZero { .. }
                | Error::ConservationOfValueViolation { .. }
                | Error::InvariantViolation(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone)]
pub struct InvariantViolation {
    pub invariant: &'static str,
    pub details: String,
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.details)
    }
}
