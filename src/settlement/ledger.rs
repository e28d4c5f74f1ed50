use serde::{Deserialize, Serialize};
use std::fmt;
use crate::observability::metrics::LEDGER_ENTRIES;
use crate::types::account::Account;
use crate::types::balance::Balance;
use crate::types::ids::AccountId;
use crate::types::timestamp::Timestamp;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub from_account: AccountId,
    pub to_account: AccountId,
    pub amount: Balance,
    pub reference: String,
    pub entry_type: EntryType,
    pub timestamp: Timestamp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryType {
    Loss,
    Win,
    MtmLoss,
    MtmWin,
    MarginLow,
    MarginHigh,
    BondLow,
    BondHigh,
    CloseOutDistressed,
    ClearAccount,
    Deposit,
    Withdraw,
    InfrastructureFeePay,
    InfrastructureFeeDistribute,
    LiquidityFeePay,
    LiquidityFeeDistribute,
    MakerFeePay,
    MakerFeeReceive,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Loss => "loss",
            EntryType::Win => "win",
            EntryType::MtmLoss => "mtm-loss",
            EntryType::MtmWin => "mtm-win",
            EntryType::MarginLow => "margin-low",
            EntryType::MarginHigh => "margin-high",
            EntryType::BondLow => "bond-low",
            EntryType::BondHigh => "bond-high",
            EntryType::CloseOutDistressed => "close-out distressed",
            EntryType::ClearAccount => "clear-account",
            EntryType::Deposit => "deposit",
            EntryType::Withdraw => "withdraw",
            EntryType::InfrastructureFeePay => "infrastructure-fee-pay",
            EntryType::InfrastructureFeeDistribute => "infrastructure-fee-distribute",
            EntryType::LiquidityFeePay => "liquidity-fee-pay",
            EntryType::LiquidityFeeDistribute => "liquidity-fee-distribute",
            EntryType::MakerFeePay => "maker-fee-pay",
            EntryType::MakerFeeReceive => "maker-fee-receive",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination account after a transfer, with what it received.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferBalance {
    pub account: Account,
    pub credited: Balance,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResponse {
    pub entries: Vec<LedgerEntry>,
    pub balances: Vec<TransferBalance>,
}

impl TransferResponse {
    pub fn new() -> Self {
        TransferResponse::default()
    }

    pub fn merge(&mut self, other: TransferResponse) {
        self.entries.extend(other.entries);
        self.balances.extend(other.balances);
    }

    /// Total value moved by this response.
    pub fn total_moved(&self) -> Balance {
        self.entries.iter().map(|e| &e.amount).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Append-only audit trail of every ledger entry the engine produced.
#[derive(Default)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Ledger {
            entries: Vec::new(),
        }
    }

    pub fn record_entry(&mut self, entry: LedgerEntry) {
        LEDGER_ENTRIES.inc();
        self.entries.push(entry);
    }

    pub fn record_response(&mut self, response: &TransferResponse) {
        for entry in &response.entries {
            self.record_entry(entry.clone());
        }
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
