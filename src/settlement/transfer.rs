use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use crate::error::{Error, Result};
use crate::settlement::accounts::AccountStore;
use crate::settlement::ledger::{EntryType, LedgerEntry, TransferBalance, TransferResponse};
use crate::types::account::{AccountType, Owner};
use crate::types::balance::Balance;
use crate::types::ids::{AccountId, AssetId, MarketId, PartyId};
use crate::types::timestamp::Timestamp;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferType {
    Loss,
    Win,
    MtmLoss,
    MtmWin,
    MarginLow,
    MarginHigh,
    BondLow,
    BondHigh,
}

impl TransferType {
    pub fn is_loss(&self) -> bool {
        matches!(self, TransferType::Loss | TransferType::MtmLoss)
    }

    pub fn is_win(&self) -> bool {
        matches!(self, TransferType::Win | TransferType::MtmWin)
    }

    pub fn is_settlement(&self) -> bool {
        self.is_loss() || self.is_win()
    }

    pub fn is_margin(&self) -> bool {
        matches!(self, TransferType::MarginLow | TransferType::MarginHigh)
    }

    pub fn is_bond(&self) -> bool {
        matches!(self, TransferType::BondLow | TransferType::BondHigh)
    }

    pub fn entry_type(&self) -> EntryType {
        match self {
            TransferType::Loss => EntryType::Loss,
            TransferType::Win => EntryType::Win,
            TransferType::MtmLoss => EntryType::MtmLoss,
            TransferType::MtmWin => EntryType::MtmWin,
            TransferType::MarginLow => EntryType::MarginLow,
            TransferType::MarginHigh => EntryType::MarginHigh,
            TransferType::BondLow => EntryType::BondLow,
            TransferType::BondHigh => EntryType::BondHigh,
        }
    }
}

impl fmt::Display for TransferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entry_type().as_str())
    }
}

/// A party-level transfer intent, as handed over by the risk and settlement
/// engines. `amount` is always a magnitude, direction comes from the type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyTransfer {
    pub owner: PartyId,
    pub size: u64,
    pub amount: Balance,
    pub min_amount: Balance,
    pub asset: AssetId,
    pub transfer_type: TransferType,
}

impl PartyTransfer {
    pub fn new(owner: PartyId, asset: AssetId, transfer_type: TransferType, amount: Balance) -> Self {
        PartyTransfer {
            owner,
            size: 1,
            amount,
            min_amount: Balance::zero(),
            asset,
            transfer_type,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn with_min_amount(mut self, min_amount: Balance) -> Self {
        self.min_amount = min_amount;
        self
    }

    /// Value this transfer asks to move. Win and loss amounts are per unit of
    /// position, margin and bond amounts are already totals.
    pub fn requested_amount(&self) -> Balance {
        if self.transfer_type.is_settlement() {
            &self.amount * self.size
        } else {
            self.amount.clone()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferRequest {
    pub from: Vec<AccountId>,
    pub to: Vec<AccountId>,
    pub amount: Balance,
    pub min_amount: Balance,
    pub asset: AssetId,
    pub reference: String,
    pub entry_type: EntryType,
}

/// The two system accounts every onboarded market has for an asset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarketAccounts {
    pub settlement: AccountId,
    pub insurance: AccountId,
}

impl MarketAccounts {
    pub fn resolve(store: &AccountStore, market_id: &MarketId, asset: &AssetId) -> Result<Self> {
        let settlement = AccountId::derive(market_id, &Owner::System, asset, AccountType::Settlement);
        let insurance = AccountId::derive(market_id, &Owner::System, asset, AccountType::Insurance);
        if !store.contains(&settlement) || !store.contains(&insurance) {
            tracing::error!(
                market_id = %market_id,
                asset = %asset,
                "Market system accounts missing"
            );
            return Err(Error::SystemAccountsMissing {
                market_id: market_id.clone(),
                asset: asset.clone(),
            });
        }
        Ok(MarketAccounts { settlement, insurance })
    }
}

fn existing(store: &AccountStore, id: AccountId) -> Result<AccountId> {
    store.get(&id)?;
    Ok(id)
}

pub fn margin_account_id(market_id: &MarketId, party: &PartyId, asset: &AssetId) -> AccountId {
    AccountId::derive(market_id, &Owner::Party(party.clone()), asset, AccountType::Margin)
}

pub fn general_account_id(party: &PartyId, asset: &AssetId) -> AccountId {
    AccountId::derive(&MarketId::none(), &Owner::Party(party.clone()), asset, AccountType::General)
}

pub fn bond_account_id(market_id: &MarketId, party: &PartyId, asset: &AssetId) -> AccountId {
    AccountId::derive(market_id, &Owner::Party(party.clone()), asset, AccountType::Bond)
}

/// Margin and bond transfers ignore `system`.
pub fn build_request(
    store: &AccountStore,
    market_id: &MarketId,
    transfer: &PartyTransfer,
    system: Option<&MarketAccounts>,
) -> Result<TransferRequest> {
    let party = &transfer.owner;
    let asset = &transfer.asset;

    let require_system = || {
        system.ok_or_else(|| Error::SystemAccountsMissing {
            market_id: market_id.clone(),
            asset: asset.clone(),
        })
    };

    let (from, to) = match transfer.transfer_type {
        TransferType::Loss | TransferType::MtmLoss => {
            let system = require_system()?;
            (
                vec![existing(store, margin_account_id(market_id, party, asset))?, system.insurance.clone()],
                vec![system.settlement.clone()],
            )
        }
        TransferType::Win | TransferType::MtmWin => {
            let system = require_system()?;
            (
                vec![system.settlement.clone(), system.insurance.clone()],
                vec![existing(store, margin_account_id(market_id, party, asset))?],
            )
        }
        TransferType::MarginLow => (
            vec![existing(store, general_account_id(party, asset))?],
            vec![existing(store, margin_account_id(market_id, party, asset))?],
        ),
        TransferType::MarginHigh => (
            vec![existing(store, margin_account_id(market_id, party, asset))?],
            vec![existing(store, general_account_id(party, asset))?],
        ),
        TransferType::BondLow => (
            vec![existing(store, general_account_id(party, asset))?],
            vec![existing(store, bond_account_id(market_id, party, asset))?],
        ),
        TransferType::BondHigh => (
            vec![existing(store, bond_account_id(market_id, party, asset))?],
            vec![existing(store, general_account_id(party, asset))?],
        ),
    };

    Ok(TransferRequest {
        from,
        to,
        amount: transfer.requested_amount(),
        min_amount: transfer.min_amount.clone(),
        asset: asset.clone(),
        reference: transfer.transfer_type.to_string(),
        entry_type: transfer.transfer_type.entry_type(),
    })
}

/// Result of planning a request against current balances. Nothing is applied
/// until `commit`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferPlan {
    pub entries: Vec<LedgerEntry>,
    pub debits: Vec<(AccountId, Balance)>,
    pub credits: Vec<(AccountId, Balance)>,
}

impl TransferPlan {
    pub fn moved(&self) -> Balance {
        self.debits.iter().map(|(_, amount)| amount).sum()
    }
}

// Sources drain in order. Split remainders go to the last destination.
pub fn plan(store: &AccountStore, request: &TransferRequest, now: Timestamp) -> Result<TransferPlan> {
    let mut entries = Vec::new();
    let mut debits = Vec::new();
    let mut credits: BTreeMap<usize, Balance> = BTreeMap::new();
    let mut outstanding = request.amount.clone();

    if request.to.is_empty() {
        return Ok(TransferPlan { entries, debits, credits: Vec::new() });
    }

    for source in &request.from {
        if outstanding.is_zero() {
            break;
        }
        let available = &store.get(source)?.balance;
        if available.is_zero() {
            continue;
        }
        let contribution = if available >= &outstanding {
            outstanding.clone()
        } else {
            available.clone()
        };
        outstanding = outstanding.saturating_sub(&contribution);

        let (share, remainder) = contribution.split(request.to.len());
        let last = request.to.len() - 1;
        for (i, destination) in request.to.iter().enumerate() {
            let amount = if i == last { &share + &remainder } else { share.clone() };
            if amount.is_zero() {
                continue;
            }
            *credits.entry(i).or_insert_with(Balance::zero) += &amount;
            entries.push(LedgerEntry {
                from_account: source.clone(),
                to_account: destination.clone(),
                amount,
                reference: request.reference.clone(),
                entry_type: request.entry_type,
                timestamp: now,
            });
        }
        debits.push((source.clone(), contribution));
    }

    let credits = request.to.iter()
        .enumerate()
        .map(|(i, id)| (id.clone(), credits.remove(&i).unwrap_or_else(Balance::zero)))
        .collect();

    Ok(TransferPlan { entries, debits, credits })
}

pub fn commit(store: &mut AccountStore, plan: TransferPlan) -> Result<TransferResponse> {
    for (source, amount) in &plan.debits {
        store.decrement_balance(source, amount)?;
    }
    let mut balances = Vec::with_capacity(plan.credits.len());
    for (destination, amount) in &plan.credits {
        if !amount.is_zero() {
            store.increment_balance(destination, amount)?;
        }
        balances.push(TransferBalance {
            account: store.get(destination)?.clone(),
            credited: amount.clone(),
        });
    }
    Ok(TransferResponse {
        entries: plan.entries,
        balances,
    })
}

pub fn execute(store: &mut AccountStore, request: &TransferRequest, now: Timestamp) -> Result<TransferResponse> {
    let plan = plan(store, request, now)?;
    commit(store, plan)
}
