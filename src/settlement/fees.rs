use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use crate::error::{Error, Result};
use crate::settlement::accounts::AccountStore;
use crate::settlement::ledger::{EntryType, TransferResponse};
use crate::settlement::transfer::{execute, general_account_id, margin_account_id, TransferRequest};
use crate::types::account::{AccountType, Owner};
use crate::types::balance::Balance;
use crate::types::ids::{AccountId, AssetId, MarketId, PartyId};
use crate::types::timestamp::Timestamp;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeeTransferType {
    InfrastructureFeePay,
    InfrastructureFeeDistribute,
    LiquidityFeePay,
    LiquidityFeeDistribute,
    MakerFeePay,
    MakerFeeReceive,
}

impl FeeTransferType {
    pub fn is_pay(&self) -> bool {
        matches!(
            self,
            FeeTransferType::InfrastructureFeePay | FeeTransferType::LiquidityFeePay | FeeTransferType::MakerFeePay
        )
    }

    pub fn entry_type(&self) -> EntryType {
        match self {
            FeeTransferType::InfrastructureFeePay => EntryType::InfrastructureFeePay,
            FeeTransferType::InfrastructureFeeDistribute => EntryType::InfrastructureFeeDistribute,
            FeeTransferType::LiquidityFeePay => EntryType::LiquidityFeePay,
            FeeTransferType::LiquidityFeeDistribute => EntryType::LiquidityFeeDistribute,
            FeeTransferType::MakerFeePay => EntryType::MakerFeePay,
            FeeTransferType::MakerFeeReceive => EntryType::MakerFeeReceive,
        }
    }
}

impl fmt::Display for FeeTransferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entry_type().as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeTransfer {
    pub owner: PartyId,
    pub asset: AssetId,
    pub amount: Balance,
    pub transfer_type: FeeTransferType,
}

impl FeeTransfer {
    pub fn new(owner: PartyId, asset: AssetId, transfer_type: FeeTransferType, amount: Balance) -> Self {
        FeeTransfer {
            owner,
            asset,
            amount,
            transfer_type,
        }
    }
}

/// Fee pools a market pays into: maker and liquidity per market,
/// infrastructure per asset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeeAccounts {
    pub maker: AccountId,
    pub infrastructure: AccountId,
    pub liquidity: AccountId,
}

impl FeeAccounts {
    pub fn resolve(store: &AccountStore, market_id: &MarketId, asset: &AssetId) -> Result<Self> {
        let accounts = FeeAccounts {
            maker: AccountId::derive(market_id, &Owner::System, asset, AccountType::MakerFeeReward),
            infrastructure: AccountId::derive(&MarketId::none(), &Owner::System, asset, AccountType::FeesInfrastructure),
            liquidity: AccountId::derive(market_id, &Owner::System, asset, AccountType::LPFeeReward),
        };
        for id in [&accounts.maker, &accounts.infrastructure, &accounts.liquidity] {
            if !store.contains(id) {
                tracing::debug!(account_id = %id, market_id = %market_id, "Missing fee account");
                return Err(Error::FeeAccountsMissing {
                    market_id: market_id.clone(),
                    asset: asset.clone(),
                });
            }
        }
        Ok(accounts)
    }
}

pub fn build_fee_request(
    store: &AccountStore,
    market_id: &MarketId,
    transfer: &FeeTransfer,
    fees: &FeeAccounts,
) -> Result<TransferRequest> {
    let margin = store.get(&margin_account_id(market_id, &transfer.owner, &transfer.asset))?.id.clone();
    let general = store.get(&general_account_id(&transfer.owner, &transfer.asset))?.id.clone();

    let (from, to) = match transfer.transfer_type {
        FeeTransferType::InfrastructureFeePay => (vec![general, margin], vec![fees.infrastructure.clone()]),
        FeeTransferType::InfrastructureFeeDistribute => (vec![fees.infrastructure.clone()], vec![general]),
        FeeTransferType::LiquidityFeePay => (vec![general, margin], vec![fees.liquidity.clone()]),
        FeeTransferType::LiquidityFeeDistribute => (vec![fees.liquidity.clone()], vec![general]),
        FeeTransferType::MakerFeePay => (vec![general, margin], vec![fees.maker.clone()]),
        FeeTransferType::MakerFeeReceive => (vec![fees.maker.clone()], vec![general]),
    };

    Ok(TransferRequest {
        from,
        to,
        amount: transfer.amount.clone(),
        min_amount: transfer.amount.clone(),
        asset: transfer.asset.clone(),
        reference: transfer.transfer_type.to_string(),
        entry_type: transfer.transfer_type.entry_type(),
    })
}

/// Total each party owes across the pay legs of a batch.
pub fn fees_per_party(transfers: &[FeeTransfer]) -> BTreeMap<PartyId, Balance> {
    let mut totals: BTreeMap<PartyId, Balance> = BTreeMap::new();
    for transfer in transfers.iter().filter(|t| t.transfer_type.is_pay()) {
        *totals.entry(transfer.owner.clone()).or_insert_with(Balance::zero) += &transfer.amount;
    }
    totals
}

/// During continuous trading every payer must be able to cover its fees
/// from general and margin together.
pub fn check_fee_funds(
    store: &AccountStore,
    market_id: &MarketId,
    asset: &AssetId,
    transfers: &[FeeTransfer],
) -> Result<()> {
    for (party, required) in fees_per_party(transfers) {
        let general = &store.get(&general_account_id(&party, asset))?.balance;
        let margin = &store.get(&margin_account_id(market_id, &party, asset))?.balance;
        let available = general + margin;
        if available < required {
            return Err(Error::InsufficientFundsToPayFees {
                party,
                required,
                available,
            });
        }
    }
    Ok(())
}

pub fn transfer_fees(
    store: &mut AccountStore,
    market_id: &MarketId,
    asset: &AssetId,
    transfers: &[FeeTransfer],
    now: Timestamp,
) -> Result<Vec<TransferResponse>> {
    if transfers.is_empty() {
        return Ok(Vec::new());
    }
    if let Some(other) = transfers.iter().find(|t| &t.asset != asset) {
        return Err(Error::AssetMismatch {
            expected: asset.clone(),
            actual: other.asset.clone(),
        });
    }

    let fees = FeeAccounts::resolve(store, market_id, asset)?;
    let requests = transfers.iter()
        .map(|t| build_fee_request(store, market_id, t, &fees))
        .collect::<Result<Vec<_>>>()?;

    let mut responses = Vec::with_capacity(requests.len());
    for request in &requests {
        let response = execute(store, request, now)?;
        if response.total_moved() < request.amount {
            tracing::warn!(
                market_id = %market_id,
                reference = %request.reference,
                requested = %request.amount,
                moved = %response.total_moved(),
                "Fee transfer only partially funded"
            );
        }
        responses.push(response);
    }
    Ok(responses)
}
