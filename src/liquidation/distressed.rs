use std::collections::BTreeSet;
use crate::error::{Error, Result};
use crate::observability::metrics::DISTRESSED_PARTIES_REMOVED;
use crate::settlement::accounts::AccountStore;
use crate::settlement::ledger::{EntryType, LedgerEntry, TransferBalance, TransferResponse};
use crate::settlement::transfer::margin_account_id;
use crate::types::account::{AccountType, Owner};
use crate::types::balance::Balance;
use crate::types::ids::{AccountId, AssetId, MarketId, PartyId};
use crate::types::timestamp::Timestamp;

/// Margin left over goes to insurance and the margin account is deleted.
/// Repeated parties are closed out once.
pub fn remove_distressed(
    store: &mut AccountStore,
    market_id: &MarketId,
    asset: &AssetId,
    parties: &[PartyId],
    now: Timestamp,
) -> Result<TransferResponse> {
    let insurance = AccountId::derive(market_id, &Owner::System, asset, AccountType::Insurance);
    if !store.contains(&insurance) {
        return Err(Error::SystemAccountsMissing {
            market_id: market_id.clone(),
            asset: asset.clone(),
        });
    }

    let mut seen = BTreeSet::new();
    let parties: Vec<&PartyId> = parties.iter().filter(|p| seen.insert(*p)).collect();
    let margins = parties.iter()
        .map(|party| store.get(&margin_account_id(market_id, party, asset)).map(|a| a.id.clone()))
        .collect::<Result<Vec<_>>>()?;

    let mut response = TransferResponse::new();
    let mut credited = Balance::zero();

    for (party, margin) in parties.iter().zip(margins) {
        let balance = store.get(&margin)?.balance.clone();
        if !balance.is_zero() {
            store.decrement_balance(&margin, &balance)?;
            store.increment_balance(&insurance, &balance)?;
            credited += &balance;
            response.entries.push(LedgerEntry {
                from_account: margin.clone(),
                to_account: insurance.clone(),
                amount: balance.clone(),
                reference: EntryType::CloseOutDistressed.to_string(),
                entry_type: EntryType::CloseOutDistressed,
                timestamp: now,
            });
        }
        store.remove(&margin)?;
        DISTRESSED_PARTIES_REMOVED.inc();
        tracing::info!(
            party = %party,
            market_id = %market_id,
            moved_to_insurance = %balance,
            "Removed distressed party margin account"
        );
    }

    response.balances.push(TransferBalance {
        account: store.get(&insurance)?.clone(),
        credited,
    });
    Ok(response)
}
