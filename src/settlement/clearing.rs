use crate::error::Result;
use crate::settlement::accounts::AccountStore;
use crate::settlement::ledger::{EntryType, TransferResponse};
use crate::settlement::transfer::{bond_account_id, execute, general_account_id, margin_account_id, TransferRequest};
use crate::types::account::Account;
use crate::types::ids::{AccountId, AssetId, MarketId, PartyId};
use crate::types::timestamp::Timestamp;

fn drain_into(
    store: &mut AccountStore,
    from: &Account,
    to: &AccountId,
    entry_type: EntryType,
    now: Timestamp,
) -> Result<TransferResponse> {
    let request = TransferRequest {
        from: vec![from.id.clone()],
        to: vec![to.clone()],
        amount: from.balance.clone(),
        min_amount: from.balance.clone(),
        asset: from.asset.clone(),
        reference: entry_type.to_string(),
        entry_type,
    };
    execute(store, &request, now)
}

/// Return every party's collateral in a closing market to their general
/// account. Margin accounts stay behind with a zero balance. Parties whose
/// accounts cannot be resolved are logged and skipped.
pub fn clear_market(
    store: &mut AccountStore,
    market_id: &MarketId,
    asset: &AssetId,
    parties: &[PartyId],
    now: Timestamp,
) -> Result<Vec<TransferResponse>> {
    let mut responses = Vec::with_capacity(parties.len());

    for party in parties {
        let general = general_account_id(party, asset);
        let margin = match store.get(&margin_account_id(market_id, party, asset)) {
            Ok(account) if store.contains(&general) => account.clone(),
            Ok(_) => {
                tracing::warn!(party = %party, asset = %asset, "No general account, skipping market clearing");
                continue;
            }
            Err(e) => {
                tracing::warn!(party = %party, market_id = %market_id, error = %e, "No margin account, skipping market clearing");
                continue;
            }
        };

        tracing::debug!(
            party = %party,
            market_id = %market_id,
            margin = %margin.balance,
            "Clearing party margin account"
        );
        responses.push(drain_into(store, &margin, &general, EntryType::ClearAccount, now)?);

        let bond = store.get(&bond_account_id(market_id, party, asset))
            .ok()
            .filter(|b| !b.balance.is_zero())
            .cloned();
        if let Some(bond) = bond {
            responses.push(drain_into(store, &bond, &general, EntryType::ClearAccount, now)?);
        }
    }

    Ok(responses)
}

/// Move a party's whole margin balance in one market back to general.
pub fn clear_party_margin_account(
    store: &mut AccountStore,
    party: &PartyId,
    market_id: &MarketId,
    asset: &AssetId,
    now: Timestamp,
) -> Result<TransferResponse> {
    let margin = store.get(&margin_account_id(market_id, party, asset))?.clone();
    if margin.balance.is_zero() {
        return Ok(TransferResponse::new());
    }
    let general = store.get(&general_account_id(party, asset))?.id.clone();
    drain_into(store, &margin, &general, EntryType::MarginHigh, now)
}
