use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};
use crate::observability::metrics::PARTIES_CLOSED_OUT;
use crate::settlement::accounts::AccountStore;
use crate::settlement::ledger::TransferResponse;
use crate::settlement::transfer::{
    bond_account_id, build_request, commit, execute, general_account_id, margin_account_id, plan, PartyTransfer,
    TransferType,
};
use crate::types::balance::Balance;
use crate::types::ids::{MarketId, PartyId};
use crate::types::timestamp::Timestamp;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginShortfall {
    pub party: PartyId,
    pub shortfall: Balance,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginOutcome {
    pub responses: Vec<TransferResponse>,
    /// Parties whose top-up could not reach the minimum. Nothing was moved
    /// for them.
    pub closed_out: Vec<PartyId>,
    pub penalised: Vec<MarginShortfall>,
}

fn ensure_margin_type(operation: &'static str, transfer: &PartyTransfer) -> Result<()> {
    if transfer.transfer_type.is_margin() {
        Ok(())
    } else {
        Err(Error::InvalidTransferType {
            operation,
            transfer_type: transfer.transfer_type.to_string(),
        })
    }
}

// Liquidity providers (parties with a bond in the market) whose general
// account cannot cover the whole top-up.
fn bond_shortfall(store: &AccountStore, market_id: &MarketId, update: &PartyTransfer) -> Result<Option<Balance>> {
    if update.transfer_type != TransferType::MarginLow
        || !store.contains(&bond_account_id(market_id, &update.owner, &update.asset))
    {
        return Ok(None);
    }
    let general = &store.get(&general_account_id(&update.owner, &update.asset))?.balance;
    Ok(update.amount.checked_sub(general).filter(|s| !s.is_zero()))
}

/// A `MarginLow` update that cannot reach `min_amount` closes the party out.
pub fn apply_margin_updates(
    store: &mut AccountStore,
    market_id: &MarketId,
    updates: &[PartyTransfer],
    now: Timestamp,
) -> Result<MarginOutcome> {
    for update in updates {
        ensure_margin_type("margin update", update)?;
    }
    let requests = updates.iter()
        .map(|update| build_request(store, market_id, update, None))
        .collect::<Result<Vec<_>>>()?;

    let mut outcome = MarginOutcome::default();
    for (update, request) in updates.iter().zip(&requests) {
        let shortfall = bond_shortfall(store, market_id, update)?;
        let planned = plan(store, request, now)?;

        if update.transfer_type == TransferType::MarginLow && planned.moved() < request.min_amount {
            tracing::warn!(
                party = %update.owner,
                market_id = %market_id,
                available = %planned.moved(),
                min_amount = %request.min_amount,
                "Margin top-up below minimum, closing out"
            );
            PARTIES_CLOSED_OUT.inc();
            outcome.closed_out.push(update.owner.clone());
            continue;
        }
        if let Some(shortfall) = shortfall {
            tracing::debug!(party = %update.owner, shortfall = %shortfall, "Bond holder short on margin top-up");
            outcome.penalised.push(MarginShortfall {
                party: update.owner.clone(),
                shortfall,
            });
        }

        outcome.responses.push(commit(store, planned)?);
    }
    Ok(outcome)
}

pub fn margin_update_on_order(
    store: &mut AccountStore,
    market_id: &MarketId,
    update: &PartyTransfer,
    now: Timestamp,
) -> Result<TransferResponse> {
    ensure_margin_type("margin update on order", update)?;
    let request = build_request(store, market_id, update, None)?;

    let available = available_collateral(store, market_id, update)?;
    if available < update.min_amount {
        return Err(Error::MinAmountNotReached {
            required: update.min_amount.clone(),
            available,
        });
    }

    execute(store, &request, now)
}

pub fn rollback_margin_update_on_order(
    store: &mut AccountStore,
    market_id: &MarketId,
    transfer: &PartyTransfer,
    now: Timestamp,
) -> Result<TransferResponse> {
    let rollback = PartyTransfer {
        transfer_type: TransferType::MarginHigh,
        ..transfer.clone()
    };
    let request = build_request(store, market_id, &rollback, None)?;
    execute(store, &request, now)
}

pub fn bond_update(
    store: &mut AccountStore,
    market_id: &MarketId,
    transfer: &PartyTransfer,
    now: Timestamp,
) -> Result<TransferResponse> {
    if !transfer.transfer_type.is_bond() {
        return Err(Error::InvalidTransferType {
            operation: "bond update",
            transfer_type: transfer.transfer_type.to_string(),
        });
    }
    let request = build_request(store, market_id, transfer, None)?;
    execute(store, &request, now)
}

/// Sum of a party's general and margin balances in this market.
pub fn available_collateral(store: &AccountStore, market_id: &MarketId, transfer: &PartyTransfer) -> Result<Balance> {
    let general = &store.get(&general_account_id(&transfer.owner, &transfer.asset))?.balance;
    let margin = &store.get(&margin_account_id(market_id, &transfer.owner, &transfer.asset))?.balance;
    Ok(general + margin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::producer::BufferedEventSink;
    use crate::types::account::{AccountType, Owner};
    use crate::types::ids::AssetId;
    use std::sync::Arc;

    fn setup(general: u64, margin: u64) -> (AccountStore, MarketId, AssetId, PartyId) {
        let mut store = AccountStore::new(Arc::new(BufferedEventSink::new()));
        let market = MarketId::from("m1");
        let asset = AssetId::from("BTC");
        let party = PartyId::from("alice");
        let owner = Owner::Party(party.clone());
        let g = store.create_or_get(&MarketId::none(), &owner, &asset, AccountType::General);
        let m = store.create_or_get(&market, &owner, &asset, AccountType::Margin);
        store.set_balance(&g, Balance::from_u64(general)).unwrap();
        store.set_balance(&m, Balance::from_u64(margin)).unwrap();
        (store, market, asset, party)
    }

    fn balances(store: &AccountStore, market: &MarketId, asset: &AssetId, party: &PartyId) -> (Balance, Balance) {
        (
            store.get(&general_account_id(party, asset)).unwrap().balance.clone(),
            store.get(&margin_account_id(market, party, asset)).unwrap().balance.clone(),
        )
    }

    #[test]
    fn test_margin_low_below_minimum_closes_out() {
        let (mut store, market, asset, party) = setup(100, 0);
        let update = PartyTransfer::new(party.clone(), asset.clone(), TransferType::MarginLow, Balance::from_u64(1000))
            .with_min_amount(Balance::from_u64(500));
        let outcome = apply_margin_updates(&mut store, &market, &[update], Timestamp::default()).unwrap();
        assert_eq!(outcome.closed_out, vec![party.clone()]);
        assert!(outcome.responses.is_empty());
        assert_eq!(balances(&store, &market, &asset, &party), (Balance::from_u64(100), Balance::zero()));
    }

    #[test]
    fn test_margin_low_partial_above_minimum_applies() {
        let (mut store, market, asset, party) = setup(700, 0);
        let update = PartyTransfer::new(party.clone(), asset.clone(), TransferType::MarginLow, Balance::from_u64(1000))
            .with_min_amount(Balance::from_u64(500));
        let outcome = apply_margin_updates(&mut store, &market, &[update], Timestamp::default()).unwrap();
        assert!(outcome.closed_out.is_empty());
        assert_eq!(balances(&store, &market, &asset, &party), (Balance::zero(), Balance::from_u64(700)));
    }

    #[test]
    fn test_unknown_party_mid_batch_moves_nothing() {
        let (mut store, market, asset, party) = setup(500, 0);
        let updates = vec![
            PartyTransfer::new(party.clone(), asset.clone(), TransferType::MarginLow, Balance::from_u64(200)),
            PartyTransfer::new(PartyId::from("ghost"), asset.clone(), TransferType::MarginLow, Balance::from_u64(10)),
        ];
        let err = apply_margin_updates(&mut store, &market, &updates, Timestamp::default()).unwrap_err();
        assert!(matches!(err, Error::AccountNotFound(_)));
        assert_eq!(balances(&store, &market, &asset, &party), (Balance::from_u64(500), Balance::zero()));
    }

    #[test]
    fn test_bond_holder_shortfall_reported() {
        let (mut store, market, asset, party) = setup(300, 0);
        store.create_or_get(&market, &Owner::Party(party.clone()), &asset, AccountType::Bond);
        let update = PartyTransfer::new(party.clone(), asset.clone(), TransferType::MarginLow, Balance::from_u64(500))
            .with_min_amount(Balance::from_u64(100));
        let outcome = apply_margin_updates(&mut store, &market, &[update], Timestamp::default()).unwrap();
        assert!(outcome.closed_out.is_empty());
        assert_eq!(outcome.penalised, vec![MarginShortfall { party: party.clone(), shortfall: Balance::from_u64(200) }]);
        assert_eq!(balances(&store, &market, &asset, &party), (Balance::zero(), Balance::from_u64(300)));
    }

    #[test]
    fn test_margin_high_releases_excess() {
        let (mut store, market, asset, party) = setup(0, 300);
        let update = PartyTransfer::new(party.clone(), asset.clone(), TransferType::MarginHigh, Balance::from_u64(120));
        let outcome = apply_margin_updates(&mut store, &market, &[update], Timestamp::default()).unwrap();
        assert_eq!(outcome.responses.len(), 1);
        assert_eq!(balances(&store, &market, &asset, &party), (Balance::from_u64(120), Balance::from_u64(180)));
    }

    #[test]
    fn test_settlement_type_rejected() {
        let (mut store, market, asset, party) = setup(0, 0);
        let update = PartyTransfer::new(party, asset, TransferType::Win, Balance::from_u64(1));
        let err = apply_margin_updates(&mut store, &market, &[update], Timestamp::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidTransferType { .. }));
    }

    #[test]
    fn test_on_order_min_amount_not_reached() {
        let (mut store, market, asset, party) = setup(100, 50);
        let update = PartyTransfer::new(party.clone(), asset.clone(), TransferType::MarginLow, Balance::from_u64(200))
            .with_min_amount(Balance::from_u64(200));
        let err = margin_update_on_order(&mut store, &market, &update, Timestamp::default()).unwrap_err();
        assert!(matches!(err, Error::MinAmountNotReached { .. }));
        assert_eq!(balances(&store, &market, &asset, &party), (Balance::from_u64(100), Balance::from_u64(50)));
    }

    #[test]
    fn test_bond_update_round_trip() {
        let (mut store, market, asset, party) = setup(100, 0);
        let bond = store.create_or_get(&market, &Owner::Party(party.clone()), &asset, AccountType::Bond);
        let low = PartyTransfer::new(party.clone(), asset.clone(), TransferType::BondLow, Balance::from_u64(60));
        bond_update(&mut store, &market, &low, Timestamp::default()).unwrap();
        assert_eq!(store.get(&bond).unwrap().balance, Balance::from_u64(60));

        let high = PartyTransfer::new(party.clone(), asset.clone(), TransferType::BondHigh, Balance::from_u64(25));
        bond_update(&mut store, &market, &high, Timestamp::default()).unwrap();
        assert_eq!(store.get(&bond).unwrap().balance, Balance::from_u64(35));
        assert_eq!(balances(&store, &market, &asset, &party).0, Balance::from_u64(65));

        let wrong = PartyTransfer::new(party, asset, TransferType::MarginLow, Balance::from_u64(1));
        assert!(bond_update(&mut store, &market, &wrong, Timestamp::default()).is_err());
    }

    #[test]
    fn test_on_order_then_rollback() {
        let (mut store, market, asset, party) = setup(500, 0);
        let update = PartyTransfer::new(party.clone(), asset.clone(), TransferType::MarginLow, Balance::from_u64(200))
            .with_min_amount(Balance::from_u64(200));
        margin_update_on_order(&mut store, &market, &update, Timestamp::default()).unwrap();
        assert_eq!(balances(&store, &market, &asset, &party), (Balance::from_u64(300), Balance::from_u64(200)));
        assert_eq!(available_collateral(&store, &market, &update).unwrap(), Balance::from_u64(500));

        rollback_margin_update_on_order(&mut store, &market, &update, Timestamp::default()).unwrap();
        assert_eq!(balances(&store, &market, &asset, &party), (Balance::from_u64(500), Balance::zero()));
    }
}
