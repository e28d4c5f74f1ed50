use crate::error::{Error, Result};
use crate::events::base::Event;
use crate::events::socialization::LossSocializationEvent;
use crate::interfaces::event_sink::EventSink;
use crate::observability::metrics::LOSS_SOCIALIZATION_EVENTS;
use crate::settlement::accounts::AccountStore;
use crate::settlement::distributor::LossDistributor;
use crate::settlement::ledger::TransferResponse;
use crate::settlement::transfer::{build_request, execute, MarketAccounts, PartyTransfer, TransferRequest};
use crate::types::balance::Balance;
use crate::types::ids::{AssetId, MarketId};
use crate::types::timestamp::Timestamp;

/// Check the batch shape before anything moves: only win/loss types, a single
/// asset, and every loss ahead of every win.
fn validate_batch(asset: &AssetId, transfers: &[PartyTransfer]) -> Result<()> {
    let mut seen_win = false;
    for (index, transfer) in transfers.iter().enumerate() {
        if !transfer.transfer_type.is_settlement() {
            return Err(Error::InvalidTransferType {
                operation: "settlement collection",
                transfer_type: transfer.transfer_type.to_string(),
            });
        }
        if &transfer.asset != asset {
            return Err(Error::AssetMismatch {
                expected: asset.clone(),
                actual: transfer.asset.clone(),
            });
        }
        if transfer.transfer_type.is_win() {
            seen_win = true;
        } else if seen_win {
            return Err(Error::UnorderedSettlementBatch { index });
        }
    }
    Ok(())
}

/// Run one win/loss batch for a market and asset.
///
/// Losers pay into the settlement account (margin first, insurance as the
/// backstop), then winners are paid out of it, scaled down pro rata when the
/// losses could not be collected in full. Returns one response for the loss
/// phase (if any) and one for the win phase (if any).
pub fn collect(
    store: &mut AccountStore,
    sink: &dyn EventSink,
    market_id: &MarketId,
    asset: &AssetId,
    transfers: &[PartyTransfer],
    now: Timestamp,
) -> Result<Vec<TransferResponse>> {
    if transfers.is_empty() {
        return Ok(Vec::new());
    }

    let system = MarketAccounts::resolve(store, market_id, asset)?;
    validate_batch(asset, transfers)?;

    // Resolve every request up front so a missing party account aborts the
    // batch before any balance changes.
    let split = transfers.iter()
        .position(|t| t.transfer_type.is_win())
        .unwrap_or(transfers.len());
    let (losses, wins) = transfers.split_at(split);
    let loss_requests = losses.iter()
        .map(|t| build_request(store, market_id, t, Some(&system)))
        .collect::<Result<Vec<_>>>()?;
    let mut win_requests = wins.iter()
        .map(|t| build_request(store, market_id, t, Some(&system)))
        .collect::<Result<Vec<_>>>()?;

    let mut responses = Vec::with_capacity(2);
    let mut expected_collected = Balance::zero();
    let mut collected = Balance::zero();

    if !loss_requests.is_empty() {
        let mut loss_response = TransferResponse::new();
        for request in &loss_requests {
            let response = execute(store, request, now)?;
            expected_collected += &request.amount;
            collected += &response.total_moved();
            loss_response.merge(response);
        }
        if collected != expected_collected {
            tracing::debug!(
                market_id = %market_id,
                expected = %expected_collected,
                collected = %collected,
                "Losses only partially collected"
            );
        }
        responses.push(loss_response);
    }

    if win_requests.is_empty() {
        let settlement_balance = &store.get(&system.settlement)?.balance;
        if !settlement_balance.is_zero() {
            tracing::warn!(
                market_id = %market_id,
                balance = %settlement_balance,
                "Loss-only batch left funds in settlement account"
            );
        }
        return Ok(responses);
    }

    let distributor = LossDistributor::new(expected_collected, collected);
    let requested: Vec<Balance> = win_requests.iter().map(|r| r.amount.clone()).collect();
    let scaled = distributor.distribute(&requested);

    let mut socialized = Vec::new();
    for ((request, transfer), (asked, paid)) in win_requests.iter_mut()
        .zip(wins)
        .zip(requested.iter().zip(scaled))
    {
        if &paid != asked {
            socialized.push(Event::LossSocialization(LossSocializationEvent {
                party: transfer.owner.clone(),
                market_id: market_id.clone(),
                amount_delta: paid.to_signed() - asked.to_signed(),
                timestamp: now,
            }));
        }
        request.amount = paid;
    }

    let win_response = pay_winners(store, &win_requests, now)?;
    responses.push(win_response);

    if !socialized.is_empty() {
        tracing::warn!(
            market_id = %market_id,
            winners = socialized.len(),
            expected = %distributor.expected_collected(),
            collected = %distributor.collected(),
            "Loss socialization applied"
        );
        LOSS_SOCIALIZATION_EVENTS.inc_by(socialized.len() as u64);
        sink.send_batch(socialized);
    }

    let settlement = store.get(&system.settlement)?;
    if !settlement.balance.is_zero() {
        tracing::error!(
            account_id = %settlement.id,
            balance = %settlement.balance,
            "Settlement account not empty after paying winners"
        );
        return Err(Error::SettlementBalanceNotZero {
            account_id: settlement.id.clone(),
            balance: settlement.balance.clone(),
        });
    }

    Ok(responses)
}

fn pay_winners(store: &mut AccountStore, requests: &[TransferRequest], now: Timestamp) -> Result<TransferResponse> {
    let mut win_response = TransferResponse::new();
    for request in requests {
        win_response.merge(execute(store, request, now)?);
    }
    Ok(win_response)
}
