use std::collections::BTreeMap;
use crate::error::{Error, Result};
use crate::settlement::accounts::AccountStore;
use crate::settlement::ledger::TransferResponse;
use crate::types::balance::Balance;
use crate::types::ids::AssetId;

pub struct Reconciliation;

impl Reconciliation {
    /// Every ledger entry in a response moves value between two accounts, so
    /// what the destinations report as credited must equal the entries' sum.
    pub fn verify_double_entry(response: &TransferResponse) -> Result<()> {
        let debits = response.total_moved();
        let credits: Balance = response.balances.iter().map(|b| &b.credited).sum();
        if debits != credits {
            return Err(Error::ConservationOfValueViolation {
                asset: response.balances.first()
                    .map(|b| b.account.asset.clone())
                    .unwrap_or_else(|| AssetId::from("")),
                expected: debits,
                actual: credits,
            });
        }
        Ok(())
    }

    /// Compare what the store holds per asset with what has been deposited
    /// minus what has been withdrawn.
    pub fn verify_conservation_of_value(
        store: &AccountStore,
        totals: &BTreeMap<AssetId, Balance>,
    ) -> Result<()> {
        for (asset, expected) in totals {
            let actual = store.total_for_asset(asset);
            if &actual != expected {
                tracing::error!(
                    asset = %asset,
                    expected = %expected,
                    actual = %actual,
                    "Conservation of value violated"
                );
                return Err(Error::ConservationOfValueViolation {
                    asset: asset.clone(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }
        Ok(())
    }
}
