use crate::error::{Error, InvariantViolation, Result};
use crate::settlement::accounts::AccountStore;
use crate::types::account::AccountType;
use crate::types::ids::AccountId;

pub struct InvariantChecks;

impl InvariantChecks {
    /// Settlement accounts only hold value while a batch is running.
    pub fn check_settlement_accounts_empty(store: &AccountStore) -> Result<()> {
        for account in store.iter().filter(|a| a.account_type == AccountType::Settlement) {
            if !account.balance.is_zero() {
                return Err(Error::InvariantViolation(InvariantViolation {
                    invariant: "settlement_accounts_empty",
                    details: format!(
                        "Settlement account {} holds {}",
                        account.id,
                        account.balance
                    ),
                }));
            }
        }
        Ok(())
    }

    /// Every stored id must be the one derived from the account's coordinates.
    pub fn check_account_ids(store: &AccountStore) -> Result<()> {
        for account in store.iter() {
            let derived = AccountId::derive(&account.market_id, &account.owner, &account.asset, account.account_type);
            if derived != account.id {
                return Err(Error::InvariantViolation(InvariantViolation {
                    invariant: "account_id_derivation",
                    details: format!("Account {} should be keyed {}", account.id, derived),
                }));
            }
        }
        Ok(())
    }

    /// Party-level account types never belong to the system owner.
    pub fn check_party_accounts_owned(store: &AccountStore) -> Result<()> {
        for account in store.iter() {
            if account.account_type.is_party_owned() && account.owner.party().is_none() {
                return Err(Error::InvariantViolation(InvariantViolation {
                    invariant: "party_accounts_owned",
                    details: format!("Account {} has no party owner", account.id),
                }));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::producer::BufferedEventSink;
    use crate::types::account::Owner;
    use crate::types::balance::Balance;
    use crate::types::ids::{AssetId, MarketId};
    use std::sync::Arc;

    #[test]
    fn test_settlement_must_be_empty() {
        let mut store = AccountStore::new(Arc::new(BufferedEventSink::new()));
        let id = store.create_or_get(&MarketId::from("m1"), &Owner::System, &AssetId::from("BTC"), AccountType::Settlement);
        InvariantChecks::check_settlement_accounts_empty(&store).unwrap();
        InvariantChecks::check_account_ids(&store).unwrap();

        store.set_balance(&id, Balance::from_u64(1)).unwrap();
        assert!(matches!(
            InvariantChecks::check_settlement_accounts_empty(&store),
            Err(Error::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_system_owned_general_account_flagged() {
        let mut store = AccountStore::new(Arc::new(BufferedEventSink::new()));
        store.create_or_get(&MarketId::none(), &Owner::System, &AssetId::from("BTC"), AccountType::General);
        assert!(InvariantChecks::check_party_accounts_owned(&store).is_err());
    }
}
