use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use crate::error::{Error, InvariantViolation, Result};
use crate::settlement::accounts::AccountStore;
use crate::types::account::{Account, AccountType, Owner};
use crate::types::balance::Balance;
use crate::types::ids::{AssetId, MarketId, PartyId};

/// Network-level pools, named explicitly so that checkpoint keys are checked
/// by the type system instead of by string matching.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PoolKind {
    GlobalInsurance,
    GlobalReward,
    FeesInfrastructure,
    PendingTransfers,
    MarketReward(AccountType, MarketId),
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AccountOwner {
    Party(PartyId),
    SystemPool(PoolKind),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointBalance {
    pub owner: AccountOwner,
    pub asset: AssetId,
    pub balance: Balance,
}

/// Aggregated balance set, ordered by owner then asset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    pub balances: Vec<CheckpointBalance>,
    pub checksum: String,
}

/// Checkpoint key an account's balance is folded into. Settlement accounts
/// carry no key and must be empty.
pub fn checkpoint_owner(account: &Account) -> Result<Option<AccountOwner>> {
    let owner = match account.account_type {
        AccountType::General | AccountType::Margin | AccountType::Bond => match &account.owner {
            Owner::Party(party) => AccountOwner::Party(party.clone()),
            Owner::System => {
                return Err(Error::InvariantViolation(InvariantViolation {
                    invariant: "party_account_owner",
                    details: format!("party account {} owned by system", account.id),
                }));
            }
        },
        AccountType::Insurance | AccountType::GlobalInsurance => AccountOwner::SystemPool(PoolKind::GlobalInsurance),
        AccountType::GlobalReward => AccountOwner::SystemPool(PoolKind::GlobalReward),
        AccountType::FeesInfrastructure => AccountOwner::SystemPool(PoolKind::FeesInfrastructure),
        AccountType::PendingTransfers => AccountOwner::SystemPool(PoolKind::PendingTransfers),
        AccountType::MakerFeeReward
        | AccountType::TakerFeeReward
        | AccountType::LPFeeReward
        | AccountType::MarketProposerReward => {
            AccountOwner::SystemPool(PoolKind::MarketReward(account.account_type, account.market_id.clone()))
        }
        AccountType::Settlement => {
            if !account.balance.is_zero() {
                tracing::error!(
                    account_id = %account.id,
                    balance = %account.balance,
                    "Settlement account not empty at checkpoint"
                );
                return Err(Error::SettlementBalanceNotZero {
                    account_id: account.id.clone(),
                    balance: account.balance.clone(),
                });
            }
            return Ok(None);
        }
    };
    Ok(Some(owner))
}

impl Checkpoint {
    pub fn from_store(store: &AccountStore) -> Result<Self> {
        let mut aggregated: BTreeMap<(AccountOwner, AssetId), Balance> = BTreeMap::new();
        for account in store.iter() {
            if let Some(owner) = checkpoint_owner(account)? {
                *aggregated.entry((owner, account.asset.clone())).or_insert_with(Balance::zero) += &account.balance;
            }
        }

        let balances = aggregated.into_iter()
            .map(|((owner, asset), balance)| CheckpointBalance { owner, asset, balance })
            .collect();

        let mut checkpoint = Checkpoint {
            version: crate::CHECKPOINT_VERSION,
            balances,
            checksum: String::new(),
        };
        checkpoint.checksum = checkpoint.calculate_checksum()?;
        Ok(checkpoint)
    }

    fn calculate_checksum(&self) -> Result<String> {
        let body = bincode::serialize(&(self.version, &self.balances))
            .map_err(|e| Error::SerializationError(e.to_string()))?;
        let mut hasher = Sha256::new();
        hasher.update(&body);
        Ok(hex::encode(hasher.finalize()))
    }

    pub fn verify_checksum(&self) -> bool {
        matches!(self.calculate_checksum(), Ok(checksum) if checksum == self.checksum)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| Error::SerializationError(e.to_string()))
    }

    /// Decode and validate a blob. Older versions stay loadable.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let checkpoint: Checkpoint = bincode::deserialize(bytes)
            .map_err(|e| Error::DeserializationError(e.to_string()))?;

        if checkpoint.version == 0 || checkpoint.version > crate::CHECKPOINT_VERSION {
            return Err(Error::UnsupportedCheckpointVersion {
                version: checkpoint.version,
                max_supported: crate::CHECKPOINT_VERSION,
            });
        }
        if !checkpoint.verify_checksum() {
            return Err(Error::InvalidChecksum);
        }
        Ok(checkpoint)
    }

    pub fn assets(&self) -> BTreeSet<AssetId> {
        self.balances.iter().map(|b| b.asset.clone()).collect()
    }

    /// Write every balance into the store, replacing what was there. Checks
    /// that every asset is enabled before the first write.
    pub fn restore(&self, store: &mut AccountStore, enabled: &BTreeSet<AssetId>) -> Result<()> {
        if let Some(asset) = self.assets().into_iter().find(|a| !enabled.contains(a)) {
            return Err(Error::AssetNotEnabled(asset));
        }

        for entry in &self.balances {
            let id = match &entry.owner {
                AccountOwner::Party(party) => store.create_or_get(
                    &MarketId::none(),
                    &Owner::Party(party.clone()),
                    &entry.asset,
                    AccountType::General,
                ),
                AccountOwner::SystemPool(pool) => {
                    let (market_id, account_type) = match pool {
                        PoolKind::GlobalInsurance => (MarketId::none(), AccountType::GlobalInsurance),
                        PoolKind::GlobalReward => (MarketId::none(), AccountType::GlobalReward),
                        PoolKind::FeesInfrastructure => (MarketId::none(), AccountType::FeesInfrastructure),
                        PoolKind::PendingTransfers => (MarketId::none(), AccountType::PendingTransfers),
                        PoolKind::MarketReward(account_type, market_id) => (market_id.clone(), *account_type),
                    };
                    store.create_or_get(&market_id, &Owner::System, &entry.asset, account_type)
                }
            };
            store.set_balance(&id, entry.balance.clone())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::producer::BufferedEventSink;
    use std::sync::Arc;

    fn store() -> AccountStore {
        AccountStore::new(Arc::new(BufferedEventSink::new()))
    }

    fn populated() -> AccountStore {
        let mut store = store();
        let asset = AssetId::from("BTC");
        let market = MarketId::from("m1");
        let alice = Owner::Party(PartyId::from("alice"));
        let g = store.create_or_get(&MarketId::none(), &alice, &asset, AccountType::General);
        let m = store.create_or_get(&market, &alice, &asset, AccountType::Margin);
        let ins = store.create_or_get(&market, &Owner::System, &asset, AccountType::Insurance);
        let gins = store.create_or_get(&MarketId::none(), &Owner::System, &asset, AccountType::GlobalInsurance);
        let maker = store.create_or_get(&market, &Owner::System, &asset, AccountType::MakerFeeReward);
        store.create_or_get(&market, &Owner::System, &asset, AccountType::Settlement);
        store.set_balance(&g, Balance::from_u64(10)).unwrap();
        store.set_balance(&m, Balance::from_u64(5)).unwrap();
        store.set_balance(&ins, Balance::from_u64(100)).unwrap();
        store.set_balance(&gins, Balance::from_u64(1)).unwrap();
        store.set_balance(&maker, Balance::from_u64(7)).unwrap();
        store
    }

    #[test]
    fn test_aggregates_per_owner_and_asset() {
        let checkpoint = Checkpoint::from_store(&populated()).unwrap();
        let asset = AssetId::from("BTC");
        let find = |owner: AccountOwner| {
            checkpoint.balances.iter()
                .find(|b| b.owner == owner && b.asset == asset)
                .map(|b| b.balance.clone())
        };
        assert_eq!(find(AccountOwner::Party(PartyId::from("alice"))), Some(Balance::from_u64(15)));
        assert_eq!(find(AccountOwner::SystemPool(PoolKind::GlobalInsurance)), Some(Balance::from_u64(101)));
        assert_eq!(
            find(AccountOwner::SystemPool(PoolKind::MarketReward(AccountType::MakerFeeReward, MarketId::from("m1")))),
            Some(Balance::from_u64(7))
        );
        assert_eq!(checkpoint.balances.len(), 3);
    }

    #[test]
    fn test_identical_state_gives_identical_bytes() {
        let a = Checkpoint::from_store(&populated()).unwrap().encode().unwrap();
        let b = Checkpoint::from_store(&populated()).unwrap().encode().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_non_empty_settlement_is_fatal() {
        let mut store = populated();
        let settle = crate::types::ids::AccountId::derive(
            &MarketId::from("m1"), &Owner::System, &AssetId::from("BTC"), AccountType::Settlement,
        );
        store.set_balance(&settle, Balance::from_u64(1)).unwrap();
        let err = Checkpoint::from_store(&store).unwrap_err();
        assert!(matches!(err, Error::SettlementBalanceNotZero { .. }));
    }

    #[test]
    fn test_decode_rejects_tampering_and_garbage() {
        let mut checkpoint = Checkpoint::from_store(&populated()).unwrap();
        checkpoint.balances[0].balance = Balance::from_u64(999);
        let bytes = checkpoint.encode().unwrap();
        assert!(matches!(Checkpoint::decode(&bytes), Err(Error::InvalidChecksum)));
        assert!(matches!(Checkpoint::decode(&[1, 2, 3]), Err(Error::DeserializationError(_))));
    }

    #[test]
    fn test_decode_rejects_future_version() {
        let mut checkpoint = Checkpoint::from_store(&populated()).unwrap();
        checkpoint.version = crate::CHECKPOINT_VERSION + 1;
        checkpoint.checksum = checkpoint.calculate_checksum().unwrap();
        let bytes = checkpoint.encode().unwrap();
        assert!(matches!(Checkpoint::decode(&bytes), Err(Error::UnsupportedCheckpointVersion { .. })));
    }

    #[test]
    fn test_restore_requires_enabled_assets() {
        let checkpoint = Checkpoint::from_store(&populated()).unwrap();
        let mut fresh = store();
        let err = checkpoint.restore(&mut fresh, &BTreeSet::new()).unwrap_err();
        assert!(matches!(err, Error::AssetNotEnabled(_)));
        assert!(fresh.is_empty());
    }

    #[test]
    fn test_restore_round_trip() {
        let checkpoint = Checkpoint::from_store(&populated()).unwrap();
        let bytes = checkpoint.encode().unwrap();

        let mut fresh = store();
        let enabled: BTreeSet<AssetId> = [AssetId::from("BTC")].into_iter().collect();
        Checkpoint::decode(&bytes).unwrap().restore(&mut fresh, &enabled).unwrap();

        assert_eq!(Checkpoint::from_store(&fresh).unwrap().balances, checkpoint.balances);
    }
}
