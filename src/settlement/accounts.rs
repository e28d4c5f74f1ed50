use std::collections::BTreeMap;
use std::sync::Arc;
use crate::error::{Error, Result};
use crate::events::balance::AccountUpdated;
use crate::events::base::Event;
use crate::interfaces::event_sink::EventSink;
use crate::types::account::{Account, AccountType, Owner};
use crate::types::balance::Balance;
use crate::types::ids::{AccountId, AssetId, MarketId};

/// Every account in the network, keyed by its derived id.
///
/// Iteration is in id order, so anything built by walking the store (hashes,
/// checkpoints, per-asset totals) comes out identical on every node.
pub struct AccountStore {
    accounts: BTreeMap<AccountId, Account>,
    sink: Arc<dyn EventSink>,
}

impl AccountStore {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        AccountStore {
            accounts: BTreeMap::new(),
            sink,
        }
    }

    pub fn get(&self, id: &AccountId) -> Result<&Account> {
        self.accounts.get(id)
            .ok_or_else(|| Error::AccountNotFound(id.clone()))
    }

    pub fn contains(&self, id: &AccountId) -> bool {
        self.accounts.contains_key(id)
    }

    /// Idempotent: an existing account is returned untouched.
    pub fn create_or_get(
        &mut self,
        market_id: &MarketId,
        owner: &Owner,
        asset: &AssetId,
        account_type: AccountType,
    ) -> AccountId {
        let id = AccountId::derive(market_id, owner, asset, account_type);
        if self.accounts.contains_key(&id) {
            return id;
        }

        let account = Account::new(market_id.clone(), owner.clone(), asset.clone(), account_type);
        tracing::debug!(
            account_id = %id,
            account_type = %account_type,
            "Created account"
        );
        self.sink.send(Event::AccountUpdated(AccountUpdated::from(&account)));
        self.accounts.insert(id.clone(), account);
        id
    }

    pub fn set_balance(&mut self, id: &AccountId, balance: Balance) -> Result<()> {
        let account = self.accounts.get_mut(id)
            .ok_or_else(|| Error::AccountNotFound(id.clone()))?;
        account.balance = balance;
        self.sink.send(Event::AccountUpdated(AccountUpdated::from(&*account)));
        Ok(())
    }

    pub fn increment_balance(&mut self, id: &AccountId, delta: &Balance) -> Result<()> {
        let account = self.accounts.get_mut(id)
            .ok_or_else(|| Error::AccountNotFound(id.clone()))?;
        account.balance += delta;
        self.sink.send(Event::AccountUpdated(AccountUpdated::from(&*account)));
        Ok(())
    }

    /// Debit an account. Going below zero means an upstream bookkeeping bug,
    /// so the error is fatal to the caller.
    pub fn decrement_balance(&mut self, id: &AccountId, delta: &Balance) -> Result<()> {
        let account = self.accounts.get_mut(id)
            .ok_or_else(|| Error::AccountNotFound(id.clone()))?;
        let new_balance = account.balance.checked_sub(delta).ok_or_else(|| {
            tracing::error!(
                account_id = %id,
                balance = %account.balance,
                requested = %delta,
                "Debit would drive balance negative"
            );
            Error::InsufficientBalance {
                account_id: id.clone(),
                balance: account.balance.clone(),
                requested: delta.clone(),
            }
        })?;
        account.balance = new_balance;
        self.sink.send(Event::AccountUpdated(AccountUpdated::from(&*account)));
        Ok(())
    }

    /// Drop a drained account.
    pub fn remove(&mut self, id: &AccountId) -> Result<Account> {
        let account = self.get(id)?;
        if !account.balance.is_zero() {
            return Err(Error::AccountBalanceNotZero(id.clone()));
        }
        self.accounts.remove(id)
            .ok_or_else(|| Error::AccountNotFound(id.clone()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn party_accounts<'a>(&'a self, owner: &'a Owner) -> impl Iterator<Item = &'a Account> + 'a {
        self.accounts.values().filter(move |a| &a.owner == owner)
    }

    /// Sum of every balance held in `asset`, system accounts included.
    pub fn total_for_asset(&self, asset: &AssetId) -> Balance {
        self.accounts.values()
            .filter(|a| &a.asset == asset)
            .map(|a| &a.balance)
            .sum()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
