use serde::{Deserialize, Serialize};
use crate::types::account::{Account, AccountType, Owner};
use crate::types::balance::Balance;
use crate::types::ids::{AccountId, AssetId, MarketId};

/// Post-mutation snapshot of a single account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUpdated {
    pub id: AccountId,
    pub owner: Owner,
    pub market_id: MarketId,
    pub asset: AssetId,
    pub account_type: AccountType,
    pub balance: Balance,
}

impl From<&Account> for AccountUpdated {
    fn from(account: &Account) -> Self {
        AccountUpdated {
            id: account.id.clone(),
            owner: account.owner.clone(),
            market_id: account.market_id.clone(),
            asset: account.asset.clone(),
            account_type: account.account_type,
            balance: account.balance.clone(),
        }
    }
}
