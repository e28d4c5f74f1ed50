use serde::{Deserialize, Serialize};
use std::fmt;
use crate::types::balance::Balance;
use crate::types::ids::{AccountId, AssetId, MarketId, PartyId, SYSTEM_OWNER};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AccountType {
    General,
    Margin,
    Bond,
    Insurance,
    GlobalInsurance,
    Settlement,
    GlobalReward,
    MakerFeeReward,
    TakerFeeReward,
    LPFeeReward,
    MarketProposerReward,
    FeesInfrastructure,
    PendingTransfers,
}

impl AccountType {
    /// Stable short code used inside account ids.
    pub fn code(&self) -> &'static str {
        match self {
            AccountType::General => "general",
            AccountType::Margin => "margin",
            AccountType::Bond => "bond",
            AccountType::Insurance => "insurance",
            AccountType::GlobalInsurance => "global-insurance",
            AccountType::Settlement => "settlement",
            AccountType::GlobalReward => "global-reward",
            AccountType::MakerFeeReward => "maker-fee-reward",
            AccountType::TakerFeeReward => "taker-fee-reward",
            AccountType::LPFeeReward => "lp-fee-reward",
            AccountType::MarketProposerReward => "market-proposer-reward",
            AccountType::FeesInfrastructure => "fees-infrastructure",
            AccountType::PendingTransfers => "pending-transfers",
        }
    }

    pub fn is_party_owned(&self) -> bool {
        matches!(self, AccountType::General | AccountType::Margin | AccountType::Bond)
    }

    pub fn is_market_reward(&self) -> bool {
        matches!(
            self,
            AccountType::MakerFeeReward
                | AccountType::TakerFeeReward
                | AccountType::LPFeeReward
                | AccountType::MarketProposerReward
        )
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Owner {
    Party(PartyId),
    System,
}

impl Owner {
    pub fn party(&self) -> Option<&PartyId> {
        match self {
            Owner::Party(id) => Some(id),
            Owner::System => None,
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Party(id) => write!(f, "{}", id),
            Owner::System => f.write_str(SYSTEM_OWNER),
        }
    }
}

impl From<PartyId> for Owner {
    fn from(id: PartyId) -> Self {
        Owner::Party(id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub market_id: MarketId,
    pub owner: Owner,
    pub asset: AssetId,
    pub account_type: AccountType,
    pub balance: Balance,
}

impl Account {
    pub fn new(market_id: MarketId, owner: Owner, asset: AssetId, account_type: AccountType) -> Self {
        let id = AccountId::derive(&market_id, &owner, &asset, account_type);
        Account {
            id,
            market_id,
            owner,
            asset,
            account_type,
            balance: Balance::zero(),
        }
    }
}
