use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

use crate::types::account::{AccountType, Owner};

macro_rules! define_id_type {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                $name(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }
    };
}

define_id_type!(PartyId);
define_id_type!(MarketId);
define_id_type!(AssetId);
define_id_type!(AccountId);

/// Market id used by accounts that do not belong to any market.
pub const NO_MARKET: &str = "!";

/// Owner id used by network-level accounts.
pub const SYSTEM_OWNER: &str = "*";

impl MarketId {
    pub fn none() -> Self {
        MarketId(NO_MARKET.to_string())
    }

    pub fn is_none(&self) -> bool {
        self.0 == NO_MARKET
    }
}

// Percent-encode the id separator so distinct coordinates never join
// into the same id.
fn escape(component: &str) -> Cow<'_, str> {
    if !component.contains(['/', '%']) {
        return Cow::Borrowed(component);
    }
    Cow::Owned(component.replace('%', "%25").replace('/', "%2F"))
}

impl AccountId {
    /// Deterministic derivation from the account coordinates.
    /// Two nodes holding the same accounts always agree on their ids.
    pub fn derive(market_id: &MarketId, owner: &Owner, asset: &AssetId, account_type: AccountType) -> Self {
        let market = if market_id.0.is_empty() { Cow::Borrowed(NO_MARKET) } else { escape(market_id.as_str()) };
        let owner = match owner {
            Owner::System => Cow::Borrowed(SYSTEM_OWNER),
            Owner::Party(party) if party.as_str() == SYSTEM_OWNER => Cow::Borrowed("%2A"),
            Owner::Party(party) => escape(party.as_str()),
        };
        AccountId(format!(
            "{}/{}/{}/{}",
            market,
            owner,
            escape(asset.as_str()),
            account_type.code()
        ))
    }

    /// Pseudo account standing for the outside world in deposit and
    /// withdrawal ledger entries. It never exists in the store.
    pub fn external(asset: &AssetId) -> Self {
        AccountId(format!("{}/{}/{}/external", NO_MARKET, SYSTEM_OWNER, escape(asset.as_str())))
    }
}
