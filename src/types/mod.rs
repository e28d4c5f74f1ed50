pub mod account;
pub mod balance;
pub mod ids;
pub mod timestamp;

pub use account::{Account, AccountType, Owner};
pub use balance::Balance;
pub use ids::{AccountId, AssetId, MarketId, PartyId};
pub use timestamp::Timestamp;
