pub mod balance;
pub mod base;
pub mod socialization;

pub use balance::AccountUpdated;
pub use base::{AssetEnabled, Event, EventType, PartyCreated};
pub use socialization::LossSocializationEvent;
