use serde::{Deserialize, Serialize};
use crate::events::balance::AccountUpdated;
use crate::events::socialization::LossSocializationEvent;
use crate::types::ids::{AssetId, PartyId};

/// Everything the engine tells downstream observers, in emission order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Event {
    AccountUpdated(AccountUpdated),
    LossSocialization(LossSocializationEvent),
    PartyCreated(PartyCreated),
    AssetEnabled(AssetEnabled),
}

impl Event {
    pub fn event_type(&self) -> EventType {
        match self {
            Event::AccountUpdated(_) => EventType::AccountUpdated,
            Event::LossSocialization(_) => EventType::LossSocialization,
            Event::PartyCreated(_) => EventType::PartyCreated,
            Event::AssetEnabled(_) => EventType::AssetEnabled,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    AccountUpdated,
    LossSocialization,
    PartyCreated,
    AssetEnabled,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::AccountUpdated => "account_updated",
            EventType::LossSocialization => "loss_socialization",
            EventType::PartyCreated => "party_created",
            EventType::AssetEnabled => "asset_enabled",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyCreated {
    pub party: PartyId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEnabled {
    pub asset: AssetId,
}
