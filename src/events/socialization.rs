use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use crate::types::ids::{MarketId, PartyId};
use crate::types::timestamp::Timestamp;

/// Emitted once per winner whose payout was scaled down.
/// `amount_delta` is `paid - requested`, so it is negative when the winner
/// received less than asked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LossSocializationEvent {
    pub party: PartyId,
    pub market_id: MarketId,
    pub amount_delta: BigInt,
    pub timestamp: Timestamp,
}
