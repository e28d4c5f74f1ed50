pub mod types;
pub mod error;
pub mod events;
pub mod interfaces;
pub mod event_log;
pub mod settlement;
pub mod liquidation;
pub mod invariants;
pub mod observability;
pub mod config;
pub mod core;

// Checkpoint format version
pub const CHECKPOINT_VERSION: u32 = 1;
