use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Ledger metrics
    pub static ref LEDGER_ENTRIES: IntCounter = IntCounter::new(
        "collateral_ledger_entries_total",
        "Total number of ledger entries recorded"
    ).unwrap();

    pub static ref EVENTS_EMITTED: IntCounterVec = IntCounterVec::new(
        Opts::new("collateral_events_emitted_total", "Events handed to the event sink"),
        &["event_type"]
    ).unwrap();

    // Settlement metrics
    pub static ref SETTLEMENT_BATCHES: IntCounterVec = IntCounterVec::new(
        Opts::new("collateral_settlement_batches_total", "Settlement batches processed"),
        &["kind"]
    ).unwrap();

    pub static ref LOSS_SOCIALIZATION_EVENTS: IntCounter = IntCounter::new(
        "collateral_loss_socialization_total",
        "Winners whose payout was scaled down"
    ).unwrap();

    // Margin and distress metrics
    pub static ref PARTIES_CLOSED_OUT: IntCounter = IntCounter::new(
        "collateral_parties_closed_out_total",
        "Parties that could not reach their minimum margin"
    ).unwrap();

    pub static ref DISTRESSED_PARTIES_REMOVED: IntCounter = IntCounter::new(
        "collateral_distressed_parties_removed_total",
        "Margin accounts removed for distressed parties"
    ).unwrap();

    // System metrics
    pub static ref KILL_SWITCH_ACTIVATIONS: IntCounter = IntCounter::new(
        "collateral_kill_switch_activations_total",
        "Times the engine halted on a fatal error"
    ).unwrap();

    pub static ref CHECKPOINT_SIZE_BYTES: IntGauge = IntGauge::new(
        "collateral_checkpoint_size_bytes",
        "Size of the last checkpoint blob"
    ).unwrap();
}

pub fn register_metrics(registry: &Registry) -> prometheus::Result<()> {
    registry.register(Box::new(LEDGER_ENTRIES.clone()))?;
    registry.register(Box::new(EVENTS_EMITTED.clone()))?;
    registry.register(Box::new(SETTLEMENT_BATCHES.clone()))?;
    registry.register(Box::new(LOSS_SOCIALIZATION_EVENTS.clone()))?;
    registry.register(Box::new(PARTIES_CLOSED_OUT.clone()))?;
    registry.register(Box::new(DISTRESSED_PARTIES_REMOVED.clone()))?;
    registry.register(Box::new(KILL_SWITCH_ACTIVATIONS.clone()))?;
    registry.register(Box::new(CHECKPOINT_SIZE_BYTES.clone()))?;
    Ok(())
}
