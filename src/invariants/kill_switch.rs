use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use crate::observability::metrics::KILL_SWITCH_ACTIVATIONS;

/// Halts the engine after a fatal bookkeeping error. Once active, every
/// mutating call is refused until an operator resets it.
pub struct KillSwitch {
    active: Arc<AtomicBool>,
    reason: Mutex<Option<String>>,
}

impl Default for KillSwitch {
    fn default() -> Self {
        Self::new()
    }
}

impl KillSwitch {
    pub fn new() -> Self {
        KillSwitch {
            active: Arc::new(AtomicBool::new(false)),
            reason: Mutex::new(None),
        }
    }

    pub fn activate(&self, reason: String) {
        if self.active.swap(true, Ordering::SeqCst) {
            // Already active
            return;
        }

        tracing::error!("KILL SWITCH ACTIVATED: {}", reason);
        KILL_SWITCH_ACTIVATIONS.inc();
        match self.reason.lock() {
            Ok(mut slot) => *slot = Some(reason),
            Err(poisoned) => *poisoned.into_inner() = Some(reason),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn reason(&self) -> Option<String> {
        match self.reason.lock() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn deactivate(&self, operator: &str) {
        self.active.store(false, Ordering::SeqCst);
        match self.reason.lock() {
            Ok(mut slot) => *slot = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
        tracing::warn!("Kill switch deactivated by operator {}", operator);
    }
}
