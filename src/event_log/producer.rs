use std::sync::Mutex;
use crate::events::base::Event;
use crate::interfaces::event_sink::EventSink;
use crate::observability::metrics::EVENTS_EMITTED;

/// Keeps every event in emission order until the host drains them,
/// typically once per block.
#[derive(Default)]
pub struct BufferedEventSink {
    buffer: Mutex<Vec<Event>>,
}

impl BufferedEventSink {
    pub fn new() -> Self {
        BufferedEventSink {
            buffer: Mutex::new(Vec::new()),
        }
    }

    /// Take all buffered events, leaving the buffer empty.
    pub fn drain(&self) -> Vec<Event> {
        match self.buffer.lock() {
            Ok(mut buffer) => std::mem::take(&mut *buffer),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    pub fn len(&self) -> usize {
        match self.buffer.lock() {
            Ok(buffer) => buffer.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push_all(&self, events: impl IntoIterator<Item = Event>) {
        let mut buffer = match self.buffer.lock() {
            Ok(buffer) => buffer,
            Err(poisoned) => poisoned.into_inner(),
        };
        for event in events {
            EVENTS_EMITTED.with_label_values(&[event.event_type().as_str()]).inc();
            buffer.push(event);
        }
    }
}

impl EventSink for BufferedEventSink {
    fn send(&self, event: Event) {
        self.push_all(std::iter::once(event));
    }

    fn send_batch(&self, events: Vec<Event>) {
        self.push_all(events);
    }
}

/// Writes every event to the log as JSON. Useful for replicas that only
/// need an audit trail.
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn send(&self, event: Event) {
        EVENTS_EMITTED.with_label_values(&[event.event_type().as_str()]).inc();
        match serde_json::to_string(&event) {
            Ok(json) => tracing::info!(target: "collateral_events", event_type = event.event_type().as_str(), "{}", json),
            Err(e) => tracing::error!("Failed to encode event {:?}: {}", event.event_type(), e),
        }
    }
}
