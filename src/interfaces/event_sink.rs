use crate::events::base::Event;

/// Downstream seam for account and socialization events.
///
/// The engine calls this synchronously, in the exact order mutations happen.
/// Implementations must not call back into the engine.
#[cfg_attr(test, mockall::automock)]
pub trait EventSink {
    fn send(&self, event: Event);

    fn send_batch(&self, events: Vec<Event>) {
        for event in events {
            self.send(event);
        }
    }
}
