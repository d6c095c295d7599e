//! Channel-backed event sink.

use remodel_model::{Event, EventSink};
use tokio::sync::mpsc;
use tracing::debug;

/// Forwards every event into an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelSink {
    /// Creates the sink and the receiving end.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: &Event) {
        if self.tx.send(event.clone()).is_err() {
            debug!("event receiver dropped, discarding event");
        }
    }
}
