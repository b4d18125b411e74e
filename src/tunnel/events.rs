//! Events reported by the tunnel to the host.

use std::time::SystemTime;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::state::StateChangeEvent;
use crate::dns::BlockReason;

/// A DNS query that was blocked. Emitted once per blocked query.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockEvent {
    /// Lowercase queried name.
    pub domain: String,
    pub reason: BlockReason,
    pub timestamp: SystemTime,
}

impl BlockEvent {
    pub fn now(domain: String, reason: BlockReason) -> Self {
        Self {
            domain,
            reason,
            timestamp: SystemTime::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TunnelEvent {
    Blocked(BlockEvent),
    StateChanged(StateChangeEvent),
}

/// Receives tunnel events.
///
/// Called from the capture worker thread as well as from the controller,
/// so implementations must not block for long. A `StateChanged` event is
/// emitted before the new state is published to watchers; a sink may read
/// the tunnel state and will still see the previous one.
pub trait EventSink: Send + Sync + 'static {
    fn emit(&self, event: TunnelEvent);
}

/// Forwards events to an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<TunnelEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TunnelEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: TunnelEvent) {
        if self.sender.send(event).is_err() {
            debug!("event receiver dropped");
        }
    }
}

/// Logs every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: TunnelEvent) {
        match event {
            TunnelEvent::Blocked(blocked) => {
                warn!(domain = %blocked.domain, reason = %blocked.reason, "blocked DNS query");
            }
            TunnelEvent::StateChanged(change) => {
                info!(from = %change.from, to = %change.to, "tunnel state changed");
            }
        }
    }
}
