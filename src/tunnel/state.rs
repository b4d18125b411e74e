//! Tunnel connection state.

use std::fmt;

/// Visible connection state of the tunnel.
///
/// The only legal cycle is
/// `Disconnected -> Connecting -> Connected -> Stopping -> Disconnected`,
/// with `Connecting -> Disconnected` when the interface cannot be established.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TunnelState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Stopping,
}

impl TunnelState {
    /// Whether moving to `next` is a legal transition.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Disconnected, Self::Connecting)
                | (Self::Connecting, Self::Connected | Self::Disconnected)
                | (Self::Connected, Self::Stopping)
                | (Self::Stopping, Self::Disconnected)
        )
    }
}

impl fmt::Display for TunnelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Stopping => "stopping",
        })
    }
}

/// A transition of the tunnel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChangeEvent {
    pub from: TunnelState,
    pub to: TunnelState,
}
