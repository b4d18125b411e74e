//! Tunnel lifecycle and the packet capture loop.

pub mod capture_loop;
pub mod controller;
pub mod events;
pub mod state;

pub use capture_loop::{CaptureLoop, CaptureSettings, LoopExit, PacketOutcome};
pub use controller::{TunnelController, TunnelSettings};
pub use events::{BlockEvent, ChannelSink, EventSink, TracingSink, TunnelEvent};
pub use state::{StateChangeEvent, TunnelState};
