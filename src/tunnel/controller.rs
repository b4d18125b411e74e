//! Tunnel lifecycle: connect, disconnect and the state machine.

use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::capture_loop::{CaptureLoop, CaptureSettings, LoopExit};
use super::events::{EventSink, TunnelEvent};
use super::state::{StateChangeEvent, TunnelState};
use crate::dns::{PolicyEngine, UpstreamForwarder};
use crate::error::InterfaceError;
use crate::network::{InterfaceProvider, InterfaceSettings, VirtualInterface};

/// Everything needed to start a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelSettings {
    pub interface: InterfaceSettings,
    pub capture: CaptureSettings,
}

/// State shared between the controller and its capture worker.
struct Shared {
    state: watch::Sender<TunnelState>,
    events: Arc<dyn EventSink>,
    /// Serializes transitions; never held across an await.
    order: parking_lot::Mutex<()>,
}

impl Shared {
    fn new(events: Arc<dyn EventSink>) -> Self {
        let (state, _) = watch::channel(TunnelState::Disconnected);
        Self {
            state,
            events,
            order: parking_lot::Mutex::new(()),
        }
    }

    /// Apply `to` if it is a legal next state and report it.
    ///
    /// The event is emitted before watchers are woken, so anyone who has
    /// seen a state can also find its event. The watch lock is not held
    /// while the sink runs.
    fn transition(&self, to: TunnelState) -> bool {
        let _order = self.order.lock();
        let from = *self.state.borrow();
        if !from.can_transition_to(to) {
            return false;
        }
        debug!(%from, %to, "tunnel transition");
        self.events
            .emit(TunnelEvent::StateChanged(StateChangeEvent { from, to }));
        self.state.send_replace(to);
        true
    }
}

struct Session {
    interface: Arc<dyn VirtualInterface>,
    cancel: CancellationToken,
    worker: JoinHandle<()>,
}

/// Owns the virtual interface and the capture worker of one tunnel.
///
/// At most one session is active at a time. Commands are serialized, so a
/// `connect` racing a `disconnect` observes the other's final state.
pub struct TunnelController<P, F> {
    provider: Arc<P>,
    forwarder: Arc<F>,
    policy: PolicyEngine,
    settings: TunnelSettings,
    shared: Arc<Shared>,
    session: Mutex<Option<Session>>,
}

impl<P, F> TunnelController<P, F>
where
    P: InterfaceProvider,
    F: UpstreamForwarder,
{
    pub fn new(
        provider: P,
        forwarder: F,
        policy: PolicyEngine,
        events: Arc<dyn EventSink>,
        settings: TunnelSettings,
    ) -> Self {
        Self {
            provider: Arc::new(provider),
            forwarder: Arc::new(forwarder),
            policy,
            settings,
            shared: Arc::new(Shared::new(events)),
            session: Mutex::new(None),
        }
    }

    pub fn state(&self) -> TunnelState {
        *self.shared.state.borrow()
    }

    /// Watch state changes, including the ones caused by a worker fault.
    pub fn subscribe(&self) -> watch::Receiver<TunnelState> {
        self.shared.state.subscribe()
    }

    /// Bring the tunnel up. A no-op unless disconnected.
    ///
    /// # Errors
    ///
    /// Returns the provider's error when the interface cannot be
    /// established; the state is then back to `Disconnected`.
    pub async fn connect(&self) -> Result<(), InterfaceError> {
        let mut session = self.session.lock().await;
        if matches!(self.state(), TunnelState::Connecting | TunnelState::Connected) {
            debug!(state = %self.state(), "connect ignored");
            return Ok(());
        }
        reap(&mut session).await;

        self.shared.transition(TunnelState::Connecting);

        let provider = Arc::clone(&self.provider);
        let interface_settings = self.settings.interface.clone();
        let established = tokio::task::spawn_blocking(move || provider.establish(&interface_settings))
            .await
            .map_err(|e| InterfaceError::Establish(format!("establish task failed: {e}")))
            .and_then(|result| result);

        let interface = match established {
            Ok(interface) => interface,
            Err(e) => {
                error!(error = %e, "failed to establish virtual interface");
                self.shared.transition(TunnelState::Disconnected);
                return Err(e);
            }
        };

        let capture = CaptureLoop::new(
            Arc::clone(&interface),
            self.policy.clone(),
            Arc::clone(&self.forwarder),
            Arc::clone(&self.shared.events),
            self.settings.capture,
        );
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let shared = Arc::clone(&self.shared);
        let worker_interface = Arc::clone(&interface);

        self.shared.transition(TunnelState::Connected);
        let worker = tokio::task::spawn_blocking(move || {
            if let LoopExit::Fault(_) = capture.run(token) {
                if shared.transition(TunnelState::Stopping) {
                    worker_interface.close();
                    shared.transition(TunnelState::Disconnected);
                }
            }
        });

        info!(name = %self.settings.interface.name, "tunnel connected");
        *session = Some(Session {
            interface,
            cancel,
            worker,
        });
        Ok(())
    }

    /// Tear the tunnel down and wait for the capture worker to exit.
    /// A no-op unless connected.
    pub async fn disconnect(&self) {
        let mut session = self.session.lock().await;
        if !self.shared.transition(TunnelState::Stopping) {
            debug!(state = %self.state(), "disconnect ignored");
            reap(&mut session).await;
            return;
        }

        if let Some(Session {
            interface,
            cancel,
            worker,
        }) = session.take()
        {
            cancel.cancel();
            interface.close();
            if let Err(e) = worker.await {
                error!(error = %e, "capture worker panicked");
            }
        }

        self.shared.transition(TunnelState::Disconnected);
        info!("tunnel disconnected");
    }
}

impl<P, F> Drop for TunnelController<P, F> {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.cancel.cancel();
            session.interface.close();
        }
    }
}

/// Wait for a worker that stopped on its own.
async fn reap(session: &mut Option<Session>) {
    if let Some(stale) = session.take() {
        if let Err(e) = stale.worker.await {
            error!(error = %e, "capture worker panicked");
        }
    }
}
