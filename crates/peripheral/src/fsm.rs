//! Authentication engine seam.
//!
//! The authentication protocol itself lives outside this crate; the
//! service only drives it through [`AuthFsm`] and hands it a [`FsmBridge`]
//! to call back on. Every bridge callback is translated into a typed
//! command on the service loop, so the engine never touches lifecycle
//! state directly.

use crate::service::ServiceCommand;
use picoble_identity::{KeyMaterial, Users};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Startup context handed to the authentication engine.
pub struct FsmContext {
    /// Long-term key pair, when it could be loaded
    pub keys: Option<KeyMaterial>,

    /// Authorized users, empty when the list could not be loaded
    pub users: Users,

    /// Opaque extra data forwarded to the protocol
    pub extra_data: Vec<u8>,

    /// Callback surface into the service
    pub bridge: FsmBridge,
}

/// Capability the service consumes from the authentication engine.
///
/// All methods are synchronous and are invoked on the service loop; an
/// engine needing real work should hand off internally rather than block.
pub trait AuthFsm: Send {
    /// Begin the authentication flow.
    fn start(&mut self, context: FsmContext);

    /// A central connected (first write observed).
    fn connected(&mut self);

    /// The central is gone: teardown completed while connected.
    fn disconnected(&mut self);

    /// A complete inbound message was reassembled.
    fn read(&mut self, message: &[u8]);

    /// The timer armed via [`FsmBridge::set_timeout`] fired.
    fn timeout(&mut self);
}

/// Callback surface the authentication engine invokes on the service.
///
/// Cheap to clone; every call enqueues a command for the service loop and
/// returns immediately. Calls made after the service loop has exited are
/// dropped with a debug log.
#[derive(Debug, Clone)]
pub struct FsmBridge {
    commands: mpsc::UnboundedSender<ServiceCommand>,
}

impl FsmBridge {
    pub(crate) fn new(commands: mpsc::UnboundedSender<ServiceCommand>) -> Self {
        Self { commands }
    }

    /// Queue an outbound message for chunked transmission.
    pub fn write(&self, data: &[u8]) {
        self.send(ServiceCommand::Write(data.to_vec()));
    }

    /// Arm the single-shot timer, cancelling any prior one. The engine's
    /// `timeout` runs when it fires.
    pub fn set_timeout(&self, timeout: Duration) {
        self.send(ServiceCommand::SetTimeout(timeout));
    }

    /// The engine hit a protocol error.
    pub fn error(&self) {
        warn!("authentication engine reported an error");
    }

    /// Resume listening: advertise the continuous (session resumption)
    /// UUID when not connected.
    pub fn listen(&self) {
        self.send(ServiceCommand::Listen);
    }

    /// Drop the current central, keeping the service alive.
    pub fn disconnect(&self) {
        self.send(ServiceCommand::Disconnect);
    }

    /// Authentication finished with the given status.
    pub fn authenticated(&self, status: i32) {
        info!(status, "authentication completed");
    }

    /// The authenticated session ended.
    pub fn session_ended(&self) {
        info!("authentication session ended");
    }

    /// The engine's internal state advanced.
    pub fn status_updated(&self, state: i32) {
        debug!(state, "authentication state updated");
    }

    fn send(&self, command: ServiceCommand) {
        if self.commands.send(command).is_err() {
            debug!("service loop has exited; dropping engine callback");
        }
    }
}

/// Placeholder engine that logs every event it is driven with.
///
/// Stands in for the Pico protocol engine so the peripheral can be
/// exercised end to end before the real authenticator is wired in.
#[derive(Debug, Default)]
pub struct LoggingFsm {
    bridge: Option<FsmBridge>,
}

impl AuthFsm for LoggingFsm {
    fn start(&mut self, context: FsmContext) {
        info!(
            have_keys = context.keys.is_some(),
            users = context.users.len(),
            extra_data_len = context.extra_data.len(),
            "authentication engine started"
        );
        // The protocol listens for a resuming central as soon as it runs.
        context.bridge.listen();
        self.bridge = Some(context.bridge);
    }

    fn connected(&mut self) {
        info!("central connected");
    }

    fn disconnected(&mut self) {
        info!("central disconnected");
        // A real engine decides here whether to resume listening.
        if let Some(bridge) = &self.bridge {
            bridge.listen();
        }
    }

    fn read(&mut self, message: &[u8]) {
        info!(len = message.len(), data = %hex::encode(message), "inbound message");
    }

    fn timeout(&mut self) {
        info!("authentication timer fired");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_enqueues_commands() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let bridge = FsmBridge::new(tx);

        bridge.write(b"hello");
        bridge.set_timeout(Duration::from_millis(250));
        bridge.listen();
        bridge.disconnect();

        assert!(matches!(rx.try_recv(), Ok(ServiceCommand::Write(data)) if data == b"hello"));
        assert!(matches!(
            rx.try_recv(),
            Ok(ServiceCommand::SetTimeout(timeout)) if timeout == Duration::from_millis(250)
        ));
        assert!(matches!(rx.try_recv(), Ok(ServiceCommand::Listen)));
        assert!(matches!(rx.try_recv(), Ok(ServiceCommand::Disconnect)));
    }

    #[test]
    fn test_bridge_survives_closed_loop() {
        let (tx, rx) = mpsc::unbounded_channel();
        let bridge = FsmBridge::new(tx);
        drop(rx);

        // Calls after the loop is gone are dropped, not panicked on.
        bridge.write(b"late");
        bridge.listen();
    }

    #[test]
    fn test_logging_fsm_requests_listen_after_disconnect() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut fsm = LoggingFsm::default();

        fsm.start(FsmContext {
            keys: None,
            users: Users::default(),
            extra_data: Vec::new(),
            bridge: FsmBridge::new(tx),
        });
        // Startup requests listening straight away.
        assert!(matches!(rx.try_recv(), Ok(ServiceCommand::Listen)));

        fsm.connected();
        fsm.disconnected();

        // And again once the central is gone.
        assert!(matches!(rx.try_recv(), Ok(ServiceCommand::Listen)));
        assert!(rx.try_recv().is_err());
    }
}
