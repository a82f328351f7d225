//! The peripheral service: lifecycle controller and event loop.
//!
//! One task owns everything — broker handles, framing buffers, the
//! lifecycle machine, timers and the authentication engine. Commands from
//! the engine bridge, the keyboard and the timers arrive on one channel;
//! method calls forwarded by the broker arrive on another. The loop
//! processes them strictly in arrival order, which is what makes the
//! ordering guarantees of the stop protocol and the connect-before-read
//! rule hold without locks.

use crate::broker::{BrokerEvent, HostBroker};
use crate::config::ServiceConfig;
use crate::error::{PeripheralError, Result};
use crate::fsm::{AuthFsm, FsmBridge, FsmContext};
use crate::gatt::{AdvertisementSpec, GattApplicationSpec};
use crate::hci::{AdvertisingInterval, HciTuner};
use crate::lifecycle::{LifecycleMachine, LifecycleState, Trigger};
use crate::timer::TimerService;
use crate::uuid::derive_service_uuid;
use picoble_framing::{Chunker, Reassembler, MAX_CHUNK_SIZE};
use picoble_identity::{Commitment, KeyMaterial, Users};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Commands processed by the service loop.
#[derive(Debug)]
pub enum ServiceCommand {
    /// Acquire the host broker without advertising
    Initialise,

    /// Begin an advertise cycle with the given continuity
    Start {
        /// Whether to derive the session-resumption UUID
        continuous: bool,
    },

    /// Tear the advertisement down; finalise when requested
    Stop {
        /// Whether to release every host handle afterwards
        finalise: bool,
    },

    /// Send an outbound message in chunks
    Write(Vec<u8>),

    /// Arm the single-shot authentication timer
    SetTimeout(Duration),

    /// Engine request: resume continuous advertising when idle
    Listen,

    /// Engine request: drop the current central
    Disconnect,

    /// The single-shot authentication timer fired
    FsmTimeout,

    /// The periodic recycle timer fired
    RecycleTick,

    /// Leave the service loop
    Quit,
}

/// Cheap clonable handle for driving the service loop from outside.
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    commands: mpsc::UnboundedSender<ServiceCommand>,
}

impl ServiceHandle {
    /// Acquire the host broker without advertising yet.
    pub fn initialise(&self) {
        self.send(ServiceCommand::Initialise);
    }

    /// Begin an advertise cycle.
    pub fn start(&self, continuous: bool) {
        self.send(ServiceCommand::Start { continuous });
    }

    /// Tear the advertisement down.
    pub fn stop(&self, finalise: bool) {
        self.send(ServiceCommand::Stop { finalise });
    }

    /// Leave the service loop.
    pub fn quit(&self) {
        self.send(ServiceCommand::Quit);
    }

    fn send(&self, command: ServiceCommand) {
        if self.commands.send(command).is_err() {
            debug!("service loop has exited; dropping command");
        }
    }
}

/// The peripheral service instance.
///
/// At most one instance is active per process; that is a lifecycle rule,
/// not a global — construct it explicitly and pass the handle around.
pub struct PeripheralService {
    config: ServiceConfig,
    broker: Box<dyn HostBroker>,
    tuner: Box<dyn HciTuner>,
    fsm: Box<dyn AuthFsm>,
    commitment: Commitment,

    lifecycle: LifecycleMachine,
    connected: bool,
    pending_finalise: bool,
    cycling: bool,

    chunker: Chunker,
    reassembler: Reassembler,
    /// Most recent raw write, served back on ReadValue
    staging: Vec<u8>,

    timers: TimerService,
    commands_tx: mpsc::UnboundedSender<ServiceCommand>,
    commands_rx: Option<mpsc::UnboundedReceiver<ServiceCommand>>,
}

impl PeripheralService {
    /// Create a service instance.
    ///
    /// # Errors
    ///
    /// Fails when the configuration does not validate.
    pub fn new(
        broker: Box<dyn HostBroker>,
        tuner: Box<dyn HciTuner>,
        fsm: Box<dyn AuthFsm>,
        commitment: Commitment,
        config: ServiceConfig,
    ) -> Result<Self> {
        config.validate()?;
        let chunker = Chunker::new(config.framing.max_send_size)?;

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let timers = TimerService::new(commands_tx.clone());

        Ok(Self {
            config,
            broker,
            tuner,
            fsm,
            commitment,
            lifecycle: LifecycleMachine::new(),
            connected: false,
            pending_finalise: false,
            cycling: false,
            chunker,
            reassembler: Reassembler::new(),
            staging: Vec::new(),
            timers,
            commands_tx,
            commands_rx: Some(commands_rx),
        })
    }

    /// Handle for driving the loop from other tasks.
    pub fn handle(&self) -> ServiceHandle {
        ServiceHandle {
            commands: self.commands_tx.clone(),
        }
    }

    /// Callback surface handed to the authentication engine.
    pub fn bridge(&self) -> FsmBridge {
        FsmBridge::new(self.commands_tx.clone())
    }

    /// Start the authentication engine with its credentials.
    ///
    /// Missing keys or users are passed through as-is; the engine defines
    /// its own behaviour under absent credentials.
    pub fn start_authentication(
        &mut self,
        keys: Option<KeyMaterial>,
        users: Users,
        extra_data: Vec<u8>,
    ) {
        let bridge = self.bridge();
        self.fsm.start(FsmContext {
            keys,
            users,
            extra_data,
            bridge,
        });
    }

    /// Run the service loop until [`ServiceCommand::Quit`] arrives or
    /// every command sender is gone.
    pub async fn run(mut self) -> Result<()> {
        let mut commands = self
            .commands_rx
            .take()
            .ok_or(PeripheralError::EventStreamUnavailable)?;
        let mut events = self
            .broker
            .take_events()
            .ok_or(PeripheralError::EventStreamUnavailable)?;

        self.timers.arm_recycle(self.config.recycle_interval());
        info!("entering service loop");

        loop {
            tokio::select! {
                Some(command) = commands.recv() => {
                    if !self.handle_command(command).await {
                        break;
                    }
                }
                Some(event) = events.recv() => {
                    self.handle_broker_event(event).await;
                }
                else => break,
            }
        }

        info!("service loop exited");
        Ok(())
    }

    async fn handle_command(&mut self, command: ServiceCommand) -> bool {
        match command {
            ServiceCommand::Initialise => self.initialise().await,
            ServiceCommand::Start { continuous } => self.start(continuous).await,
            ServiceCommand::Stop { finalise } => self.stop(finalise).await,
            ServiceCommand::Write(data) => self.send_message(&data).await,
            ServiceCommand::SetTimeout(timeout) => {
                debug!(?timeout, "arming authentication timer");
                self.timers.set_fsm_timeout(timeout);
            }
            ServiceCommand::Listen => self.listen().await,
            ServiceCommand::Disconnect => {
                if self.connected {
                    self.stop(false).await;
                } else {
                    debug!("disconnect requested while not connected");
                }
            }
            ServiceCommand::FsmTimeout => self.fsm.timeout(),
            ServiceCommand::RecycleTick => self.recycle().await,
            ServiceCommand::Quit => return false,
        }
        true
    }

    async fn handle_broker_event(&mut self, event: BrokerEvent) {
        match event {
            BrokerEvent::WriteRequested { value } => self.handle_central_write(value).await,
            BrokerEvent::ReadRequested { reply } => {
                let _ = reply.send(self.staging.clone());
            }
            BrokerEvent::NotifyStarted => debug!("central subscribed to notifications"),
            BrokerEvent::NotifyStopped => debug!("central unsubscribed from notifications"),
            BrokerEvent::AdvertisementReleased => debug!("advertisement released by host"),
        }
    }

    /// Acquire the bus, manager proxies and object roots.
    async fn initialise(&mut self) {
        match self.lifecycle.state() {
            LifecycleState::Dormant | LifecycleState::Unadvertised => {
                self.apply(Trigger::Start);
                if let Err(error) = self.broker.acquire().await {
                    warn!(%error, "acquiring host broker");
                }
                self.apply(Trigger::HostReady);
            }
            state => debug!(?state, "initialise ignored in current state"),
        }
    }

    /// Begin an advertise cycle, initialising first when necessary.
    async fn start(&mut self, continuous: bool) {
        match self.lifecycle.state() {
            LifecycleState::Dormant | LifecycleState::Unadvertised => {
                self.initialise().await;
                self.advertise(continuous).await;
            }
            LifecycleState::Initialised => self.advertise(continuous).await,
            state => debug!(?state, "start ignored in current state"),
        }
    }

    /// Derive a fresh UUID, publish the object graph and register it.
    async fn advertise(&mut self, continuous: bool) {
        if self.lifecycle.state() != LifecycleState::Initialised {
            debug!(state = ?self.lifecycle.state(), "advertise ignored in current state");
            return;
        }

        let uuid = derive_service_uuid(&self.commitment, continuous);
        info!(%uuid, continuous, "starting advertisement");

        let advertisement = AdvertisementSpec::new(uuid);
        let application = GattApplicationSpec::new(uuid);
        if let Err(error) = self.broker.publish(advertisement, application).await {
            warn!(%error, "publishing object graph");
        }

        match self.broker.register_advertisement().await {
            Ok(()) => {
                // Tuning may only run once registration has completed.
                if self.config.advertising.tune_interval {
                    let interval = AdvertisingInterval {
                        min: self.config.advertising.interval_min,
                        max: self.config.advertising.interval_max,
                    };
                    if let Err(error) = self.tuner.tune(&interval) {
                        warn!(%error, "tuning advertising interval");
                    }
                }
            }
            Err(error) => warn!(%error, "registering advertisement"),
        }

        if let Err(error) = self.broker.register_application().await {
            warn!(%error, "registering GATT application");
        }

        self.apply(Trigger::Advertise { continuous });
    }

    /// Tear the advertisement down.
    ///
    /// Teardown order is load-bearing: the application is unregistered
    /// first, the GATT paths are unexported next, and only then is the
    /// advertisement unregistered.
    async fn stop(&mut self, finalise: bool) {
        let state = self.lifecycle.state();
        if !matches!(
            state,
            LifecycleState::Advertising
                | LifecycleState::AdvertisingContinuous
                | LifecycleState::Connected
        ) {
            if state == LifecycleState::Unadvertised && (finalise || self.pending_finalise) {
                // Already torn down; go straight to finalisation.
                self.pending_finalise = false;
                self.finalise().await;
                return;
            }
            // Otherwise remember the request for the teardown in flight.
            self.pending_finalise = self.pending_finalise || finalise;
            debug!(?state, "stop ignored in current state");
            return;
        }

        self.pending_finalise = finalise;
        self.apply(Trigger::Stop);

        if let Err(error) = self.broker.unregister_application().await {
            warn!(%error, "unregistering GATT application");
        }
        if let Err(error) = self.broker.unpublish_application().await {
            warn!(%error, "unexporting GATT objects");
        }
        if let Err(error) = self.broker.unregister_advertisement().await {
            warn!(%error, "unregistering advertisement");
        }
        if let Err(error) = self.broker.unpublish_advertisement().await {
            warn!(%error, "unexporting advertisement");
        }

        let was_connected = self.connected;
        if was_connected {
            info!("central disconnected by teardown");
            self.connected = false;
            self.reassembler.reset();
        }

        self.apply(Trigger::TeardownComplete);

        if was_connected {
            self.fsm.disconnected();
        }

        if self.pending_finalise {
            self.pending_finalise = false;
            self.finalise().await;
        } else if self.cycling {
            self.cycling = false;
            self.start(false).await;
        }
    }

    /// Release every host handle.
    async fn finalise(&mut self) {
        self.apply(Trigger::Finalise);
        if let Err(error) = self.broker.release().await {
            warn!(%error, "releasing host handles");
        }
        self.apply(Trigger::Released);
        info!("service finalised");
    }

    /// Periodic recycle: restart idle advertisements so the derived UUID
    /// and advertisement stay fresh.
    async fn recycle(&mut self) {
        match self.lifecycle.state() {
            LifecycleState::Advertising => {
                debug!("recycling advertisement");
                self.cycling = true;
                self.stop(false).await;
            }
            LifecycleState::Initialised | LifecycleState::Unadvertised => {
                // Nothing registered; go straight to a fresh cycle.
                debug!("recycling from idle state");
                self.start(false).await;
            }
            LifecycleState::Finalised => {
                self.timers.disarm_recycle();
            }
            state @ (LifecycleState::Initialising
            | LifecycleState::Unadvertising
            | LifecycleState::Finalising
            | LifecycleState::Connected
            | LifecycleState::AdvertisingContinuous) => {
                debug!(?state, "recycle tick ignored");
            }
            state => debug!(?state, "recycle tick in unexpected state"),
        }
    }

    /// Engine request to resume listening for a session resumption.
    async fn listen(&mut self) {
        if self.connected {
            debug!("listen requested while connected");
            return;
        }
        info!("listening for session resumption");
        self.start(true).await;
    }

    /// Chunk an outbound message onto the outgoing characteristic.
    async fn send_message(&mut self, data: &[u8]) {
        debug!(len = data.len(), "sending message");
        for chunk in self.chunker.enqueue(data) {
            if let Err(error) = self.broker.update_outgoing_value(&chunk).await {
                warn!(%error, "updating outgoing characteristic");
            }
        }
    }

    /// A central wrote a raw chunk to the incoming characteristic.
    async fn handle_central_write(&mut self, value: Vec<u8>) {
        // Stage a bounded copy for subsequent reads.
        let bounded = &value[..value.len().min(MAX_CHUNK_SIZE)];
        self.staging.clear();
        self.staging.extend_from_slice(bounded);

        if !self.connected {
            // The engine must observe the connection before the bytes.
            match self.lifecycle.transition(Trigger::CentralWrote) {
                Ok(_) => {
                    info!("central connected");
                    self.connected = true;
                    self.fsm.connected();
                }
                Err(error) => {
                    debug!(%error, "write while not advertising; dropping chunk");
                    return;
                }
            }
        }

        match self.reassembler.accept(bounded) {
            Ok(Some(message)) => {
                debug!(len = message.len(), "assembled inbound message");
                self.fsm.read(&message);
            }
            Ok(None) => {}
            Err(error) => warn!(%error, "dropping malformed chunk"),
        }
    }

    fn apply(&mut self, trigger: Trigger) {
        match self.lifecycle.transition(trigger) {
            Ok(state) => debug!(?state, "lifecycle transition"),
            Err(error) => warn!(%error, "lifecycle transition rejected"),
        }
    }
}
