//! # PicoBLE Peripheral
//!
//! BLE GATT peripheral service for the Pico authentication protocol.
//!
//! A smartphone central scans for a service UUID derived from the
//! peripheral's public-key commitment, connects, and exchanges framed
//! authentication messages over two characteristics. This crate owns the
//! whole peripheral side:
//!
//! - rotating service-UUID derivation ([`uuid`])
//! - the BlueZ object graph and registration lifecycle ([`gatt`],
//!   [`broker`], [`bluez`])
//! - the advertising / connection lifecycle state machine ([`lifecycle`],
//!   [`service`])
//! - the bridge to the external authentication engine ([`fsm`])
//! - timers and low-level advertising-interval tuning ([`timer`], [`hci`])
//!
//! # Architecture
//!
//! Everything runs on one service task. BlueZ method calls and timer
//! expiries arrive as typed events on channels; the service task is the
//! only writer of lifecycle state, so no component needs internal locking.
//!
//! # Examples
//!
//! ```no_run
//! use picoble_identity::Commitment;
//! use picoble_peripheral::bluez::BluezBroker;
//! use picoble_peripheral::config::ServiceConfig;
//! use picoble_peripheral::fsm::LoggingFsm;
//! use picoble_peripheral::hci::NoopHciTuner;
//! use picoble_peripheral::service::PeripheralService;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let commitment = Commitment::digest(b"public key der bytes");
//!     let service = PeripheralService::new(
//!         Box::new(BluezBroker::new()),
//!         Box::new(NoopHciTuner),
//!         Box::new(LoggingFsm::default()),
//!         commitment,
//!         ServiceConfig::default(),
//!     )?;
//!
//!     let handle = service.handle();
//!     handle.start(false);
//!     service.run().await?;
//!     Ok(())
//! }
//! ```

pub mod bluez;
pub mod broker;
pub mod config;
pub mod error;
pub mod fsm;
pub mod gatt;
pub mod hci;
pub mod lifecycle;
pub mod service;
pub mod timer;
pub mod uuid;

pub use broker::{BrokerEvent, HostBroker};
pub use config::ServiceConfig;
pub use error::{PeripheralError, Result};
pub use fsm::{AuthFsm, FsmBridge, FsmContext};
pub use hci::{AdvertisingInterval, HciTuner};
pub use lifecycle::{LifecycleState, Trigger};
pub use service::{PeripheralService, ServiceCommand, ServiceHandle};
pub use uuid::{derive_service_uuid, ServiceUuid};
