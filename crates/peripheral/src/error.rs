//! Error types for the peripheral service

use crate::lifecycle::LifecycleState;
use thiserror::Error;

/// Peripheral error types
#[derive(Error, Debug)]
pub enum PeripheralError {
    /// System bus could not be reached
    #[error("system bus unavailable: {0}")]
    BusUnavailable(String),

    /// A host manager proxy could not be created
    #[error("creating {interface} proxy failed: {reason}")]
    ProxyCreationFailed {
        interface: &'static str,
        reason: String,
    },

    /// Registering the advertisement or GATT application failed
    #[error("registering {what} failed: {reason}")]
    RegistrationFailed {
        what: &'static str,
        reason: String,
    },

    /// Unregistering the advertisement or GATT application failed
    #[error("unregistering {what} failed: {reason}")]
    UnregistrationFailed {
        what: &'static str,
        reason: String,
    },

    /// Publishing or unpublishing an object on the bus failed
    #[error("exporting {path} failed: {reason}")]
    ExportFailed { path: &'static str, reason: String },

    /// The HCI device could not be opened or written
    #[error("HCI device unavailable: {0}")]
    HciUnavailable(String),

    /// A lifecycle trigger arrived in an incompatible state
    #[error("invalid lifecycle transition from {from:?} on {trigger}")]
    InvalidTransition {
        from: LifecycleState,
        trigger: &'static str,
    },

    /// The broker event stream was already handed out
    #[error("broker event stream already taken")]
    EventStreamUnavailable,

    /// Configuration failed to load or validate
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// Wire framing failed
    #[error(transparent)]
    Framing(#[from] picoble_framing::FramingError),
}

/// Result type for peripheral operations
pub type Result<T> = std::result::Result<T, PeripheralError>;
