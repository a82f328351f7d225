//! Host object-broker capability.
//!
//! The peripheral never talks to the system bus directly: everything it
//! needs from the host — publishing the object graph, registering the
//! advertisement and GATT application, pushing value updates — is behind
//! the [`HostBroker`] trait, and everything the host pushes back (central
//! writes, reads, notify subscriptions) arrives as a typed
//! [`BrokerEvent`]. This keeps the lifecycle controller testable against a
//! scripted broker and confines the bus API to one implementation.

use crate::error::Result;
use crate::gatt::{AdvertisementSpec, GattApplicationSpec};
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

/// Inbound events from the host, delivered on the service loop.
#[derive(Debug)]
pub enum BrokerEvent {
    /// The central wrote a raw chunk to the incoming characteristic
    WriteRequested {
        /// Chunk bytes exactly as written
        value: Vec<u8>,
    },

    /// The central read a characteristic; reply with the staging buffer
    ReadRequested {
        /// Channel the characteristic handler is waiting on
        reply: oneshot::Sender<Vec<u8>>,
    },

    /// The central subscribed to notifications
    NotifyStarted,

    /// The central unsubscribed from notifications
    NotifyStopped,

    /// The host released the advertisement
    AdvertisementReleased,
}

/// Capability surface of the host object broker.
///
/// Registration calls map one-to-one onto the host manager APIs and must
/// not block the event loop; completions are simply the `await` points.
/// Implementations are expected to be tolerant of repeated calls: the
/// lifecycle controller recycles advertisements periodically and re-runs
/// the publish/register sequence each cycle.
#[async_trait]
pub trait HostBroker: Send {
    /// Acquire the bus connection, the manager proxies and the object
    /// manager roots. Idempotent: a held connection is reused.
    async fn acquire(&mut self) -> Result<()>;

    /// Export the advertisement object and the GATT service with its two
    /// characteristics.
    async fn publish(
        &mut self,
        advertisement: AdvertisementSpec,
        application: GattApplicationSpec,
    ) -> Result<()>;

    /// Register the advertisement with the host advertising manager.
    async fn register_advertisement(&mut self) -> Result<()>;

    /// Register the GATT application with the host GATT manager.
    async fn register_application(&mut self) -> Result<()>;

    /// Unregister the GATT application.
    async fn unregister_application(&mut self) -> Result<()>;

    /// Unexport the three GATT paths and drop the server-side objects.
    async fn unpublish_application(&mut self) -> Result<()>;

    /// Unregister the advertisement with the host advertising manager.
    async fn unregister_advertisement(&mut self) -> Result<()>;

    /// Unexport the advertisement object.
    async fn unpublish_advertisement(&mut self) -> Result<()>;

    /// Release every host handle: roots, proxies and the bus connection.
    async fn release(&mut self) -> Result<()>;

    /// Set the outgoing characteristic value and flush it so subscribed
    /// centrals receive a notification.
    async fn update_outgoing_value(&mut self, chunk: &[u8]) -> Result<()>;

    /// Take the inbound event stream. Returns `None` after the first call.
    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<BrokerEvent>>;
}
