//! System-bus implementation of the host broker.
//!
//! Speaks `org.bluez` directly: proxies for the advertising and GATT
//! managers on the default controller, and served objects for the
//! advertisement, the GATT service and its two characteristics under two
//! object-manager roots. Method calls from the host are forwarded to the
//! service loop as [`BrokerEvent`]s; nothing in here touches lifecycle
//! state.

use crate::broker::{BrokerEvent, HostBroker};
use crate::error::{PeripheralError, Result};
use crate::gatt::{
    AdvertisementSpec, GattApplicationSpec, ADVERT_PATH, ADVERT_ROOT_PATH, ADVERT_TYPE,
    GATT_ROOT_PATH, GATT_SERVICE_PATH, INCOMING_CHAR_PATH, OUTGOING_CHAR_PATH,
};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;
use zbus::zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};
use zbus::{interface, proxy, Connection};

#[proxy(
    interface = "org.bluez.LEAdvertisingManager1",
    default_service = "org.bluez",
    default_path = "/org/bluez/hci0"
)]
trait LeAdvertisingManager1 {
    fn register_advertisement(
        &self,
        advertisement: &ObjectPath<'_>,
        options: HashMap<&str, Value<'_>>,
    ) -> zbus::Result<()>;

    fn unregister_advertisement(&self, advertisement: &ObjectPath<'_>) -> zbus::Result<()>;
}

#[proxy(
    interface = "org.bluez.GattManager1",
    default_service = "org.bluez",
    default_path = "/org/bluez/hci0"
)]
trait GattManager1 {
    fn register_application(
        &self,
        application: &ObjectPath<'_>,
        options: HashMap<&str, Value<'_>>,
    ) -> zbus::Result<()>;

    fn unregister_application(&self, application: &ObjectPath<'_>) -> zbus::Result<()>;
}

/// Served `org.bluez.LEAdvertisement1` object.
struct Advertisement {
    service_uuids: Vec<String>,
    events: mpsc::UnboundedSender<BrokerEvent>,
}

#[interface(name = "org.bluez.LEAdvertisement1")]
impl Advertisement {
    /// The host is done with the advertisement.
    fn release(&self) {
        debug!("advertisement released");
        let _ = self.events.send(BrokerEvent::AdvertisementReleased);
    }

    #[zbus(property, name = "ServiceUUIDs")]
    fn service_uuids(&self) -> Vec<String> {
        self.service_uuids.clone()
    }

    #[zbus(property, name = "Type")]
    fn advertisement_type(&self) -> String {
        ADVERT_TYPE.to_string()
    }
}

/// Served `org.bluez.GattService1` object.
struct GattService {
    uuid: String,
}

#[interface(name = "org.bluez.GattService1")]
impl GattService {
    #[zbus(property, name = "UUID")]
    fn uuid(&self) -> String {
        self.uuid.clone()
    }

    #[zbus(property)]
    fn primary(&self) -> bool {
        true
    }
}

/// Served outgoing characteristic (peripheral to central, notify).
struct OutgoingCharacteristic {
    uuid: String,
    flags: Vec<String>,
    value: Vec<u8>,
    events: mpsc::UnboundedSender<BrokerEvent>,
}

#[interface(name = "org.bluez.GattCharacteristic1")]
impl OutgoingCharacteristic {
    async fn read_value(
        &self,
        _options: HashMap<String, OwnedValue>,
    ) -> zbus::fdo::Result<Vec<u8>> {
        read_staging(&self.events).await
    }

    fn write_value(
        &self,
        value: Vec<u8>,
        _options: HashMap<String, OwnedValue>,
    ) -> zbus::fdo::Result<()> {
        forward_write(&self.events, value)
    }

    fn start_notify(&self) {
        let _ = self.events.send(BrokerEvent::NotifyStarted);
    }

    fn stop_notify(&self) {
        let _ = self.events.send(BrokerEvent::NotifyStopped);
    }

    #[zbus(property, name = "UUID")]
    fn uuid(&self) -> String {
        self.uuid.clone()
    }

    #[zbus(property)]
    fn service(&self) -> OwnedObjectPath {
        ObjectPath::from_static_str_unchecked(GATT_SERVICE_PATH).into()
    }

    #[zbus(property)]
    fn flags(&self) -> Vec<String> {
        self.flags.clone()
    }

    #[zbus(property)]
    fn notifying(&self) -> bool {
        false
    }

    #[zbus(property)]
    fn value(&self) -> Vec<u8> {
        self.value.clone()
    }
}

/// Served incoming characteristic (central to peripheral, write).
struct IncomingCharacteristic {
    uuid: String,
    flags: Vec<String>,
    events: mpsc::UnboundedSender<BrokerEvent>,
}

#[interface(name = "org.bluez.GattCharacteristic1")]
impl IncomingCharacteristic {
    async fn read_value(
        &self,
        _options: HashMap<String, OwnedValue>,
    ) -> zbus::fdo::Result<Vec<u8>> {
        read_staging(&self.events).await
    }

    fn write_value(
        &self,
        value: Vec<u8>,
        _options: HashMap<String, OwnedValue>,
    ) -> zbus::fdo::Result<()> {
        forward_write(&self.events, value)
    }

    fn start_notify(&self) {
        let _ = self.events.send(BrokerEvent::NotifyStarted);
    }

    fn stop_notify(&self) {
        let _ = self.events.send(BrokerEvent::NotifyStopped);
    }

    #[zbus(property, name = "UUID")]
    fn uuid(&self) -> String {
        self.uuid.clone()
    }

    #[zbus(property)]
    fn service(&self) -> OwnedObjectPath {
        ObjectPath::from_static_str_unchecked(GATT_SERVICE_PATH).into()
    }

    #[zbus(property)]
    fn flags(&self) -> Vec<String> {
        self.flags.clone()
    }
}

/// Ask the service loop for the staging buffer and wait for the reply.
async fn read_staging(
    events: &mpsc::UnboundedSender<BrokerEvent>,
) -> zbus::fdo::Result<Vec<u8>> {
    let (reply, response) = oneshot::channel();
    events
        .send(BrokerEvent::ReadRequested { reply })
        .map_err(|_| zbus::fdo::Error::Failed("service loop has exited".to_string()))?;
    response
        .await
        .map_err(|_| zbus::fdo::Error::Failed("service loop dropped the read".to_string()))
}

/// Forward a central write to the service loop.
fn forward_write(
    events: &mpsc::UnboundedSender<BrokerEvent>,
    value: Vec<u8>,
) -> zbus::fdo::Result<()> {
    events
        .send(BrokerEvent::WriteRequested { value })
        .map_err(|_| zbus::fdo::Error::Failed("service loop has exited".to_string()))
}

/// Production [`HostBroker`] over the system bus.
pub struct BluezBroker {
    connection: Option<Connection>,
    advertising_manager: Option<LeAdvertisingManager1Proxy<'static>>,
    gatt_manager: Option<GattManager1Proxy<'static>>,
    events_tx: mpsc::UnboundedSender<BrokerEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<BrokerEvent>>,
}

impl BluezBroker {
    /// Create a broker; nothing is acquired until [`HostBroker::acquire`].
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            connection: None,
            advertising_manager: None,
            gatt_manager: None,
            events_tx,
            events_rx: Some(events_rx),
        }
    }

    fn connection(&self) -> Result<&Connection> {
        self.connection
            .as_ref()
            .ok_or_else(|| PeripheralError::BusUnavailable("connection not acquired".to_string()))
    }
}

impl Default for BluezBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostBroker for BluezBroker {
    async fn acquire(&mut self) -> Result<()> {
        if self.connection.is_some() {
            debug!("bus connection already held");
            return Ok(());
        }

        let connection = Connection::system()
            .await
            .map_err(|e| PeripheralError::BusUnavailable(e.to_string()))?;

        // One object-manager root each for the advertisement and the GATT
        // application; the host enumerates published objects through them.
        for root in [ADVERT_ROOT_PATH, GATT_ROOT_PATH] {
            connection
                .object_server()
                .at(root, zbus::fdo::ObjectManager)
                .await
                .map_err(|e| PeripheralError::ExportFailed {
                    path: root,
                    reason: e.to_string(),
                })?;
        }

        self.advertising_manager = Some(
            LeAdvertisingManager1Proxy::new(&connection)
                .await
                .map_err(|e| PeripheralError::ProxyCreationFailed {
                    interface: "org.bluez.LEAdvertisingManager1",
                    reason: e.to_string(),
                })?,
        );
        self.gatt_manager = Some(GattManager1Proxy::new(&connection).await.map_err(|e| {
            PeripheralError::ProxyCreationFailed {
                interface: "org.bluez.GattManager1",
                reason: e.to_string(),
            }
        })?);

        self.connection = Some(connection);
        debug!("bus connection and manager proxies acquired");
        Ok(())
    }

    async fn publish(
        &mut self,
        advertisement: AdvertisementSpec,
        application: GattApplicationSpec,
    ) -> Result<()> {
        let connection = self.connection()?;
        let server = connection.object_server();

        let advert = Advertisement {
            service_uuids: vec![advertisement.service_uuid.to_string()],
            events: self.events_tx.clone(),
        };
        server
            .at(ADVERT_PATH, advert)
            .await
            .map_err(|e| PeripheralError::ExportFailed {
                path: ADVERT_PATH,
                reason: e.to_string(),
            })?;

        let service = GattService {
            uuid: application.service_uuid.to_string(),
        };
        server
            .at(GATT_SERVICE_PATH, service)
            .await
            .map_err(|e| PeripheralError::ExportFailed {
                path: GATT_SERVICE_PATH,
                reason: e.to_string(),
            })?;

        let outgoing = OutgoingCharacteristic {
            uuid: application.outgoing.uuid.to_string(),
            flags: application
                .outgoing
                .flags
                .iter()
                .map(|f| f.to_string())
                .collect(),
            value: Vec::new(),
            events: self.events_tx.clone(),
        };
        server
            .at(OUTGOING_CHAR_PATH, outgoing)
            .await
            .map_err(|e| PeripheralError::ExportFailed {
                path: OUTGOING_CHAR_PATH,
                reason: e.to_string(),
            })?;

        let incoming = IncomingCharacteristic {
            uuid: application.incoming.uuid.to_string(),
            flags: application
                .incoming
                .flags
                .iter()
                .map(|f| f.to_string())
                .collect(),
            events: self.events_tx.clone(),
        };
        server
            .at(INCOMING_CHAR_PATH, incoming)
            .await
            .map_err(|e| PeripheralError::ExportFailed {
                path: INCOMING_CHAR_PATH,
                reason: e.to_string(),
            })?;

        debug!("object graph published");
        Ok(())
    }

    async fn register_advertisement(&mut self) -> Result<()> {
        let manager = self.advertising_manager.as_ref().ok_or_else(|| {
            PeripheralError::RegistrationFailed {
                what: "advertisement",
                reason: "advertising manager proxy not acquired".to_string(),
            }
        })?;

        manager
            .register_advertisement(
                &ObjectPath::from_static_str_unchecked(ADVERT_PATH),
                HashMap::new(),
            )
            .await
            .map_err(|e| PeripheralError::RegistrationFailed {
                what: "advertisement",
                reason: e.to_string(),
            })
    }

    async fn register_application(&mut self) -> Result<()> {
        let manager =
            self.gatt_manager
                .as_ref()
                .ok_or_else(|| PeripheralError::RegistrationFailed {
                    what: "GATT application",
                    reason: "GATT manager proxy not acquired".to_string(),
                })?;

        manager
            .register_application(
                &ObjectPath::from_static_str_unchecked(GATT_ROOT_PATH),
                HashMap::new(),
            )
            .await
            .map_err(|e| PeripheralError::RegistrationFailed {
                what: "GATT application",
                reason: e.to_string(),
            })
    }

    async fn unregister_application(&mut self) -> Result<()> {
        let manager =
            self.gatt_manager
                .as_ref()
                .ok_or_else(|| PeripheralError::UnregistrationFailed {
                    what: "GATT application",
                    reason: "GATT manager proxy not acquired".to_string(),
                })?;

        manager
            .unregister_application(&ObjectPath::from_static_str_unchecked(GATT_ROOT_PATH))
            .await
            .map_err(|e| PeripheralError::UnregistrationFailed {
                what: "GATT application",
                reason: e.to_string(),
            })
    }

    async fn unpublish_application(&mut self) -> Result<()> {
        let connection = self.connection()?;
        let server = connection.object_server();

        // Dropping the served structs also releases their method handlers.
        server
            .remove::<GattService, _>(GATT_SERVICE_PATH)
            .await
            .map_err(|e| PeripheralError::ExportFailed {
                path: GATT_SERVICE_PATH,
                reason: e.to_string(),
            })?;
        server
            .remove::<OutgoingCharacteristic, _>(OUTGOING_CHAR_PATH)
            .await
            .map_err(|e| PeripheralError::ExportFailed {
                path: OUTGOING_CHAR_PATH,
                reason: e.to_string(),
            })?;
        server
            .remove::<IncomingCharacteristic, _>(INCOMING_CHAR_PATH)
            .await
            .map_err(|e| PeripheralError::ExportFailed {
                path: INCOMING_CHAR_PATH,
                reason: e.to_string(),
            })?;

        debug!("GATT objects unexported");
        Ok(())
    }

    async fn unregister_advertisement(&mut self) -> Result<()> {
        let manager = self.advertising_manager.as_ref().ok_or_else(|| {
            PeripheralError::UnregistrationFailed {
                what: "advertisement",
                reason: "advertising manager proxy not acquired".to_string(),
            }
        })?;

        manager
            .unregister_advertisement(&ObjectPath::from_static_str_unchecked(ADVERT_PATH))
            .await
            .map_err(|e| PeripheralError::UnregistrationFailed {
                what: "advertisement",
                reason: e.to_string(),
            })
    }

    async fn unpublish_advertisement(&mut self) -> Result<()> {
        let connection = self.connection()?;
        connection
            .object_server()
            .remove::<Advertisement, _>(ADVERT_PATH)
            .await
            .map_err(|e| PeripheralError::ExportFailed {
                path: ADVERT_PATH,
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn release(&mut self) -> Result<()> {
        if let Some(connection) = self.connection.take() {
            let server = connection.object_server();
            for root in [ADVERT_ROOT_PATH, GATT_ROOT_PATH] {
                if let Err(error) = server.remove::<zbus::fdo::ObjectManager, _>(root).await {
                    debug!(%error, root, "removing object manager root");
                }
            }
        }
        self.advertising_manager = None;
        self.gatt_manager = None;
        debug!("host handles released");
        Ok(())
    }

    async fn update_outgoing_value(&mut self, chunk: &[u8]) -> Result<()> {
        let connection = self.connection()?;
        let iface = connection
            .object_server()
            .interface::<_, OutgoingCharacteristic>(OUTGOING_CHAR_PATH)
            .await
            .map_err(|e| PeripheralError::ExportFailed {
                path: OUTGOING_CHAR_PATH,
                reason: e.to_string(),
            })?;

        iface.get_mut().await.value = chunk.to_vec();

        // Flushing the property emits PropertiesChanged, which is what
        // subscribed centrals receive as the notification.
        let context = iface.signal_context();
        iface
            .get()
            .await
            .value_changed(context)
            .await
            .map_err(|e| PeripheralError::ExportFailed {
                path: OUTGOING_CHAR_PATH,
                reason: e.to_string(),
            })?;

        Ok(())
    }

    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<BrokerEvent>> {
        self.events_rx.take()
    }
}
