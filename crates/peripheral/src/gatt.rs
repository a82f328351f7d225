//! GATT object graph definitions.
//!
//! The peripheral publishes three objects under two independent object
//! manager roots: one advertisement and one GATT service with its two
//! characteristics. The paths, UUIDs and flags here are compatibility
//! critical — the Android central resolves the peripheral by these exact
//! values.
//!
//! # Object layout
//!
//! ```text
//! /org/bluez                     (object manager root, advertisement)
//! /org/bluez/hci0/advert1        org.bluez.LEAdvertisement1
//! /org/bluez/gatt                (object manager root, GATT application)
//! /org/bluez/gatt/service0       org.bluez.GattService1
//! /org/bluez/gatt/service0/char0 org.bluez.GattCharacteristic1 (outgoing)
//! /org/bluez/gatt/service0/char1 org.bluez.GattCharacteristic1 (incoming)
//! ```

use crate::uuid::ServiceUuid;

/// Well-known name of the host Bluetooth service.
pub const BLUEZ_SERVICE_NAME: &str = "org.bluez";

/// Object manager root for the advertisement.
pub const ADVERT_ROOT_PATH: &str = "/org/bluez";

/// Path of the published advertisement object.
pub const ADVERT_PATH: &str = "/org/bluez/hci0/advert1";

/// Path of the default Bluetooth controller.
pub const DEVICE_PATH: &str = "/org/bluez/hci0";

/// Object manager root for the GATT application.
pub const GATT_ROOT_PATH: &str = "/org/bluez/gatt";

/// Path of the published GATT service object.
pub const GATT_SERVICE_PATH: &str = "/org/bluez/gatt/service0";

/// Path of the outgoing (peripheral to central) characteristic.
pub const OUTGOING_CHAR_PATH: &str = "/org/bluez/gatt/service0/char0";

/// Path of the incoming (central to peripheral) characteristic.
pub const INCOMING_CHAR_PATH: &str = "/org/bluez/gatt/service0/char1";

/// UUID of the outgoing characteristic (notify only).
pub const OUTGOING_CHAR_UUID: &str = "56add98a-0e8a-4113-85bf-6dc97b58a9c2";

/// UUID of the incoming characteristic (write / write-without-response).
pub const INCOMING_CHAR_UUID: &str = "56add98a-0e8a-4113-85bf-6dc97b58a9c1";

/// Flags of the outgoing characteristic.
pub const OUTGOING_CHAR_FLAGS: &[&str] = &["notify"];

/// Flags of the incoming characteristic.
pub const INCOMING_CHAR_FLAGS: &[&str] = &["write", "write-without-response"];

/// Advertisement type published to the host.
pub const ADVERT_TYPE: &str = "peripheral";

/// Properties of the advertisement object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisementSpec {
    /// Service UUIDs carried in the advertisement (a single derived UUID)
    pub service_uuid: ServiceUuid,
}

impl AdvertisementSpec {
    /// Describe an advertisement for a derived service UUID.
    pub fn new(service_uuid: ServiceUuid) -> Self {
        Self { service_uuid }
    }
}

/// Properties of one published characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicSpec {
    /// Object path the characteristic is exported at
    pub path: &'static str,

    /// Characteristic UUID
    pub uuid: &'static str,

    /// GATT flags
    pub flags: &'static [&'static str],

    /// Whether the characteristic exposes a `Notifying` property
    pub notifying: Option<bool>,
}

/// Properties of the GATT application: one primary service with an
/// outgoing and an incoming characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattApplicationSpec {
    /// Derived service UUID, identical to the advertised one
    pub service_uuid: ServiceUuid,

    /// Outgoing characteristic (value updates + notifications)
    pub outgoing: CharacteristicSpec,

    /// Incoming characteristic (central writes)
    pub incoming: CharacteristicSpec,
}

impl GattApplicationSpec {
    /// Describe the GATT application for a derived service UUID.
    pub fn new(service_uuid: ServiceUuid) -> Self {
        Self {
            service_uuid,
            outgoing: CharacteristicSpec {
                path: OUTGOING_CHAR_PATH,
                uuid: OUTGOING_CHAR_UUID,
                flags: OUTGOING_CHAR_FLAGS,
                notifying: Some(false),
            },
            incoming: CharacteristicSpec {
                path: INCOMING_CHAR_PATH,
                uuid: INCOMING_CHAR_UUID,
                flags: INCOMING_CHAR_FLAGS,
                notifying: None,
            },
        }
    }
}
