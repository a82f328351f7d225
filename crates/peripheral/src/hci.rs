//! Advertising-interval tuning over raw HCI.
//!
//! The host advertising manager offers no control over the advertising
//! interval, so immediately after an advertisement is registered the
//! service pushes three vendor-neutral commands straight to the
//! controller: disable advertising, set the interval parameters, enable
//! again. Failures are logged and advertising proceeds with host defaults.
//!
//! The capability is a trait so unit tests and non-Linux builds can swap
//! in [`NoopHciTuner`]; only [`LinuxHciTuner`] touches the kernel.

use crate::error::{PeripheralError, Result};

/// LE controller command group.
const OGF_LE_CTRL: u16 = 0x08;

/// LE Set Advertising Parameters command.
const OCF_LE_SET_ADVERTISING_PARAMETERS: u16 = 0x0006;

/// LE Set Advertising Enable command.
const OCF_LE_SET_ADVERTISE_ENABLE: u16 = 0x000A;

/// Connectable and scannable undirected advertising.
const ADVERTISING_TYPE_UNDIRECTED: u8 = 0x00;

/// Advertise on channels 37, 38 and 39.
const CHANNEL_MAP_ALL: u8 = 0x07;

/// Advertising interval bounds in 0.625 ms units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvertisingInterval {
    /// Minimum interval
    pub min: u16,
    /// Maximum interval
    pub max: u16,
}

/// Capability to tune the controller's advertising interval.
///
/// May block briefly on local device I/O; never called while an async
/// host operation is outstanding.
pub trait HciTuner: Send {
    /// Apply `interval` to the default controller.
    ///
    /// # Errors
    ///
    /// Returns [`PeripheralError::HciUnavailable`] when the device cannot
    /// be opened or written. Callers log and continue.
    fn tune(&self, interval: &AdvertisingInterval) -> Result<()>;
}

/// Tuner that does nothing. Used by tests and when tuning is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHciTuner;

impl HciTuner for NoopHciTuner {
    fn tune(&self, _interval: &AdvertisingInterval) -> Result<()> {
        Ok(())
    }
}

/// Build the 15-byte LE Set Advertising Parameters block.
///
/// Layout: interval min/max (LE16 each), advertising type, own address
/// type, peer address type, peer address (6 bytes), channel map, filter
/// policy.
fn advertising_parameters(interval: &AdvertisingInterval) -> [u8; 15] {
    let mut block = [0u8; 15];
    block[0..2].copy_from_slice(&interval.min.to_le_bytes());
    block[2..4].copy_from_slice(&interval.max.to_le_bytes());
    block[4] = ADVERTISING_TYPE_UNDIRECTED;
    block[5] = 0x01; // own address type: random
    block[6] = 0x01; // peer address type: random
    // block[7..13]: peer address, unused for undirected advertising
    block[13] = CHANNEL_MAP_ALL;
    block[14] = 0x00; // filter policy: none
    block
}

/// Pack an OGF/OCF pair into a command opcode.
fn opcode(ogf: u16, ocf: u16) -> u16 {
    (ogf << 10) | ocf
}

/// Tuner for the default controller of a Linux host.
#[derive(Debug, Clone, Copy)]
pub struct LinuxHciTuner {
    device: u16,
}

impl LinuxHciTuner {
    /// Tune a specific controller (`0` for `hci0`).
    pub fn new(device: u16) -> Self {
        Self { device }
    }

    /// Tune the default controller.
    pub fn default_device() -> Self {
        Self::new(0)
    }
}

impl HciTuner for LinuxHciTuner {
    fn tune(&self, interval: &AdvertisingInterval) -> Result<()> {
        let socket = raw::HciSocket::open(self.device)?;

        socket.send_command(opcode(OGF_LE_CTRL, OCF_LE_SET_ADVERTISE_ENABLE), &[0x00])?;
        socket.send_command(
            opcode(OGF_LE_CTRL, OCF_LE_SET_ADVERTISING_PARAMETERS),
            &advertising_parameters(interval),
        )?;
        socket.send_command(opcode(OGF_LE_CTRL, OCF_LE_SET_ADVERTISE_ENABLE), &[0x01])?;

        Ok(())
    }
}

#[cfg(target_os = "linux")]
mod raw {
    //! Raw HCI socket plumbing.

    use super::PeripheralError;
    use std::os::unix::io::RawFd;

    /// Bluetooth protocol number for HCI sockets.
    const BTPROTO_HCI: libc::c_int = 1;

    /// Plain raw HCI channel.
    const HCI_CHANNEL_RAW: u16 = 0;

    /// HCI command packet indicator.
    const HCI_COMMAND_PKT: u8 = 0x01;

    #[repr(C)]
    struct SockaddrHci {
        hci_family: libc::sa_family_t,
        hci_dev: u16,
        hci_channel: u16,
    }

    /// An open raw HCI socket, closed on drop.
    pub(super) struct HciSocket {
        fd: RawFd,
    }

    impl HciSocket {
        pub(super) fn open(device: u16) -> Result<Self, PeripheralError> {
            let fd = unsafe {
                libc::socket(
                    libc::AF_BLUETOOTH,
                    libc::SOCK_RAW | libc::SOCK_CLOEXEC,
                    BTPROTO_HCI,
                )
            };
            if fd < 0 {
                return Err(last_error("opening HCI socket"));
            }

            let socket = Self { fd };

            let address = SockaddrHci {
                hci_family: libc::AF_BLUETOOTH as libc::sa_family_t,
                hci_dev: device,
                hci_channel: HCI_CHANNEL_RAW,
            };
            let bound = unsafe {
                libc::bind(
                    socket.fd,
                    std::ptr::addr_of!(address).cast(),
                    std::mem::size_of::<SockaddrHci>() as libc::socklen_t,
                )
            };
            if bound < 0 {
                return Err(last_error("binding HCI socket"));
            }

            Ok(socket)
        }

        pub(super) fn send_command(
            &self,
            opcode: u16,
            parameters: &[u8],
        ) -> Result<(), PeripheralError> {
            let mut packet = Vec::with_capacity(4 + parameters.len());
            packet.push(HCI_COMMAND_PKT);
            packet.extend_from_slice(&opcode.to_le_bytes());
            packet.push(parameters.len() as u8);
            packet.extend_from_slice(parameters);

            let written =
                unsafe { libc::write(self.fd, packet.as_ptr().cast(), packet.len()) };
            if written != packet.len() as isize {
                return Err(last_error("writing HCI command"));
            }

            Ok(())
        }
    }

    impl Drop for HciSocket {
        fn drop(&mut self) {
            unsafe {
                libc::close(self.fd);
            }
        }
    }

    fn last_error(hint: &str) -> PeripheralError {
        PeripheralError::HciUnavailable(format!(
            "{}: {}",
            hint,
            std::io::Error::last_os_error()
        ))
    }
}

#[cfg(not(target_os = "linux"))]
mod raw {
    //! Stub for hosts without raw HCI sockets.

    use super::PeripheralError;

    pub(super) struct HciSocket;

    impl HciSocket {
        pub(super) fn open(_device: u16) -> Result<Self, PeripheralError> {
            Err(PeripheralError::HciUnavailable(
                "raw HCI sockets are only available on Linux".to_string(),
            ))
        }

        pub(super) fn send_command(
            &self,
            _opcode: u16,
            _parameters: &[u8],
        ) -> Result<(), PeripheralError> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_block_layout() {
        let interval = AdvertisingInterval {
            min: 0x00A0,
            max: 0x00AF,
        };

        assert_eq!(
            advertising_parameters(&interval),
            [
                0xA0, 0x00, // interval min, little endian
                0xAF, 0x00, // interval max, little endian
                0x00, // connectable scannable undirected
                0x01, // own address type
                0x01, // peer address type
                0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // peer address
                0x07, // all three advertising channels
                0x00, // no filter policy
            ]
        );
    }

    #[test]
    fn test_opcode_packing() {
        assert_eq!(opcode(0x08, 0x000A), 0x200A);
        assert_eq!(opcode(0x08, 0x0006), 0x2006);
    }

    #[test]
    fn test_noop_tuner_always_succeeds() {
        let interval = AdvertisingInterval {
            min: 0x0020,
            max: 0x4000,
        };
        assert!(NoopHciTuner.tune(&interval).is_ok());
    }
}
