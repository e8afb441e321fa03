use core::num::NonZeroU8;
use usb_device::{UsbDirection, control::{Recipient, RequestType}};

/// An address that was assigned to a device by the host.
///
/// This type only represents assigned addresses, and thus cannot represent the special address 0.
/// A Bluetooth controller is only bound after enumeration, so it always has one of these.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceAddress(pub(crate) NonZeroU8);

impl DeviceAddress {
    /// Returns `None` for the (unassigned) address 0
    pub fn new(address: u8) -> Option<Self> {
        NonZeroU8::new(address).map(DeviceAddress)
    }
}

impl From<DeviceAddress> for u16 {
    fn from(value: DeviceAddress) -> Self {
        u8::from(value.0) as u16
    }
}

impl From<DeviceAddress> for u8 {
    fn from(value: DeviceAddress) -> Self {
        u8::from(value.0)
    }
}

/// Refers to the speed at which a device operates
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ConnectionSpeed {
    /// USB 1.0 low speed
    Low,
    /// USB 1.0 full speed
    Full,
    /// USB 2.0 high speed
    High,
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConnectionSpeed {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}", match self {
            ConnectionSpeed::Low => "low",
            ConnectionSpeed::Full => "full",
            ConnectionSpeed::High => "high",
        })
    }
}

/// The device a transport is bound to
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Device {
    pub address: DeviceAddress,
    pub speed: ConnectionSpeed,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum TransferType {
    Control = 0,
    Isochronous = 1,
    Bulk = 2,
    Interrupt = 3,
}

impl From<u8> for TransferType {
    /// Interprets the two lowest bits, as found in `bmAttributes` of an endpoint descriptor
    fn from(value: u8) -> Self {
        match value & 0b11 {
            0 => TransferType::Control,
            1 => TransferType::Isochronous,
            2 => TransferType::Bulk,
            _ => TransferType::Interrupt,
        }
    }
}

/// Handle for a pipe, as handed out by [`HostBus::open_pipe`](crate::bus::HostBus::open_pipe)
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PipeId(pub u8);

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetupPacket {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: u16,
}

impl SetupPacket {
    pub fn new(direction: UsbDirection, request_type: RequestType, recipient: Recipient, request: u8, value: u16, index: u16, length: u16) -> Self {
        Self {
            request_type: (recipient as u8) | ((request_type as u8) << 5) | (direction as u8),
            request,
            value,
            index,
            length,
        }
    }

    /// Class request carrying an HCI command to the given interface
    ///
    /// HCI commands always go out on the default control pipe, with `bRequest` and `wValue` set to zero.
    pub fn hci_command(interface: u8, length: u16) -> Self {
        Self::new(
            UsbDirection::Out,
            RequestType::Class,
            Recipient::Interface,
            0,
            0,
            interface as u16,
            length,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hci_command_setup() {
        let setup = SetupPacket::hci_command(0, 7);
        assert_eq!(setup.request_type, 0x21);
        assert_eq!(setup.request, 0);
        assert_eq!(setup.value, 0);
        assert_eq!(setup.index, 0);
        assert_eq!(setup.length, 7);
    }

    #[test]
    fn test_device_address() {
        assert!(DeviceAddress::new(0).is_none());
        assert_eq!(DeviceAddress::new(5).map(u8::from), Some(5));
    }

    #[test]
    fn test_transfer_type_from_attributes() {
        assert_eq!(TransferType::from(0x02), TransferType::Bulk);
        assert_eq!(TransferType::from(0x03), TransferType::Interrupt);
        // upper bits (synchronization / usage type) are ignored
        assert_eq!(TransferType::from(0x0D), TransferType::Isochronous);
    }
}
