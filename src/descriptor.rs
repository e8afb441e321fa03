//! Types for (standard) descriptors
//!
//! This module contains the subset of USB descriptors needed to locate the endpoints of a Bluetooth controller.
//!
//! The [`parse`] submodule contains functions for parsing raw descriptors into these structures.
//!
//! All descriptors have a common framing: the first two bytes contain the descriptor **length** and **type** respectively.
//! This framing is represented by the [`Descriptor`] type.
//!

use crate::types::TransferType;
use usb_device::UsbDirection;

/// [`descriptor_type`](Descriptor::descriptor_type) identifying a [`ConfigurationDescriptor`]
pub const TYPE_CONFIGURATION: u8 = 2;
/// [`descriptor_type`](Descriptor::descriptor_type) identifying an [`InterfaceDescriptor`]
pub const TYPE_INTERFACE: u8 = 4;
/// [`descriptor_type`](Descriptor::descriptor_type) identifying an [`EndpointDescriptor`]
pub const TYPE_ENDPOINT: u8 = 5;

/// Maximum number of endpoints an [`Interface`] can hold
pub const MAX_ENDPOINTS: usize = 16;

/// Outer framing of a descriptor
pub struct Descriptor<'a> {
    /// Total length of the descriptor, including this length byte itself and the `descriptor_type` byte
    pub length: u8,
    /// Type of descriptor. If this is a standard descriptor, it corresponds to one of the `TYPE_*` constants,
    /// otherwise it is class or vendor specific.
    pub descriptor_type: u8,
    /// Remaining data of the descriptor, `length - 2` bytes long.
    pub data: &'a [u8],
}

/// The configuration descriptor describes information about a specific device configuration.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConfigurationDescriptor {
    /// Total length of data returned for this configuration.
    ///
    /// Includes the combined length of all descriptors (configuration, interface,
    /// endpoint, and class- or vendor-specific) returned for this configuration.
    pub total_length: u16,

    /// Number of interfaces supported by this configuration
    pub num_interfaces: u8,

    /// Value to use as an argument to the SetConfiguration() request to select this configuration
    pub value: u8,
}

/// The interface descriptor describes a specific interface within a configuration.
///
/// The endpoint descriptors for an interface follow the interface descriptor in the configuration descriptor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterfaceDescriptor {
    /// Number of this interface.
    pub interface_number: u8,

    /// Value used to select this alternate setting for the interface identified in the prior field
    pub alternate_setting: u8,

    /// Number of endpoints used by this interface (excluding endpoint zero).
    pub num_endpoints: u8,

    /// Class code (assigned by the USB-IF). `0xE0` is "Wireless Controller".
    pub interface_class: u8,

    /// Subclass code. `0x01` is "RF Controller".
    pub interface_sub_class: u8,

    /// Protocol code. `0x01` is "Bluetooth Programming Interface".
    pub interface_protocol: u8,

    /// Index of string descriptor describing this interface
    pub interface_index: u8,
}

impl InterfaceDescriptor {
    /// Does this interface carry HCI commands, events and ACL data of a Bluetooth controller?
    pub fn is_bluetooth(&self) -> bool {
        self.interface_class == 0xE0 && self.interface_sub_class == 0x01 && self.interface_protocol == 0x01
    }
}

/// Each endpoint used for an interface has its own descriptor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EndpointDescriptor {
    /// The address of the endpoint on the USB device described by this descriptor.
    pub address: EndpointAddress,

    /// This field describes the endpoint’s attributes when it is configured using the bConfigurationValue.
    pub attributes: EndpointAttributes,

    /// Maximum packet size this endpoint is capable of sending or receiving when this configuration is selected.
    pub max_packet_size: u16,

    /// Interval for polling endpoint for data transfers.
    ///
    /// Expressed in frames (1 millisecond).
    pub interval: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Address of an endpoint
///
/// Part of an [`EndpointDescriptor`].
pub struct EndpointAddress(u8);

impl EndpointAddress {
    /// Endpoint number
    ///
    /// Ranges from 1 to 15.
    pub fn number(&self) -> u8 {
        self.0 & 0x0F
    }

    /// Direction of the endpoint
    pub fn direction(&self) -> UsbDirection {
        self.0.into()
    }
}

impl From<u8> for EndpointAddress {
    fn from(value: u8) -> Self {
        EndpointAddress(value)
    }
}

impl From<EndpointAddress> for u8 {
    fn from(value: EndpointAddress) -> Self {
        value.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Attributes of an endpoint
///
/// Part of an [`EndpointDescriptor`].
pub struct EndpointAttributes(u8);

impl EndpointAttributes {
    pub fn transfer_type(&self) -> TransferType {
        self.0.into()
    }
}

impl From<u8> for EndpointAttributes {
    fn from(value: u8) -> Self {
        EndpointAttributes(value)
    }
}

/// An interface descriptor, together with the descriptors of its endpoints
///
/// This is what a transport is bound to (see [`HciTransport::bind`](crate::HciTransport::bind)).
/// It can be assembled by hand, or found in a configuration descriptor with [`crate::discovery::find_bluetooth_interface`].
#[derive(Clone, Debug)]
pub struct Interface {
    pub descriptor: InterfaceDescriptor,
    endpoints: [Option<EndpointDescriptor>; MAX_ENDPOINTS],
}

impl Interface {
    pub fn new(descriptor: InterfaceDescriptor) -> Self {
        Self {
            descriptor,
            endpoints: [None; MAX_ENDPOINTS],
        }
    }

    /// Add an endpoint descriptor.
    ///
    /// Hands the descriptor back if there is no room left.
    pub fn push_endpoint(&mut self, endpoint: EndpointDescriptor) -> Result<(), EndpointDescriptor> {
        match self.endpoints.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => {
                *slot = Some(endpoint);
                Ok(())
            }
            None => Err(endpoint),
        }
    }

    /// Endpoints, in the order they were added
    pub fn endpoints(&self) -> impl Iterator<Item = &EndpointDescriptor> + '_ {
        self.endpoints.iter().filter_map(|slot| slot.as_ref())
    }
}

pub mod parse {
    use nom::IResult;
    use nom::combinator::map;
    use nom::sequence::tuple;
    use nom::bytes::streaming::take;
    use nom::number::streaming::{u8, le_u16};

    use super::*;

    /// Parse outer framing of a descriptor
    ///
    /// The resulting `data` within the descriptor can then be parsed with one of the other functions below,
    /// depending on the `type`.
    pub fn any_descriptor(input: &[u8]) -> IResult<&[u8], Descriptor<'_>> {
        let (input, (length, descriptor_type)) = tuple((u8, u8))(input)?;
        let (input, data) = take(length.saturating_sub(2) as usize)(input)?;
        Ok((input, Descriptor { length, descriptor_type, data }))
    }

    /// Parse descriptor data for a configuration
    ///
    /// Only the fields of [`ConfigurationDescriptor`] are consumed.
    pub fn configuration_descriptor(input: &[u8]) -> IResult<&[u8], ConfigurationDescriptor> {
        map(
            tuple((le_u16, u8, u8)),
            |(total_length, num_interfaces, value)| {
                ConfigurationDescriptor { total_length, num_interfaces, value }
            }
        )(input)
    }

    /// Parse descriptor data for an interface
    pub fn interface_descriptor(input: &[u8]) -> IResult<&[u8], InterfaceDescriptor> {
        map(
            tuple((u8, u8, u8, u8, u8, u8, u8)),
            |(interface_number, alternate_setting, num_endpoints, interface_class, interface_sub_class,
              interface_protocol, interface_index)| {
                InterfaceDescriptor {
                    interface_number, alternate_setting, num_endpoints, interface_class, interface_sub_class,
                    interface_protocol, interface_index,
                }
            }
        )(input)
    }

    /// Parse descriptor data for an endpoint
    pub fn endpoint_descriptor(input: &[u8]) -> IResult<&[u8], EndpointDescriptor> {
        map(
            tuple((u8, u8, le_u16, u8)),
            |(address, attributes, max_packet_size, interval)| {
                EndpointDescriptor {
                    address: EndpointAddress(address),
                    attributes: EndpointAttributes(attributes),
                    max_packet_size,
                    interval,
                }
            }
        )(input)
    }

}
