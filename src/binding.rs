//! Binding to the endpoints of a Bluetooth interface
//!
//! The primary interface of a Bluetooth controller has three endpoints:
//! - an interrupt IN endpoint carrying HCI events
//! - a bulk IN endpoint carrying incoming ACL data
//! - a bulk OUT endpoint carrying outgoing ACL data
//!
//! HCI commands go out over the default control pipe, so they need no endpoint of their own.
//!
//! All three endpoints must be present. A binding is either complete, or it does not exist.

use crate::bus::HostBus;
use crate::descriptor::{EndpointAddress, EndpointDescriptor, Interface};
use crate::types::{Device, PipeId, TransferType};
use usb_device::UsbDirection;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BindError {
    /// The interface lacks one of the three required endpoints
    EndpointsNotFound,
    /// The host bus ran out of pipes
    PipeUnavailable,
}

/// An endpoint with an open pipe
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Endpoint {
    pub address: EndpointAddress,
    pub pipe: PipeId,
    pub max_packet_size: u16,
}

/// Pipes for all endpoints of the bound interface
///
/// Does not change until the interface is unbound.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EndpointBinding {
    /// Interface number, addressed by HCI command requests
    pub interface: u8,
    pub event_in: Endpoint,
    pub acl_in: Endpoint,
    pub acl_out: Endpoint,
}

/// Endpoint descriptors, by role
struct Roles {
    event_in: EndpointDescriptor,
    acl_in: EndpointDescriptor,
    acl_out: EndpointDescriptor,
}

fn classify(interface: &Interface) -> Result<Roles, BindError> {
    let mut event_in = None;
    let mut acl_in = None;
    let mut acl_out = None;

    for endpoint in interface.endpoints() {
        debug!(
            "interface {}, endpoint {:#X}: type {}, packet size {}, interval {}",
            interface.descriptor.interface_number,
            u8::from(endpoint.address),
            endpoint.attributes.transfer_type(),
            endpoint.max_packet_size,
            endpoint.interval,
        );
        match (endpoint.address.direction(), endpoint.attributes.transfer_type()) {
            (UsbDirection::In, TransferType::Interrupt) => {
                debug!("-> HCI event");
                event_in = Some(*endpoint);
            }
            (UsbDirection::In, TransferType::Bulk) => {
                debug!("-> ACL in");
                acl_in = Some(*endpoint);
            }
            (UsbDirection::Out, TransferType::Bulk) => {
                debug!("-> ACL out");
                acl_out = Some(*endpoint);
            }
            _ => {}
        }
    }

    match (event_in, acl_in, acl_out) {
        (Some(event_in), Some(acl_in), Some(acl_out)) => Ok(Roles { event_in, acl_in, acl_out }),
        _ => {
            info!("could not find all endpoints");
            Err(BindError::EndpointsNotFound)
        }
    }
}

fn open_endpoint<B: HostBus>(bus: &mut B, device: Device, descriptor: &EndpointDescriptor, transfer_type: TransferType) -> Option<Endpoint> {
    let pipe = bus.open_pipe(device, descriptor.address, transfer_type, descriptor.max_packet_size)?;
    bus.reset_toggle(pipe);
    Some(Endpoint {
        address: descriptor.address,
        pipe,
        max_packet_size: descriptor.max_packet_size,
    })
}

impl EndpointBinding {
    /// Find the endpoints of the interface, and open a pipe for each of them.
    ///
    /// If any pipe cannot be opened, those opened so far are released again.
    pub(crate) fn open<B: HostBus>(bus: &mut B, device: Device, interface: &Interface) -> Result<Self, BindError> {
        let roles = classify(interface)?;

        let event_in = open_endpoint(bus, device, &roles.event_in, TransferType::Interrupt);
        let acl_in = open_endpoint(bus, device, &roles.acl_in, TransferType::Bulk);
        let acl_out = open_endpoint(bus, device, &roles.acl_out, TransferType::Bulk);

        match (event_in, acl_in, acl_out) {
            (Some(event_in), Some(acl_in), Some(acl_out)) => Ok(EndpointBinding {
                interface: interface.descriptor.interface_number,
                event_in,
                acl_in,
                acl_out,
            }),
            (event_in, acl_in, acl_out) => {
                for endpoint in [event_in, acl_in, acl_out].into_iter().flatten() {
                    bus.release_pipe(endpoint.pipe);
                }
                info!("not enough pipes for the bluetooth interface");
                Err(BindError::PipeUnavailable)
            }
        }
    }

    pub(crate) fn release<B: HostBus>(&self, bus: &mut B) {
        bus.release_pipe(self.event_in.pipe);
        bus.release_pipe(self.acl_in.pipe);
        bus.release_pipe(self.acl_out.pipe);
    }
}
