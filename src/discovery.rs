//! Locating the Bluetooth interface in a configuration descriptor
//!
//! When a configuration descriptor is requested, the device sends *all* of the nested descriptors
//! (interface, endpoint, class specifics, ...) in one blob. [`find_bluetooth_interface`] walks that blob
//! and collects the first Bluetooth primary interface (alternate setting 0), together with the endpoints that follow it.
//!
//! The isochronous (SCO) interface that Bluetooth controllers usually expose as well is skipped.

use crate::descriptor::{self, Interface};

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiscoveryError {
    /// One of the descriptors is truncated or malformed
    Parse,
    /// The configuration has no interface with class `0xE0`, subclass `0x01`, protocol `0x01`
    NoBluetoothInterface,
    /// The interface lists more than [`descriptor::MAX_ENDPOINTS`] endpoints
    TooManyEndpoints,
}

/// Find the Bluetooth primary interface in a full configuration descriptor
pub fn find_bluetooth_interface(config: &[u8]) -> Result<Interface, DiscoveryError> {
    let mut data = config;
    let mut found: Option<Interface> = None;

    while !data.is_empty() {
        let Ok((rest, desc)) = descriptor::parse::any_descriptor(data) else {
            return Err(DiscoveryError::Parse)
        };

        match desc.descriptor_type {
            descriptor::TYPE_CONFIGURATION => {
                let Ok((_, configuration)) = descriptor::parse::configuration_descriptor(desc.data) else {
                    return Err(DiscoveryError::Parse)
                };
                debug!("configuration {}, {} interface(s)", configuration.value, configuration.num_interfaces);
                if (configuration.total_length as usize) < data.len() {
                    // ignore whatever follows this configuration
                    let end = (configuration.total_length as usize).saturating_sub(desc.length as usize);
                    data = &rest[..end.min(rest.len())];
                    continue;
                }
            }
            descriptor::TYPE_INTERFACE => {
                if found.is_some() {
                    // endpoints from here on belong to a different interface
                    break;
                }
                let Ok((_, interface)) = descriptor::parse::interface_descriptor(desc.data) else {
                    return Err(DiscoveryError::Parse)
                };
                if interface.is_bluetooth() && interface.alternate_setting == 0 {
                    debug!("found bluetooth interface {}", interface.interface_number);
                    found = Some(Interface::new(interface));
                }
            }
            descriptor::TYPE_ENDPOINT => {
                if let Some(interface) = found.as_mut() {
                    let Ok((_, endpoint)) = descriptor::parse::endpoint_descriptor(desc.data) else {
                        return Err(DiscoveryError::Parse)
                    };
                    interface.push_endpoint(endpoint).map_err(|_| DiscoveryError::TooManyEndpoints)?;
                }
            }
            _ => {}
        }

        data = rest;
    }

    found.ok_or(DiscoveryError::NoBluetoothInterface)
}
