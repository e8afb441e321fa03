//! A [`HostBus`] that records everything, for tests

use std::collections::VecDeque;
use std::vec::Vec;

use crate::bus::{HostBus, RequestStatus, UrbState};
use crate::descriptor::{EndpointAddress, EndpointAttributes, EndpointDescriptor, Interface, InterfaceDescriptor};
use crate::types::{ConnectionSpeed, Device, DeviceAddress, PipeId, SetupPacket, TransferType};

pub(crate) const EVENT_IN: u8 = 0x81;
pub(crate) const ACL_IN: u8 = 0x82;
pub(crate) const ACL_OUT: u8 = 0x02;

pub(crate) struct MockPipe {
    pub device: Device,
    pub endpoint: EndpointAddress,
    pub transfer_type: TransferType,
    pub max_packet_size: u16,
    pub toggle_resets: usize,
    pub released: bool,
    /// Requested length of every IN transfer
    pub submitted: Vec<u16>,
    /// Data of every OUT transfer
    pub sent: Vec<Vec<u8>>,
    pub state: UrbState,
    pub buf: Vec<u8>,
}

pub(crate) struct MockBus {
    pub pipes: Vec<MockPipe>,
    pub max_pipes: usize,
    /// Every call to `control_out`
    pub control: Vec<(SetupPacket, Vec<u8>)>,
    /// Results for upcoming `control_out` calls. `Ok` once exhausted.
    pub control_results: VecDeque<RequestStatus>,
}

impl MockBus {
    pub fn new() -> Self {
        Self {
            pipes: Vec::new(),
            max_pipes: 8,
            control: Vec::new(),
            control_results: VecDeque::new(),
        }
    }

    pub fn open_pipes(&self) -> usize {
        self.pipes.iter().filter(|pipe| !pipe.released).count()
    }

    /// The open pipe for the given endpoint address
    pub fn pipe(&self, address: u8) -> &MockPipe {
        self.pipes
            .iter()
            .find(|pipe| !pipe.released && u8::from(pipe.endpoint) == address)
            .expect("no open pipe for endpoint")
    }

    pub fn pipe_mut(&mut self, address: u8) -> &mut MockPipe {
        self.pipes
            .iter_mut()
            .find(|pipe| !pipe.released && u8::from(pipe.endpoint) == address)
            .expect("no open pipe for endpoint")
    }

    /// Complete the IN transfer in flight on the endpoint, with the given data
    pub fn complete_in(&mut self, address: u8, data: &[u8]) {
        let pipe = self.pipe_mut(address);
        let requested = *pipe.submitted.last().expect("no IN transfer was submitted");
        assert!(data.len() <= requested as usize, "delivering {} bytes, but only {} were requested", data.len(), requested);
        pipe.buf = data.to_vec();
        pipe.state = UrbState::Done;
    }

    pub fn set_state(&mut self, address: u8, state: UrbState) {
        self.pipe_mut(address).state = state;
    }
}

impl HostBus for MockBus {
    fn open_pipe(&mut self, device: Device, endpoint: EndpointAddress, transfer_type: TransferType, max_packet_size: u16) -> Option<PipeId> {
        if self.open_pipes() >= self.max_pipes {
            return None;
        }
        self.pipes.push(MockPipe {
            device,
            endpoint,
            transfer_type,
            max_packet_size,
            toggle_resets: 0,
            released: false,
            submitted: Vec::new(),
            sent: Vec::new(),
            state: UrbState::Idle,
            buf: Vec::new(),
        });
        Some(PipeId((self.pipes.len() - 1) as u8))
    }

    fn release_pipe(&mut self, pipe: PipeId) {
        self.pipes[pipe.0 as usize].released = true;
    }

    fn reset_toggle(&mut self, pipe: PipeId) {
        self.pipes[pipe.0 as usize].toggle_resets += 1;
    }

    fn control_out(&mut self, setup: SetupPacket, data: &[u8]) -> RequestStatus {
        self.control.push((setup, data.to_vec()));
        self.control_results.pop_front().unwrap_or(RequestStatus::Ok)
    }

    fn bulk_out(&mut self, pipe: PipeId, data: &[u8]) {
        let pipe = &mut self.pipes[pipe.0 as usize];
        pipe.sent.push(data.to_vec());
        pipe.state = UrbState::Idle;
    }

    fn bulk_in(&mut self, pipe: PipeId, length: u16) {
        let pipe = &mut self.pipes[pipe.0 as usize];
        pipe.submitted.push(length);
        pipe.buf.clear();
        pipe.state = UrbState::Idle;
    }

    fn interrupt_in(&mut self, pipe: PipeId, length: u16) {
        self.bulk_in(pipe, length)
    }

    fn urb_state(&self, pipe: PipeId) -> UrbState {
        self.pipes[pipe.0 as usize].state
    }

    fn last_transfer_size(&self, pipe: PipeId) -> u16 {
        self.pipes[pipe.0 as usize].buf.len() as u16
    }

    fn pipe_buf(&self, pipe: PipeId) -> &[u8] {
        &self.pipes[pipe.0 as usize].buf
    }
}

pub(crate) fn device() -> Device {
    Device {
        address: DeviceAddress::new(1).unwrap(),
        speed: ConnectionSpeed::Full,
    }
}

pub(crate) fn endpoint(address: u8, attributes: u8, max_packet_size: u16) -> EndpointDescriptor {
    EndpointDescriptor {
        address: EndpointAddress::from(address),
        attributes: EndpointAttributes::from(attributes),
        max_packet_size,
        interval: 1,
    }
}

/// Bluetooth interface with the given endpoints
pub(crate) fn interface(endpoints: &[EndpointDescriptor]) -> Interface {
    let mut interface = Interface::new(InterfaceDescriptor {
        interface_number: 0,
        alternate_setting: 0,
        num_endpoints: endpoints.len() as u8,
        interface_class: 0xE0,
        interface_sub_class: 0x01,
        interface_protocol: 0x01,
        interface_index: 0,
    });
    for endpoint in endpoints {
        interface.push_endpoint(*endpoint).unwrap();
    }
    interface
}

/// Event IN with 16 byte packets, ACL IN / OUT with 64 byte packets
pub(crate) fn hci_interface() -> Interface {
    interface(&[
        endpoint(EVENT_IN, 0x03, 16),
        endpoint(ACL_IN, 0x02, 64),
        endpoint(ACL_OUT, 0x02, 64),
    ])
}
