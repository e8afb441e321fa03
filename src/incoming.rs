//! HCI events and incoming ACL data
//!
//! Events arrive on the interrupt IN endpoint. A new interrupt transfer is submitted once per frame:
//!
//! ```text
//!          class setup                   submit           URB done
//!   Off -----------------> SubmitRequest --------> Poll -----------> WaitSof
//!                               ^                   |                   |
//!                               |        SOF        |        SOF        |
//!                               +-------------------+-------------------+
//! ```
//!
//! ACL data arrives on the bulk IN endpoint. There is always a bulk transfer in flight:
//! as soon as one completes, the next one is submitted.
//!
//! Received bytes are collected in a [`PacketBuffer`] per endpoint. Whenever it holds a complete
//! packet, the packet is passed to the upper stack, and the remaining bytes are kept for the next one.

use crate::binding::Endpoint;
use crate::buffer::PacketBuffer;
use crate::bus::{HostBus, UrbState};
use crate::dispatch::{Dispatch, ReceivedPacket};
use crate::packet::PacketType;
use crate::watch::{StuckWatch, Timing};
use crate::{PollResult, Role};

/// Event header (2 bytes) plus the largest possible parameter length
pub const EVENT_BUFFER_SIZE: usize = 2 + 255;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EventState {
    /// Not bound, or the class setup has not completed yet
    Off,
    /// An interrupt transfer will be submitted on the next step
    SubmitRequest,
    /// Interrupt transfer in flight
    Poll,
    /// Interrupt transfer complete, waiting for the next frame
    WaitSof,
}

/// Move the data of the completed transfer into the buffer
fn receive<B: HostBus, const N: usize>(bus: &B, endpoint: &Endpoint, buffer: &mut PacketBuffer<N>) {
    let size = bus.last_transfer_size(endpoint.pipe) as usize;
    let Some(data) = bus.pipe_buf(endpoint.pipe).get(..size) else {
        panic!("BUG: pipe buffer holds less than the {} bytes transferred", size)
    };
    trace!("received {} bytes on pipe {}", size, endpoint.pipe.0);
    buffer.extend(data);
}

/// Pass every complete packet at the front of the buffer to the upper stack
fn dispatch_complete<const N: usize>(buffer: &mut PacketBuffer<N>, packet_type: PacketType, dispatch: &Dispatch<'_>) {
    while let Some(len) = buffer.complete_packet(packet_type) {
        let pre_buffer = buffer.pre_buffer_len();
        dispatch.packet_received(ReceivedPacket::new(packet_type, buffer.packet_mut(len), pre_buffer));
        buffer.consume(len);
        if !buffer.is_empty() {
            debug!("{} bytes left over", buffer.len());
        }
    }

    if let Some(len) = buffer.drop_oversized(packet_type) {
        error!("{} packet of {} bytes does not fit the receive buffer ({} bytes), dropping it", packet_type, len, buffer.capacity());
    }
}

pub(crate) struct EventIn {
    state: EventState,
    buffer: PacketBuffer<EVENT_BUFFER_SIZE>,
    watch: StuckWatch,
}

impl EventIn {
    pub const fn new() -> Self {
        Self {
            state: EventState::Off,
            buffer: PacketBuffer::new(),
            watch: StuckWatch::new(),
        }
    }

    pub fn state(&self) -> EventState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = EventState::Off;
        self.buffer.reset();
        self.watch.healthy();
    }

    /// Start polling for events
    pub fn start(&mut self) {
        if self.state == EventState::Off {
            trace!("event: Off -> SubmitRequest");
            self.state = EventState::SubmitRequest;
        }
    }

    /// A new frame has started
    pub fn sof(&mut self) {
        if let EventState::WaitSof | EventState::Poll = self.state {
            self.state = EventState::SubmitRequest;
        }
    }

    pub fn process<B: HostBus>(&mut self, bus: &mut B, endpoint: &Endpoint, dispatch: &Dispatch<'_>, timing: Timing) -> PollResult {
        match self.state {
            EventState::SubmitRequest => {
                let size = self.buffer.transfer_size(endpoint.max_packet_size);
                bus.interrupt_in(endpoint.pipe, size);
                self.state = EventState::Poll;
                PollResult::None
            }
            EventState::Poll => match bus.urb_state(endpoint.pipe) {
                state if state.is_pending() => {
                    self.watch.healthy();
                    PollResult::None
                }
                UrbState::Done => {
                    self.state = EventState::WaitSof;
                    self.watch.healthy();
                    receive(bus, endpoint, &mut self.buffer);
                    dispatch_complete(&mut self.buffer, PacketType::Event, dispatch);
                    PollResult::Progress
                }
                other => {
                    warn!("URB state event: {}", other);
                    stuck(&mut self.watch, Role::EventIn, timing)
                }
            },
            EventState::Off | EventState::WaitSof => PollResult::None,
        }
    }

    #[cfg(test)]
    pub(crate) fn buffered(&self) -> &[u8] {
        self.buffer.data()
    }
}

pub(crate) struct AclIn<const N: usize> {
    buffer: PacketBuffer<N>,
    watch: StuckWatch,
}

impl<const N: usize> AclIn<N> {
    pub const fn new(pre_buffer: usize) -> Self {
        Self {
            buffer: PacketBuffer::with_pre_buffer(pre_buffer),
            watch: StuckWatch::new(),
        }
    }

    pub fn reset(&mut self) {
        self.buffer.reset();
        self.watch.healthy();
    }

    /// Submit the next bulk transfer
    pub fn arm<B: HostBus>(&mut self, bus: &mut B, endpoint: &Endpoint) {
        let size = self.buffer.transfer_size(endpoint.max_packet_size);
        bus.bulk_in(endpoint.pipe, size);
    }

    pub fn process<B: HostBus>(&mut self, bus: &mut B, endpoint: &Endpoint, dispatch: &Dispatch<'_>, timing: Timing) -> PollResult {
        match bus.urb_state(endpoint.pipe) {
            state if state.is_pending() => {
                self.watch.healthy();
                PollResult::None
            }
            UrbState::Done => {
                self.watch.healthy();
                receive(bus, endpoint, &mut self.buffer);
                dispatch_complete(&mut self.buffer, PacketType::AclData, dispatch);
                self.arm(bus, endpoint);
                PollResult::Progress
            }
            other => {
                warn!("URB state ACL in: {}", other);
                stuck(&mut self.watch, Role::AclIn, timing)
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn buffered(&self) -> &[u8] {
        self.buffer.data()
    }
}

fn stuck(watch: &mut StuckWatch, role: Role, timing: Timing) -> PollResult {
    if watch.failing(timing) {
        error!("{} is stuck", role);
        PollResult::Stuck { role, progress: false }
    } else {
        PollResult::None
    }
}
