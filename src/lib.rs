//! Bluetooth HCI transport for embedded USB hosts
//!
//! Binds to the primary interface of a USB Bluetooth controller, and moves HCI packets between
//! the controller and an upper stack:
//! - commands go out as class requests on the default control pipe
//! - events come in on the interrupt IN endpoint, polled once per frame
//! - ACL data goes out on the bulk OUT endpoint, and comes in on the bulk IN endpoint
//!
//! The transport never blocks. It advances whenever the host calls [`HciTransport::process`]
//! (usually from its main loop) and [`HciTransport::sof`] (on every start-of-frame).
//!
//! ```ignore
//! let interface = discovery::find_bluetooth_interface(config_descriptor)?;
//! let mut transport = HciTransport::new(bus);
//! transport.set_packet_sent_callback(&on_sent);
//! transport.set_packet_received_callback(&on_received);
//! transport.bind(device, &interface)?;
//! // ... once the class setup request went through:
//! transport.class_setup_complete();
//! loop {
//!     transport.process();
//! }
//! ```
#![cfg_attr(not(test), no_std)]

#[macro_use]
mod log;

pub mod types;
pub mod bus;
pub mod descriptor;
pub mod discovery;
pub mod packet;
mod binding;
mod buffer;
mod dispatch;
mod incoming;
mod outgoing;
mod watch;

#[cfg(test)]
mod mock;

pub use binding::{BindError, Endpoint, EndpointBinding};
pub use bus::HostBus;
pub use descriptor::Interface;
pub use dispatch::{PacketReceivedFn, PacketSentFn, ReceivedPacket};
pub use incoming::{EventState, EVENT_BUFFER_SIZE};
pub use outgoing::OutgoingState;
pub use packet::PacketType;

use fugit::MillisDurationU32;
use incoming::{AclIn, EventIn};
use outgoing::Outgoing;
use types::Device;
use watch::Timing;
use dispatch::Dispatch;

/// Room in front of each received ACL packet, for the upper stack to prepend its own data
pub const DEFAULT_PRE_BUFFER_SIZE: usize = 14;

/// Pre-buffer, plus the largest ACL packet: 4 byte header and 1021 bytes of data
pub const DEFAULT_ACL_IN_BUFFER_SIZE: usize = DEFAULT_PRE_BUFFER_SIZE + 4 + 1021;

/// The transport cannot accept another outgoing packet right now
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WouldBlock;

/// One of the four transfer directions of the transport
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Role {
    /// HCI commands, via class requests on the control pipe
    Command,
    /// Outgoing ACL data, bulk OUT
    AclOut,
    /// HCI events, interrupt IN
    EventIn,
    /// Incoming ACL data, bulk IN
    AclIn,
}

/// Result returned from [`HciTransport::process`]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PollResult {
    /// Nothing happened. Keep calling `process`.
    None,
    /// A packet was sent, or data was received
    Progress,
    /// The pipe for `role` reported nothing but errors for at least [`Config::stuck_timeout`].
    ///
    /// The transport keeps retrying. Unbind and bind again to start over.
    /// `progress` tells if the other roles moved data during the same step.
    Stuck { role: Role, progress: bool },
}

impl PollResult {
    /// Combine the results of two roles. If both are stuck, the first one is reported.
    fn merge(self, other: PollResult) -> PollResult {
        let progress = self.is_progress() || other.is_progress();
        match (self, other) {
            (PollResult::Stuck { role, .. }, _) | (_, PollResult::Stuck { role, .. }) => PollResult::Stuck { role, progress },
            _ if progress => PollResult::Progress,
            _ => PollResult::None,
        }
    }

    /// Was a packet sent, or data received?
    pub fn is_progress(&self) -> bool {
        matches!(self, PollResult::Progress | PollResult::Stuck { progress: true, .. })
    }
}

#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Report a pipe as stuck once it failed for this long.
    ///
    /// With `None` (the default), failing transfers are retried indefinitely, without ever reporting.
    pub stuck_timeout: Option<MillisDurationU32>,
}

impl Config {
    pub const fn new() -> Self {
        Self { stuck_timeout: None }
    }

    pub fn with_stuck_timeout(mut self, timeout: MillisDurationU32) -> Self {
        self.stuck_timeout = Some(timeout);
        self
    }

    /// Timeout in frames, one frame per millisecond
    fn stuck_frames(&self) -> Option<u32> {
        self.stuck_timeout.map(|timeout| timeout.to_millis())
    }
}

/// HCI transport over the endpoints of a USB Bluetooth controller
///
/// The `'a` lifetime covers outgoing packets and the callbacks. An outgoing packet stays borrowed
/// until the packet sent callback was called for it.
///
/// `ACL_IN_BUFFER_SIZE` is the size of the ACL receive buffer, including the `PRE_BUFFER_SIZE` bytes
/// reserved in front of each packet. Events always use a buffer of [`EVENT_BUFFER_SIZE`] bytes.
pub struct HciTransport<'a, B, const ACL_IN_BUFFER_SIZE: usize = DEFAULT_ACL_IN_BUFFER_SIZE, const PRE_BUFFER_SIZE: usize = DEFAULT_PRE_BUFFER_SIZE> {
    bus: B,
    config: Config,
    binding: Option<EndpointBinding>,
    outgoing: Outgoing<'a>,
    event_in: EventIn,
    acl_in: AclIn<ACL_IN_BUFFER_SIZE>,
    dispatch: Dispatch<'a>,
    /// Frames counted by `sof`
    frame: u32,
}

impl<'a, B: HostBus> HciTransport<'a, B> {
    pub fn new(bus: B) -> Self {
        Self::with_config(bus, Config::default())
    }
}

impl<'a, B: HostBus, const ACL_IN_BUFFER_SIZE: usize, const PRE_BUFFER_SIZE: usize> HciTransport<'a, B, ACL_IN_BUFFER_SIZE, PRE_BUFFER_SIZE> {
    /// Panics if `PRE_BUFFER_SIZE` does not leave room in the ACL buffer
    pub fn with_config(bus: B, config: Config) -> Self {
        Self {
            bus,
            config,
            binding: None,
            outgoing: Outgoing::new(),
            event_in: EventIn::new(),
            acl_in: AclIn::new(PRE_BUFFER_SIZE),
            dispatch: Dispatch::default(),
            frame: 0,
        }
    }

    /// Open pipes for the endpoints of the given interface, and start receiving ACL data.
    ///
    /// Any previous binding is released first. On error, no pipes are left open.
    ///
    /// Commands can only be sent, and events are only received, after [`class_setup_complete`](Self::class_setup_complete).
    pub fn bind(&mut self, device: Device, interface: &Interface) -> Result<(), BindError> {
        self.unbind();
        let binding = EndpointBinding::open(&mut self.bus, device, interface)?;
        info!(
            "bound interface {}: event {}, ACL in {}, ACL out {}",
            binding.interface,
            binding.event_in.pipe.0,
            binding.acl_in.pipe.0,
            binding.acl_out.pipe.0,
        );
        self.acl_in.arm(&mut self.bus, &binding.acl_in);
        self.binding = Some(binding);
        Ok(())
    }

    /// Release the pipes, and reset all state. Does nothing if not bound.
    ///
    /// Buffered partial packets are dropped, and so is the outgoing packet, if any.
    pub fn unbind(&mut self) {
        if let Some(binding) = self.binding.take() {
            info!("unbinding interface {}", binding.interface);
            binding.release(&mut self.bus);
        }
        self.outgoing.reset();
        self.event_in.reset();
        self.acl_in.reset();
    }

    /// The class specific setup of the interface is done.
    ///
    /// Starts polling for events, and calls the packet sent callback, so the upper stack can send its first command.
    /// Only the first call after `bind` has an effect.
    pub fn class_setup_complete(&mut self) {
        if self.binding.is_none() {
            warn!("class setup complete, but no interface is bound");
            return;
        }
        if self.outgoing.activate() {
            self.event_in.start();
            self.dispatch.packet_sent();
        }
    }

    /// Advance all transfers
    ///
    /// Callbacks are called from within this function.
    pub fn process(&mut self) -> PollResult {
        let Some(binding) = self.binding else {
            return PollResult::None
        };
        let timing = Timing {
            now: self.frame,
            stuck_after: self.config.stuck_frames(),
        };

        let outgoing = self.outgoing.process(&mut self.bus, &binding, &self.dispatch, timing);
        let event_in = self.event_in.process(&mut self.bus, &binding.event_in, &self.dispatch, timing);
        let acl_in = self.acl_in.process(&mut self.bus, &binding.acl_in, &self.dispatch, timing);
        outgoing.merge(event_in).merge(acl_in)
    }

    /// Must be called on every start-of-frame
    pub fn sof(&mut self) {
        self.frame = self.frame.wrapping_add(1);
        self.event_in.sof();
    }

    /// Is the transport ready to accept a command or an ACL packet?
    pub fn can_send_now(&self) -> bool {
        self.outgoing.is_idle()
    }

    /// Send an HCI command. `packet` starts with the opcode, without a packet indicator.
    pub fn try_send_command(&mut self, packet: &'a [u8]) -> Result<(), WouldBlock> {
        self.outgoing.send_command(packet)
    }

    /// Send an ACL packet. `packet` starts with the handle, without a packet indicator.
    pub fn try_send_acl(&mut self, packet: &'a [u8]) -> Result<(), WouldBlock> {
        self.outgoing.send_acl(packet)
    }

    /// Like [`try_send_command`](Self::try_send_command).
    ///
    /// Panics unless [`can_send_now`](Self::can_send_now).
    pub fn send_command(&mut self, packet: &'a [u8]) {
        if self.try_send_command(packet).is_err() {
            panic!("BUG: send_command while not ready to send (state {:?})", self.outgoing_state());
        }
    }

    /// Like [`try_send_acl`](Self::try_send_acl).
    ///
    /// Panics unless [`can_send_now`](Self::can_send_now).
    pub fn send_acl(&mut self, packet: &'a [u8]) {
        if self.try_send_acl(packet).is_err() {
            panic!("BUG: send_acl while not ready to send (state {:?})", self.outgoing_state());
        }
    }

    /// Replaces the previous packet sent callback
    pub fn set_packet_sent_callback(&mut self, callback: PacketSentFn<'a>) {
        self.dispatch.set_packet_sent(callback);
    }

    /// Replaces the previous packet received callback
    pub fn set_packet_received_callback(&mut self, callback: PacketReceivedFn<'a>) {
        self.dispatch.set_packet_received(callback);
    }

    pub fn outgoing_state(&self) -> OutgoingState {
        self.outgoing.state()
    }

    pub fn event_state(&self) -> EventState {
        self.event_in.state()
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    pub fn binding(&self) -> Option<&EndpointBinding> {
        self.binding.as_ref()
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }
}
