//! HCI commands and outgoing ACL data
//!
//! ```text
//!            class setup        send_command           control request ok
//!   Off ------------------> Idle -------------> Command -------------------> Idle
//!                            |
//!                            |  send_acl              submit        URB done
//!                            +------------> AclSend -------> AclPoll ---------> Idle
//! ```
//!
//! Every transition back to `Idle` notifies the upper stack that the next packet can be sent.
//!
//! Only one packet is in flight at any time. The packet stays borrowed until it was sent.

use crate::binding::EndpointBinding;
use crate::bus::{HostBus, RequestStatus, UrbState};
use crate::dispatch::Dispatch;
use crate::types::SetupPacket;
use crate::watch::{StuckWatch, Timing};
use crate::{PollResult, Role, WouldBlock};

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutgoingState {
    /// Not bound, or the class setup has not completed yet
    Off,
    /// Ready to send
    Idle,
    /// Command control request in progress
    Command,
    /// ACL packet waiting to be submitted
    AclSend,
    /// ACL packet submitted, waiting for the transfer to complete
    AclPoll,
}

#[derive(Copy, Clone)]
enum State<'a> {
    Off,
    Idle,
    Command(&'a [u8]),
    AclSend(&'a [u8]),
    AclPoll,
}

pub(crate) struct Outgoing<'a> {
    state: State<'a>,
    watch: StuckWatch,
}

impl<'a> Outgoing<'a> {
    pub const fn new() -> Self {
        Self {
            state: State::Off,
            watch: StuckWatch::new(),
        }
    }

    pub fn state(&self) -> OutgoingState {
        match self.state {
            State::Off => OutgoingState::Off,
            State::Idle => OutgoingState::Idle,
            State::Command(_) => OutgoingState::Command,
            State::AclSend(_) => OutgoingState::AclSend,
            State::AclPoll => OutgoingState::AclPoll,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::Idle)
    }

    pub fn reset(&mut self) {
        self.state = State::Off;
        self.watch.healthy();
    }

    /// Leave `Off`. Returns `false` if the machine was already running.
    pub fn activate(&mut self) -> bool {
        if let State::Off = self.state {
            trace!("outgoing: Off -> Idle");
            self.state = State::Idle;
            true
        } else {
            false
        }
    }

    pub fn send_command(&mut self, packet: &'a [u8]) -> Result<(), WouldBlock> {
        if !self.is_idle() {
            return Err(WouldBlock);
        }
        trace!("outgoing: Idle -> Command ({} bytes)", packet.len());
        self.state = State::Command(packet);
        Ok(())
    }

    pub fn send_acl(&mut self, packet: &'a [u8]) -> Result<(), WouldBlock> {
        if !self.is_idle() {
            return Err(WouldBlock);
        }
        trace!("outgoing: Idle -> AclSend ({} bytes)", packet.len());
        self.state = State::AclSend(packet);
        Ok(())
    }

    fn sent(&mut self, dispatch: &Dispatch<'a>) -> PollResult {
        self.state = State::Idle;
        self.watch.healthy();
        dispatch.packet_sent();
        PollResult::Progress
    }

    pub fn process<B: HostBus>(&mut self, bus: &mut B, binding: &EndpointBinding, dispatch: &Dispatch<'a>, timing: Timing) -> PollResult {
        match self.state {
            State::Command(packet) => {
                let setup = SetupPacket::hci_command(binding.interface, packet.len() as u16);
                match bus.control_out(setup, packet) {
                    RequestStatus::Ok => {
                        trace!("outgoing: Command -> Idle");
                        self.sent(dispatch)
                    }
                    RequestStatus::Busy => {
                        self.watch.healthy();
                        PollResult::None
                    }
                    RequestStatus::Fail => {
                        warn!("HCI command request failed, retrying");
                        self.stuck(Role::Command, timing)
                    }
                }
            }
            State::AclSend(packet) => {
                bus.bulk_out(binding.acl_out.pipe, packet);
                self.state = State::AclPoll;
                PollResult::None
            }
            State::AclPoll => match bus.urb_state(binding.acl_out.pipe) {
                state if state.is_pending() => {
                    self.watch.healthy();
                    PollResult::None
                }
                UrbState::Done => {
                    trace!("outgoing: AclPoll -> Idle");
                    self.sent(dispatch)
                }
                other => {
                    warn!("URB state ACL out: {}", other);
                    self.stuck(Role::AclOut, timing)
                }
            },
            State::Off | State::Idle => PollResult::None,
        }
    }

    fn stuck(&mut self, role: Role, timing: Timing) -> PollResult {
        if self.watch.failing(timing) {
            error!("{} is stuck", role);
            PollResult::Stuck { role, progress: false }
        } else {
            PollResult::None
        }
    }
}
