//! Interface for host bus hardware
//!
//! The transport does not talk to a USB host controller directly. Everything it needs is expressed
//! by the [`HostBus`] trait: opening pipes, submitting transfers, and querying their state.
//!
//! None of the methods block. Transfers are submitted, and their completion is observed later by
//! calling [`HostBus::urb_state`] from [`HciTransport::process`](crate::HciTransport::process).
//!

use crate::types::{Device, PipeId, SetupPacket, TransferType};
use crate::descriptor::EndpointAddress;

pub trait HostBus {
    /// Allocate a pipe for the given endpoint, and open it.
    ///
    /// Returns `None` if the controller has no pipe left.
    fn open_pipe(&mut self, device: Device, endpoint: EndpointAddress, transfer_type: TransferType, max_packet_size: u16) -> Option<PipeId>;

    /// Close the pipe and give it back to the controller
    fn release_pipe(&mut self, pipe: PipeId);

    /// Reset the data toggle of the pipe to DATA0
    fn reset_toggle(&mut self, pipe: PipeId);

    /// Run a control OUT request on the default control pipe of the bound device.
    ///
    /// This is called repeatedly with the same arguments, until it returns something other than
    /// [`RequestStatus::Busy`]. The implementation must resume the request in progress instead of starting a new one.
    ///
    /// `data` must be sent in the DATA stage. It is only guaranteed to stay valid for the duration of the call.
    fn control_out(&mut self, setup: SetupPacket, data: &[u8]) -> RequestStatus;

    /// Submit a bulk OUT transfer.
    ///
    /// The implementation must copy `data` (or start sending it) before returning.
    fn bulk_out(&mut self, pipe: PipeId, data: &[u8]);

    /// Submit a bulk IN transfer, receiving at most `length` bytes
    fn bulk_in(&mut self, pipe: PipeId, length: u16);

    /// Submit an interrupt IN transfer, receiving at most `length` bytes
    fn interrupt_in(&mut self, pipe: PipeId, length: u16);

    /// State of the last transfer submitted on the pipe
    fn urb_state(&self, pipe: PipeId) -> UrbState;

    /// Number of bytes moved by the last completed transfer on the pipe
    fn last_transfer_size(&self, pipe: PipeId) -> u16;

    /// Receive buffer of the pipe.
    ///
    /// After an IN transfer is [`UrbState::Done`], it must hold at least [`last_transfer_size`](HostBus::last_transfer_size) bytes of received data.
    fn pipe_buf(&self, pipe: PipeId) -> &[u8];
}

/// State of a USB request block (i.e. a submitted transfer)
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UrbState {
    /// Submitted, but not complete yet
    Idle,
    /// The transfer has completed
    Done,
    /// The device NAKed, the controller will retry
    NotReady,
    /// Transaction error
    Error,
    /// Device sent a STALL
    Stall,
}

impl UrbState {
    /// Transfer is still in flight. Not an error, poll again later.
    pub fn is_pending(&self) -> bool {
        matches!(self, UrbState::Idle | UrbState::NotReady)
    }
}

/// Result of a (resumable) control request
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RequestStatus {
    /// Request completed
    Ok,
    /// Request is still in progress, call again
    Busy,
    /// Request failed
    Fail,
}
