//! Packet dispatch to the upper stack
//!
//! There are two callback slots:
//! - *packet sent*: the transport is ready for the next outgoing packet
//!   (see [`HciTransport::set_packet_sent_callback`](crate::HciTransport::set_packet_sent_callback)).
//! - *packet received*: a complete HCI event or ACL packet has arrived
//!   (see [`HciTransport::set_packet_received_callback`](crate::HciTransport::set_packet_received_callback)).
//!
//! Setting a callback replaces the previous one. While a slot is empty, the notification is dropped.

use crate::packet::PacketType;

/// Callback signalling that the transport can accept the next outgoing packet
pub type PacketSentFn<'a> = &'a dyn Fn();

/// Callback receiving a complete incoming packet
pub type PacketReceivedFn<'a> = &'a dyn Fn(ReceivedPacket<'_>);

/// A complete packet, borrowed from the transport's reassembly buffer
///
/// The packet is only valid during the callback. Once the callback returns,
/// the buffer is compacted and the data is overwritten by the next transfer.
pub struct ReceivedPacket<'p> {
    packet_type: PacketType,
    buffer: &'p mut [u8],
    pre_buffer: usize,
}

impl<'p> ReceivedPacket<'p> {
    /// `buffer` holds `pre_buffer` reserved bytes, followed by the packet
    pub(crate) fn new(packet_type: PacketType, buffer: &'p mut [u8], pre_buffer: usize) -> Self {
        Self { packet_type, buffer, pre_buffer }
    }

    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    /// The packet, starting with its HCI header
    pub fn data(&self) -> &[u8] {
        &self.buffer[self.pre_buffer..]
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.buffer[self.pre_buffer..]
    }

    pub fn len(&self) -> usize {
        self.buffer.len() - self.pre_buffer
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of reserved bytes directly in front of the packet
    ///
    /// Always zero for events.
    pub fn pre_buffer_len(&self) -> usize {
        self.pre_buffer
    }

    /// Write `header` directly in front of the packet, without moving the packet.
    ///
    /// Returns the header followed by the packet, or `None` if the header is larger than the pre-buffer.
    pub fn prepend(self, header: &[u8]) -> Option<&'p mut [u8]> {
        let start = self.pre_buffer.checked_sub(header.len())?;
        let buffer = self.buffer;
        buffer[start..self.pre_buffer].copy_from_slice(header);
        Some(&mut buffer[start..])
    }
}

/// The two callback slots
#[derive(Default)]
pub(crate) struct Dispatch<'a> {
    packet_sent: Option<PacketSentFn<'a>>,
    packet_received: Option<PacketReceivedFn<'a>>,
}

impl<'a> Dispatch<'a> {
    pub(crate) fn set_packet_sent(&mut self, callback: PacketSentFn<'a>) {
        self.packet_sent = Some(callback);
    }

    pub(crate) fn set_packet_received(&mut self, callback: PacketReceivedFn<'a>) {
        self.packet_received = Some(callback);
    }

    pub(crate) fn packet_sent(&self) {
        match self.packet_sent {
            Some(callback) => callback(),
            None => {
                trace!("packet sent, no callback registered");
            }
        }
    }

    pub(crate) fn packet_received(&self, packet: ReceivedPacket<'_>) {
        match self.packet_received {
            Some(callback) => callback(packet),
            None => {
                trace!("dropping {} packet of {} bytes, no callback registered", packet.packet_type(), packet.len());
            }
        }
    }
}
