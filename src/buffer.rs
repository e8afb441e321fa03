//! Reassembly buffers
//!
//! A single USB transfer may carry less than a whole HCI packet, or more than one.
//! Received bytes are appended to a [`PacketBuffer`] until a complete packet is present at its front.
//! Once the packet was dispatched, it is consumed, and any bytes that follow it are moved to the front.
//!
//! All transfer sizes are derived from [`PacketBuffer::transfer_size`], so more data than fits can never be requested.
//! Receiving more than requested is a bug in the [`HostBus`](crate::bus::HostBus) implementation and panics.
//!
//! A packet that declares more data than the buffer can hold is dropped as a whole: the bytes
//! buffered so far are discarded, and so are the rest of its bytes as they arrive.

use crate::packet::PacketType;

/// Fixed capacity byte buffer with a fill offset
///
/// The first `pre_buffer` bytes are reserved. They are never written by the transport,
/// and handed to the upper stack together with each packet, so it can prepend data in place.
pub struct PacketBuffer<const N: usize> {
    buf: [u8; N],
    start: usize,
    offset: usize,
    /// Bytes of a dropped packet that are still to come
    discard: usize,
}

impl<const N: usize> PacketBuffer<N> {
    pub const fn new() -> Self {
        Self::with_pre_buffer(0)
    }

    pub const fn with_pre_buffer(pre_buffer: usize) -> Self {
        assert!(pre_buffer < N, "pre-buffer does not leave room for any data");
        Self {
            buf: [0; N],
            start: pre_buffer,
            offset: 0,
            discard: 0,
        }
    }

    /// Number of bytes available for packet data
    pub fn capacity(&self) -> usize {
        N - self.start
    }

    /// Size of the reserved region in front of the packet data
    pub fn pre_buffer_len(&self) -> usize {
        self.start
    }

    /// Number of bytes currently buffered
    pub fn len(&self) -> usize {
        self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.offset == 0
    }

    pub fn remaining(&self) -> usize {
        self.capacity() - self.offset
    }

    /// Size of the next IN transfer: a single packet, but never more than there is room for
    pub fn transfer_size(&self, max_packet_size: u16) -> u16 {
        (max_packet_size as usize).min(self.remaining()) as u16
    }

    /// Buffered bytes
    pub fn data(&self) -> &[u8] {
        &self.buf[self.start..self.start + self.offset]
    }

    /// Append received bytes, skipping what is left of a dropped packet
    pub fn extend(&mut self, data: &[u8]) {
        let skip = self.discard.min(data.len());
        self.discard -= skip;
        let data = &data[skip..];
        assert!(
            data.len() <= self.remaining(),
            "BUG: reassembly buffer overrun ({} bytes received, {} bytes left)",
            data.len(),
            self.remaining(),
        );
        let at = self.start + self.offset;
        self.buf[at..at + data.len()].copy_from_slice(data);
        self.offset += data.len();
    }

    /// Length of the packet at the front of the buffer, if it has been received completely
    pub fn complete_packet(&self, packet_type: PacketType) -> Option<usize> {
        packet_type
            .packet_len(self.data())
            .filter(|len| *len <= self.offset)
    }

    /// Drop the packet at the front of the buffer if it declares more data than the buffer can hold.
    ///
    /// Returns the declared length of the dropped packet. The bytes of it that have not been received
    /// yet are skipped by [`extend`](Self::extend).
    pub fn drop_oversized(&mut self, packet_type: PacketType) -> Option<usize> {
        let len = packet_type
            .packet_len(self.data())
            .filter(|len| *len > self.capacity())?;
        self.discard = len - self.offset;
        self.offset = 0;
        Some(len)
    }

    /// Pre-buffer plus the first `len` bytes of data
    pub fn packet_mut(&mut self, len: usize) -> &mut [u8] {
        assert!(len <= self.offset);
        &mut self.buf[..self.start + len]
    }

    /// Drop the first `len` bytes, and move whatever follows them to the front
    pub fn consume(&mut self, len: usize) {
        assert!(len <= self.offset);
        let left_over = self.offset - len;
        if left_over > 0 {
            let from = self.start + len;
            self.buf.copy_within(from..from + left_over, self.start);
        }
        self.offset = left_over;
    }

    /// Forget all buffered bytes
    pub fn reset(&mut self) {
        self.offset = 0;
        self.discard = 0;
    }
}

impl<const N: usize> Default for PacketBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_size_is_limited_by_capacity() {
        let mut buffer: PacketBuffer<257> = PacketBuffer::new();
        assert_eq!(buffer.transfer_size(64), 64);
        buffer.extend(&[0; 250]);
        assert_eq!(buffer.transfer_size(64), 7);
        buffer.extend(&[0; 7]);
        assert_eq!(buffer.transfer_size(64), 0);
    }

    #[test]
    fn test_pre_buffer_is_not_capacity() {
        let buffer: PacketBuffer<32> = PacketBuffer::with_pre_buffer(8);
        assert_eq!(buffer.capacity(), 24);
        assert_eq!(buffer.pre_buffer_len(), 8);
        assert_eq!(buffer.transfer_size(64), 24);
    }

    #[test]
    #[should_panic(expected = "overrun")]
    fn test_overrun_panics() {
        let mut buffer: PacketBuffer<4> = PacketBuffer::new();
        buffer.extend(&[1, 2, 3]);
        buffer.extend(&[4, 5]);
    }

    #[test]
    fn test_complete_packet() {
        let mut buffer: PacketBuffer<257> = PacketBuffer::new();
        buffer.extend(&[0x04]);
        assert_eq!(buffer.complete_packet(PacketType::Event), None);
        buffer.extend(&[0x03, 0xAA, 0xBB]);
        assert_eq!(buffer.complete_packet(PacketType::Event), None);
        buffer.extend(&[0xCC, 0x0E]);
        assert_eq!(buffer.complete_packet(PacketType::Event), Some(5));
    }

    #[test]
    fn test_consume_moves_left_over_to_front() {
        let mut buffer: PacketBuffer<16> = PacketBuffer::with_pre_buffer(2);
        buffer.extend(&[0x01, 0x00, 0x02, 0x00, 0x11, 0x22, 0x02, 0x00]);
        buffer.consume(6);
        assert_eq!(buffer.data(), &[0x02, 0x00]);
        buffer.consume(2);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_packet_mut_includes_pre_buffer() {
        let mut buffer: PacketBuffer<16> = PacketBuffer::with_pre_buffer(3);
        buffer.extend(&[7, 8, 9]);
        let packet = buffer.packet_mut(2);
        assert_eq!(packet.len(), 5);
        assert_eq!(&packet[3..], &[7, 8]);
    }

    #[test]
    fn test_drop_oversized() {
        let mut buffer: PacketBuffer<8> = PacketBuffer::new();
        assert_eq!(buffer.drop_oversized(PacketType::AclData), None);
        buffer.extend(&[0x01, 0x00, 0x04, 0x00]);
        assert_eq!(buffer.drop_oversized(PacketType::AclData), None);
        assert_eq!(buffer.len(), 4);
        buffer.reset();

        // 10 bytes declared, 5 of them received
        buffer.extend(&[0x01, 0x00, 0x06, 0x00, 0xAA]);
        assert_eq!(buffer.drop_oversized(PacketType::AclData), Some(10));
        assert!(buffer.is_empty());

        buffer.extend(&[0xBB, 0xCC, 0xDD]);
        assert!(buffer.is_empty());
        // the tail ends mid-transfer, the next header follows it
        buffer.extend(&[0xEE, 0xFF, 0x02, 0x00]);
        assert_eq!(buffer.data(), &[0x02, 0x00]);
    }

    #[test]
    fn test_reset_stops_discarding() {
        let mut buffer: PacketBuffer<8> = PacketBuffer::new();
        buffer.extend(&[0x01, 0x00, 0x10, 0x00]);
        assert_eq!(buffer.drop_oversized(PacketType::AclData), Some(20));
        buffer.reset();
        buffer.extend(&[0x01, 0x00]);
        assert_eq!(buffer.data(), &[0x01, 0x00]);
    }
}
