//! HCI packet types and their framing
//!
//! The transport does not interpret packets. It only needs the length field of each header,
//! to find out where one packet ends and the next one begins.

/// HCI packet indicator, as used by the upper stack to tell packets apart
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PacketType {
    Command = 0x01,
    AclData = 0x02,
    Event = 0x04,
}

impl PacketType {
    /// Total length (header + payload) of the packet at the start of `data`.
    ///
    /// Returns `None` while the header is incomplete, and always for commands, which are never received.
    pub fn packet_len(&self, data: &[u8]) -> Option<usize> {
        match self {
            PacketType::AclData => parse::acl_header(data).ok().map(|(_, (_handle, length))| 4 + length as usize),
            PacketType::Event => parse::event_header(data).ok().map(|(_, (_code, length))| 2 + length as usize),
            PacketType::Command => None,
        }
    }
}

pub mod parse {
    use nom::IResult;
    use nom::sequence::tuple;
    use nom::number::streaming::{u8, le_u16};

    /// Event code and parameter length
    pub fn event_header(input: &[u8]) -> IResult<&[u8], (u8, u8)> {
        tuple((u8, u8))(input)
    }

    /// Handle (including packet boundary and broadcast flags) and data length
    pub fn acl_header(input: &[u8]) -> IResult<&[u8], (u16, u16)> {
        tuple((le_u16, le_u16))(input)
    }
}
