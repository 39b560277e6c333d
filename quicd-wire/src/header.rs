//! # Packet Header Parsing and Types
//!
//! Long headers carry version and both connection IDs; short headers carry
//! only the first byte. Connection IDs are copied out of the datagram so a
//! decoded header stays valid after the receive buffer goes back to its pool.
//!
//! ## Long Header Layout
//!
//! ```text
//! +-+-+-+-+-+-+-+-+
//! |1|  ...    |PN |   PN = packet number length - 1
//! +-+-+-+-+-+-+-+-+
//! | Version (32)  |
//! | DCID Len (8)  | DCID (0..255 bytes)
//! | SCID Len (8)  | SCID (0..255 bytes)
//! | Token Length (i) | Token (skipped)
//! | Payload Length (i)
//! +---------------+
//! ```
//!
//! Short headers stop after the first byte. Their destination connection ID
//! is not on the wire in this format and has to be resolved by whoever
//! routes the datagram to a connection.

use crate::error::{Error, Result};
use crate::varint::VarInt;
use crate::writer::Writer;
use bytes::Bytes;
use core::fmt;

// ============================================================================
// First Byte Layout
// ============================================================================

/// Header Form Bit (most significant bit)
/// 1 = Long Header, 0 = Short Header
pub const HEADER_FORM_BIT: u8 = 0x80;

/// Fixed Bit, set on every header this crate encodes. Ignored on decode.
pub const FIXED_BIT: u8 = 0x40;

/// Packet Number Length Mask (bottom 2 bits)
/// Encodes (packet_number_length - 1)
pub const PACKET_NUMBER_LENGTH_MASK: u8 = 0x03;

/// Maximum connection ID length expressible by the 1-byte length prefix.
pub const MAX_CID_LENGTH: usize = u8::MAX as usize;

// ============================================================================
// Connection ID
// ============================================================================

/// Connection ID - opaque, variable-length, owned.
///
/// Zero-length connection IDs are represented as an empty value.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId {
    bytes: Bytes,
}

impl ConnectionId {
    /// Create from a borrowed slice (copies data).
    ///
    /// Returns None if the slice is longer than [`MAX_CID_LENGTH`].
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() > MAX_CID_LENGTH {
            return None;
        }
        Some(Self {
            bytes: Bytes::copy_from_slice(slice),
        })
    }

    /// Create an empty (zero-length) connection ID
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionId({:02x?})", &self.bytes[..])
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.bytes[..] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

// ============================================================================
// Header Structures
// ============================================================================

/// Header Form (Long vs Short)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderForm {
    Long,
    Short,
}

/// Long Header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongHeader {
    pub version: u32,

    pub dcid: ConnectionId,

    pub scid: ConnectionId,

    /// Token length as read from the wire. The token bytes themselves are
    /// skipped and not retained.
    pub token_length: VarInt,

    pub payload_length: VarInt,

    /// Packet number length (1-4 bytes)
    pub packet_number_length: u8,

    /// Bytes consumed up to the start of the packet number field
    pub header_len: usize,
}

impl LongHeader {
    /// Build a tokenless long header, computing `header_len` from the
    /// canonical encoding of each field.
    ///
    /// Fails with [`Error::MalformedHeader`] for a packet number length
    /// outside 1..=4 and [`Error::VarIntOutOfRange`] for an unencodable
    /// `payload_length`.
    pub fn new(
        version: u32,
        dcid: ConnectionId,
        scid: ConnectionId,
        payload_length: u64,
        packet_number_length: u8,
    ) -> Result<Self> {
        if !(1..=4).contains(&packet_number_length) {
            return Err(Error::MalformedHeader("packet number length must be 1..=4"));
        }
        let mut buf = [0u8; 8];
        let n = crate::varint::encode(payload_length, &mut buf)?;
        let payload_length = VarInt::decode(&buf[..n])?;
        let token_length = VarInt::decode(&[0x00])?;
        let header_len =
            1 + 4 + 1 + dcid.len() + 1 + scid.len() + 1 + payload_length.encoded_len();

        Ok(Self {
            version,
            dcid,
            scid,
            token_length,
            payload_length,
            packet_number_length,
            header_len,
        })
    }
}

/// Short Header
///
/// Only the packet number length is carried; `header_len` is always 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShortHeader {
    /// Packet number length (1-4 bytes)
    pub packet_number_length: u8,
}

/// Decoded Packet Header
///
/// The default value is a short header with a zero packet number length.
/// It is the reset state of pooled headers and never comes out of decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketHeader {
    Long(LongHeader),
    Short(ShortHeader),
}

impl Default for PacketHeader {
    fn default() -> Self {
        PacketHeader::Short(ShortHeader::default())
    }
}

impl PacketHeader {
    pub fn form(&self) -> HeaderForm {
        match self {
            PacketHeader::Long(_) => HeaderForm::Long,
            PacketHeader::Short(_) => HeaderForm::Short,
        }
    }

    pub fn is_long_header(&self) -> bool {
        matches!(self, PacketHeader::Long(_))
    }

    pub fn packet_number_length(&self) -> usize {
        match self {
            PacketHeader::Long(h) => h.packet_number_length as usize,
            PacketHeader::Short(h) => h.packet_number_length as usize,
        }
    }

    /// Bytes consumed up to the start of the packet number field.
    pub fn header_len(&self) -> usize {
        match self {
            PacketHeader::Long(h) => h.header_len,
            PacketHeader::Short(_) => 1,
        }
    }

    /// Get the version (only available in Long Header)
    pub fn version(&self) -> Option<u32> {
        match self {
            PacketHeader::Long(h) => Some(h.version),
            PacketHeader::Short(_) => None,
        }
    }

    /// Get destination connection ID (only available in Long Header)
    pub fn dcid(&self) -> Option<&ConnectionId> {
        match self {
            PacketHeader::Long(h) => Some(&h.dcid),
            PacketHeader::Short(_) => None,
        }
    }

    /// Get source connection ID (only available in Long Header)
    pub fn scid(&self) -> Option<&ConnectionId> {
        match self {
            PacketHeader::Long(h) => Some(&h.scid),
            PacketHeader::Short(_) => None,
        }
    }

    pub fn payload_length(&self) -> Option<u64> {
        match self {
            PacketHeader::Long(h) => Some(h.payload_length.value()),
            PacketHeader::Short(_) => None,
        }
    }

    pub fn is_payload_length_present(&self) -> bool {
        self.is_long_header()
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Parse only the first byte to determine header form.
///
/// Fast path for routing decisions without full parsing.
pub fn peek_header_form(packet: &[u8]) -> Result<HeaderForm> {
    let &first = packet.first().ok_or(Error::NotEnoughData)?;
    if first & HEADER_FORM_BIT != 0 {
        Ok(HeaderForm::Long)
    } else {
        Ok(HeaderForm::Short)
    }
}

/// Decode a packet header from the front of `packet`.
///
/// Returns the header and the number of bytes consumed up to (but not
/// including) the packet number.
pub fn decode_header(packet: &[u8]) -> Result<(PacketHeader, usize)> {
    let mut header = PacketHeader::default();
    let consumed = decode_header_into(packet, &mut header)?;
    Ok((header, consumed))
}

/// Decode into an existing (typically pooled) header.
///
/// `header` is only overwritten on success.
pub fn decode_header_into(packet: &[u8], header: &mut PacketHeader) -> Result<usize> {
    let &first = packet.first().ok_or(Error::NotEnoughData)?;
    let packet_number_length = (first & PACKET_NUMBER_LENGTH_MASK) + 1;

    if first & HEADER_FORM_BIT == 0 {
        *header = PacketHeader::Short(ShortHeader {
            packet_number_length,
        });
        return Ok(1);
    }

    let long = parse_long_header(packet, packet_number_length)?;
    let consumed = long.header_len;
    *header = PacketHeader::Long(long);
    Ok(consumed)
}

fn parse_long_header(packet: &[u8], packet_number_length: u8) -> Result<LongHeader> {
    let mut offset = 1;

    // Version (4 bytes)
    let version_bytes = packet
        .get(offset..offset + 4)
        .ok_or(Error::NotEnoughData)?;
    let version = u32::from_be_bytes([
        version_bytes[0],
        version_bytes[1],
        version_bytes[2],
        version_bytes[3],
    ]);
    offset += 4;

    let dcid = read_connection_id(packet, &mut offset)?;
    let scid = read_connection_id(packet, &mut offset)?;

    // Token length + token (skipped)
    let token_length = VarInt::decode(&packet[offset..])?;
    offset += token_length.encoded_len();
    if token_length.value() > (packet.len() - offset) as u64 {
        return Err(Error::NotEnoughData);
    }
    offset += token_length.value() as usize;

    let payload_length = VarInt::decode(&packet[offset..])?;
    offset += payload_length.encoded_len();

    Ok(LongHeader {
        version,
        dcid,
        scid,
        token_length,
        payload_length,
        packet_number_length,
        header_len: offset,
    })
}

fn read_connection_id(packet: &[u8], offset: &mut usize) -> Result<ConnectionId> {
    let &len = packet.get(*offset).ok_or(Error::NotEnoughData)?;
    *offset += 1;

    let bytes = packet
        .get(*offset..*offset + len as usize)
        .ok_or(Error::NotEnoughData)?;
    *offset += len as usize;

    Ok(ConnectionId {
        bytes: Bytes::copy_from_slice(bytes),
    })
}

// ============================================================================
// Encoding
// ============================================================================

/// Encode a header in front of the packet number field.
///
/// The first byte is written canonically: form bit, fixed bit and the packet
/// number length, all other bits zero. Returns the bytes written, which
/// equals `header.header_len()` for any header that came out of decoding.
///
/// # Errors
///
/// - [`Error::MalformedHeader`] for a packet number length outside 1..=4, or
///   a long header with a non-zero token length (token bytes are not retained)
/// - [`Error::BufferTooSmall`] if `buf` is too short
pub fn encode_header(header: &PacketHeader, buf: &mut [u8]) -> Result<usize> {
    let pn_len = header.packet_number_length();
    if !(1..=4).contains(&pn_len) {
        return Err(Error::MalformedHeader("packet number length must be 1..=4"));
    }
    let pn_bits = (pn_len - 1) as u8;

    let mut w = Writer::new(buf);
    match header {
        PacketHeader::Short(_) => {
            w.put_u8(FIXED_BIT | pn_bits)?;
        }
        PacketHeader::Long(h) => {
            if h.token_length.value() != 0 {
                return Err(Error::MalformedHeader("token bytes are not retained"));
            }
            w.put_u8(HEADER_FORM_BIT | FIXED_BIT | pn_bits)?;
            w.put_slice(&h.version.to_be_bytes())?;
            w.put_u8(h.dcid.len() as u8)?;
            w.put_slice(h.dcid.as_bytes())?;
            w.put_u8(h.scid.len() as u8)?;
            w.put_slice(h.scid.as_bytes())?;
            w.put_varint_exact(&h.token_length)?;
            w.put_varint_exact(&h.payload_length)?;
        }
    }
    Ok(w.position())
}

// ============================================================================
// Unit Tests
// ============================================================================
