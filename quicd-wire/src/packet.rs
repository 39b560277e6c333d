//! # Packet Decoding and Encoding
//!
//! A packet is a header, a big-endian packet number of 1-4 bytes, and a
//! payload running to the end of the datagram. The payload is copied out of
//! the datagram so the receive buffer can be recycled immediately.
//!
//! The packet number is not reconstructed against any expected value; it is
//! returned exactly as truncated on the wire.

use crate::error::{Error, Result};
use crate::header::{self, PacketHeader};
use crate::writer::Writer;
use bytes::Bytes;

/// Default upper bound on the payload accepted by [`PacketEncoder`].
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 1024;

/// A decoded packet.
///
/// The default value (short header with zero packet number length, packet
/// number 0, empty payload) is the reset state of pooled packets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Packet {
    pub header: PacketHeader,

    /// Truncated packet number, as read from the wire
    pub packet_number: u64,

    /// Owned copy of every byte after the packet number
    pub payload: Bytes,
}

impl Packet {
    /// Total number of bytes this packet occupied in its datagram.
    pub fn wire_len(&self) -> usize {
        self.header.header_len() + self.header.packet_number_length() + self.payload.len()
    }
}

/// Decode a complete packet from a datagram.
pub fn decode_packet(data: &[u8]) -> Result<Packet> {
    let mut packet = Packet::default();
    decode_packet_into(data, &mut packet)?;
    Ok(packet)
}

/// Decode into an existing (typically pooled) packet.
///
/// On error `packet` may hold a freshly decoded header but its packet number
/// and payload are left as they were.
pub fn decode_packet_into(data: &[u8], packet: &mut Packet) -> Result<()> {
    let header_len = header::decode_header_into(data, &mut packet.header)?;
    let pn_len = packet.header.packet_number_length();

    let pn_bytes = data
        .get(header_len..header_len + pn_len)
        .ok_or(Error::NotEnoughData)?;
    packet.packet_number = pn_bytes
        .iter()
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b));

    packet.payload = Bytes::copy_from_slice(&data[header_len + pn_len..]);
    Ok(())
}

/// Packet encoder with a bounded payload size.
#[derive(Debug, Clone, Copy)]
pub struct PacketEncoder {
    max_payload: usize,
}

impl Default for PacketEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD_SIZE)
    }
}

impl PacketEncoder {
    pub fn new(max_payload: usize) -> Self {
        Self { max_payload }
    }

    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// Encode `packet` into `buf`, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// - [`Error::PayloadTooLarge`] if the payload exceeds `max_payload`
    /// - [`Error::MalformedHeader`] if the header cannot be encoded or the
    ///   packet number does not fit in `packet_number_length` bytes
    /// - [`Error::BufferTooSmall`] if `buf` is too short
    pub fn encode(&self, packet: &Packet, buf: &mut [u8]) -> Result<usize> {
        if packet.payload.len() > self.max_payload {
            return Err(Error::PayloadTooLarge {
                len: packet.payload.len(),
                max: self.max_payload,
            });
        }

        let header_len = header::encode_header(&packet.header, buf)?;
        let pn_len = packet.header.packet_number_length();
        if packet.packet_number >> (pn_len * 8) != 0 {
            return Err(Error::MalformedHeader(
                "packet number does not fit its encoded length",
            ));
        }

        let pn_bytes = packet.packet_number.to_be_bytes();
        let mut w = Writer::new(buf);
        w.advance(header_len)?;
        w.put_slice(&pn_bytes[8 - pn_len..])?;
        w.put_slice(&packet.payload)?;
        Ok(w.position())
    }
}

/// Encode with the default payload limit.
pub fn encode_packet(packet: &Packet, buf: &mut [u8]) -> Result<usize> {
    PacketEncoder::default().encode(packet, buf)
}
