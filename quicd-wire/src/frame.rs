//! # Frame Parsing
//!
//! Supported grammar:
//!
//! | Type byte     | Frame   | Body                                      |
//! |---------------|---------|-------------------------------------------|
//! | `0x00`        | PADDING | none                                      |
//! | `0x02`        | ACK     | Largest Acknowledged (i)                  |
//! | `0x10`-`0x17` | STREAM  | Stream ID (i), Offset (i), Length (i), Data |
//!
//! ACK ranges, ACK delay and the STREAM flag bits are not part of this
//! grammar. Every STREAM frame carries explicit offset and length fields,
//! and `fin` is always reported as false.

use crate::error::{Error, FrameError, Result};
use crate::varint::VarInt;
use crate::writer::Writer;
use bytes::Bytes;

pub const FRAME_TYPE_PADDING: u8 = 0x00;
pub const FRAME_TYPE_ACK: u8 = 0x02;
pub const FRAME_TYPE_STREAM: u8 = 0x10;

/// Mask selecting the STREAM type family (0x10-0x17).
pub const FRAME_TYPE_STREAM_MASK: u8 = 0xf8;

/// Classification of a frame type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Padding,
    Ack,
    Stream,
    Unsupported(u8),
}

impl FrameType {
    pub fn from_byte(b: u8) -> Self {
        match b {
            FRAME_TYPE_PADDING => FrameType::Padding,
            FRAME_TYPE_ACK => FrameType::Ack,
            _ if b & FRAME_TYPE_STREAM_MASK == FRAME_TYPE_STREAM => FrameType::Stream,
            _ => FrameType::Unsupported(b),
        }
    }
}

/// ACK frame. Only the largest acknowledged packet number is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckFrame {
    pub largest_acknowledged: u64,
}

/// STREAM frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFrame {
    pub stream_id: u64,
    pub offset: u64,
    pub data: Bytes,
    pub fin: bool,
}

/// Decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Padding,
    Ack(AckFrame),
    Stream(StreamFrame),
}

impl Frame {
    pub fn frame_type(&self) -> FrameType {
        match self {
            Frame::Padding => FrameType::Padding,
            Frame::Ack(_) => FrameType::Ack,
            Frame::Stream(_) => FrameType::Stream,
        }
    }
}

/// Lazy frame iterator over an owned payload.
///
/// Yields frames in payload order and stops after the first error. STREAM
/// data is sliced out of the payload without copying.
pub struct FrameIter {
    payload: Bytes,
    offset: usize,
    failed: bool,
}

impl FrameIter {
    pub fn new(payload: Bytes) -> Self {
        Self {
            payload,
            offset: 0,
            failed: false,
        }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.offset
    }

    fn parse_next(&mut self) -> Result<Frame> {
        let frame_type = self.payload[self.offset];
        match FrameType::from_byte(frame_type) {
            FrameType::Padding => {
                self.offset += 1;
                Ok(Frame::Padding)
            }
            FrameType::Ack => {
                let mut pos = self.offset + 1;
                let largest = read_varint(&self.payload, &mut pos, frame_type)?;
                self.offset = pos;
                Ok(Frame::Ack(AckFrame {
                    largest_acknowledged: largest,
                }))
            }
            FrameType::Stream => {
                let mut pos = self.offset + 1;
                let stream_id = read_varint(&self.payload, &mut pos, frame_type)?;
                let offset = read_varint(&self.payload, &mut pos, frame_type)?;
                let length = read_varint(&self.payload, &mut pos, frame_type)?;

                if length > (self.payload.len() - pos) as u64 {
                    return Err(Error::TruncatedFrame { frame_type });
                }
                let end = pos + length as usize;
                let data = self.payload.slice(pos..end);
                self.offset = end;

                Ok(Frame::Stream(StreamFrame {
                    stream_id,
                    offset,
                    data,
                    fin: false,
                }))
            }
            FrameType::Unsupported(b) => Err(Error::UnknownFrameType(b)),
        }
    }
}

impl Iterator for FrameIter {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.payload.len() {
            return None;
        }

        let result = self.parse_next();
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}

/// Read a varint inside a frame body. Any shortfall is a truncated frame.
fn read_varint(buf: &[u8], pos: &mut usize, frame_type: u8) -> Result<u64> {
    let v = VarInt::decode(&buf[*pos..]).map_err(|_| Error::TruncatedFrame { frame_type })?;
    *pos += v.encoded_len();
    Ok(v.value())
}

/// Parse every frame in `payload`.
///
/// The payload is copied once; STREAM data shares that copy. On error the
/// frames decoded before the failure are returned inside [`FrameError`].
pub fn parse_frames(payload: &[u8]) -> std::result::Result<Vec<Frame>, FrameError> {
    parse_frames_bytes(Bytes::copy_from_slice(payload))
}

/// Parse every frame of an already owned payload, such as
/// [`Packet::payload`](crate::Packet::payload), without copying it.
pub fn parse_frames_bytes(payload: Bytes) -> std::result::Result<Vec<Frame>, FrameError> {
    let mut frames = Vec::new();
    for item in FrameIter::new(payload) {
        match item {
            Ok(frame) => frames.push(frame),
            Err(kind) => {
                tracing::trace!(error = %kind, parsed = frames.len(), "frame parsing stopped");
                return Err(FrameError::new(frames, kind));
            }
        }
    }
    Ok(frames)
}

/// Encode frames in canonical form, returning the bytes written.
///
/// STREAM frames always use type byte `0x10` with explicit offset and
/// length; `fin` is not encoded.
pub fn encode_frames(frames: &[Frame], buf: &mut [u8]) -> Result<usize> {
    let mut w = Writer::new(buf);
    for frame in frames {
        match frame {
            Frame::Padding => w.put_u8(FRAME_TYPE_PADDING)?,
            Frame::Ack(ack) => {
                w.put_u8(FRAME_TYPE_ACK)?;
                w.put_varint(ack.largest_acknowledged)?;
            }
            Frame::Stream(stream) => {
                w.put_u8(FRAME_TYPE_STREAM)?;
                w.put_varint(stream.stream_id)?;
                w.put_varint(stream.offset)?;
                w.put_varint(stream.data.len() as u64)?;
                w.put_slice(&stream.data)?;
            }
        }
    }
    Ok(w.position())
}
