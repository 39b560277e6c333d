//! quicd-wire: datagram decoder for the quicd wire format
//!
//! Decodes a single UDP datagram into a packet header, packet number, owned
//! payload and ordered list of frames, and provides reuse pools for the
//! buffers and objects on that path.
//!
//! # Architecture
//!
//! - **Stateless decoding**: every call decodes one datagram in isolation
//! - **Owned output**: connection IDs and payloads are copied out with
//!   `bytes::Bytes`, so receive buffers can be recycled right away
//! - **Shared pools**: `Pools` is `Send + Sync`; objects move in and out as
//!   `Pooled` handles
//!
//! # Module Organization
//!
//! - `varint`: variable-length integer codec
//! - `header`: long/short header decoding and encoding
//! - `packet`: packet number extraction and payload copy
//! - `frame`: PADDING/ACK/STREAM frame parsing and encoding
//! - `pool`: buffer and object pools
//! - `error`: wire error types
//!
//! Packet protection, connection ID routing and loss recovery are left to
//! the caller.

pub mod error;
pub mod frame;
pub mod header;
pub mod packet;
pub mod pool;
pub mod varint;

mod writer;

// Re-export key types
pub use error::{Error, FrameError, Result};
pub use frame::{
    encode_frames, parse_frames, parse_frames_bytes, AckFrame, Frame, FrameIter, FrameType,
    StreamFrame,
};
pub use header::{
    decode_header, decode_header_into, encode_header, peek_header_form, ConnectionId,
    HeaderForm, LongHeader, PacketHeader, ShortHeader,
};
pub use packet::{decode_packet, decode_packet_into, encode_packet, Packet, PacketEncoder};
pub use pool::{
    BufferPool, ObjectPool, PoolSettings, PoolStats, Pooled, Pools, RecvBuffer, Reuse,
};
pub use varint::VarInt;
