//! quicd-ingest: datagram ingest pipeline on top of `quicd-wire`
//!
//! Takes received datagrams (bytes, source address, receive time), decodes
//! them through the shared pools and hands back [`ParsedPacket`]s. Also
//! carries configuration loading, logging setup, ingest counters and the
//! recorded-datagram format used by the `quicd-ingest` replay binary.

pub mod config;
pub mod ingest;
pub mod replay;
pub mod telemetry;

pub use config::IngestConfig;
pub use ingest::{IngestError, Ingestor, ParsedPacket};
pub use telemetry::{IngestEvent, IngestSnapshot, IngestStats};
