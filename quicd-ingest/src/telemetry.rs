//! # Telemetry
//!
//! Structured logging setup plus lock-free ingest counters.
//!
//! Hot paths record [`IngestEvent`]s into an [`IngestStats`] shared through
//! `Arc`; the counters are plain atomics, so recording never blocks.
//!
//! ## Usage
//!
//! ```rust
//! use quicd_ingest::telemetry::{IngestEvent, IngestStats};
//!
//! let stats = IngestStats::default();
//! stats.record(IngestEvent::DatagramReceived { bytes: 1200 });
//! assert_eq!(stats.snapshot().datagrams, 1);
//! ```

use anyhow::{Context, Result};
use quicd_wire::FrameType;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Initialize structured logging.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.level.to_string()))
        .context("Failed to build log filter")?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_ansi(config.enable_colors)
        .with_line_number(config.include_file_line)
        .with_file(config.include_file_line);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::debug!(level = %config.level, "Logging initialized");
    Ok(())
}

/// Ingest events for fire-and-forget recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestEvent {
    /// Datagram handed to the pipeline
    DatagramReceived { bytes: usize },

    /// Datagram larger than the receive buffers; not decoded
    DatagramOversized { bytes: usize },

    /// Packet header, number and payload decoded
    PacketDecoded { long_header: bool },

    /// One frame decoded
    FrameDecoded(FrameType),

    /// Header or packet decoding failed
    PacketError,

    /// Frame parsing failed after the packet decoded
    FrameError,
}

/// Lock-free ingest counters.
#[derive(Debug, Default)]
pub struct IngestStats {
    datagrams: AtomicU64,
    bytes: AtomicU64,
    oversized: AtomicU64,
    packets: AtomicU64,
    long_headers: AtomicU64,
    short_headers: AtomicU64,
    padding_frames: AtomicU64,
    ack_frames: AtomicU64,
    stream_frames: AtomicU64,
    packet_errors: AtomicU64,
    frame_errors: AtomicU64,
}

impl IngestStats {
    pub fn record(&self, event: IngestEvent) {
        match event {
            IngestEvent::DatagramReceived { bytes } => {
                self.datagrams.fetch_add(1, Ordering::Relaxed);
                self.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
            }
            IngestEvent::DatagramOversized { .. } => {
                self.oversized.fetch_add(1, Ordering::Relaxed);
            }
            IngestEvent::PacketDecoded { long_header } => {
                self.packets.fetch_add(1, Ordering::Relaxed);
                if long_header {
                    self.long_headers.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.short_headers.fetch_add(1, Ordering::Relaxed);
                }
            }
            IngestEvent::FrameDecoded(kind) => {
                let counter = match kind {
                    FrameType::Padding => &self.padding_frames,
                    FrameType::Ack => &self.ack_frames,
                    FrameType::Stream => &self.stream_frames,
                    // Never produced by a successful parse.
                    FrameType::Unsupported(_) => return,
                };
                counter.fetch_add(1, Ordering::Relaxed);
            }
            IngestEvent::PacketError => {
                self.packet_errors.fetch_add(1, Ordering::Relaxed);
            }
            IngestEvent::FrameError => {
                self.frame_errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn snapshot(&self) -> IngestSnapshot {
        IngestSnapshot {
            datagrams: self.datagrams.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            oversized: self.oversized.load(Ordering::Relaxed),
            packets: self.packets.load(Ordering::Relaxed),
            long_headers: self.long_headers.load(Ordering::Relaxed),
            short_headers: self.short_headers.load(Ordering::Relaxed),
            padding_frames: self.padding_frames.load(Ordering::Relaxed),
            ack_frames: self.ack_frames.load(Ordering::Relaxed),
            stream_frames: self.stream_frames.load(Ordering::Relaxed),
            packet_errors: self.packet_errors.load(Ordering::Relaxed),
            frame_errors: self.frame_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`IngestStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSnapshot {
    pub datagrams: u64,
    pub bytes: u64,
    pub oversized: u64,
    pub packets: u64,
    pub long_headers: u64,
    pub short_headers: u64,
    pub padding_frames: u64,
    pub ack_frames: u64,
    pub stream_frames: u64,
    pub packet_errors: u64,
    pub frame_errors: u64,
}

impl IngestSnapshot {
    pub fn frames(&self) -> u64 {
        self.padding_frames + self.ack_frames + self.stream_frames
    }
}
