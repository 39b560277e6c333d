use anyhow::Context;
use clap::Parser;
use quicd_ingest::config::{self, CliArgs};
use quicd_ingest::replay::{self, ReplayRecord};
use quicd_ingest::{IngestError, IngestStats, Ingestor, ParsedPacket};
use quicd_wire::{Frame, PacketEncoder, PacketHeader, Pools};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::sync::Arc;
use tracing::{debug, info, warn};

fn main() -> anyhow::Result<()> {
    let cli = CliArgs::parse();

    if cli.print_default_config {
        println!("{}", config::loader::default_config_toml()?);
        return Ok(());
    }

    let config = config::load_config(&cli)?;

    if cli.validate {
        println!("✓ Configuration is valid");
        return Ok(());
    }

    quicd_ingest::telemetry::init_logging(&config.logging)
        .context("failed to initialize logging")?;

    info!(
        buffer_size = config.pool.buffer_size,
        max_retained_buffers = config.pool.max_retained_buffers,
        max_retained_objects = config.pool.max_retained_objects,
        "Configuration loaded successfully"
    );

    let pools = Arc::new(Pools::new(&config.pool.settings()));
    let stats = Arc::new(IngestStats::default());
    let ingestor = Ingestor::new(Arc::clone(&pools), Arc::clone(&stats));
    let encoder = cli.verify_roundtrip.then(|| config.encode.encoder());

    let reader: Box<dyn BufRead> = match &cli.input {
        Some(path) => Box::new(BufReader::new(File::open(path).with_context(|| {
            format!("failed to open input file: {}", path.display())
        })?)),
        None => Box::new(BufReader::new(io::stdin().lock())),
    };

    let mut malformed = 0u64;
    let mut mismatched = 0u64;
    for item in replay::records(reader) {
        let record = match item {
            Ok(record) => record,
            Err(replay::ReplayError::Io(e)) => {
                return Err(e).context("failed to read datagram input");
            }
            Err(e) => {
                warn!(error = %e, "skipping malformed record");
                malformed += 1;
                continue;
            }
        };

        if cli.headers_only {
            inspect_header(&ingestor, &record);
            continue;
        }

        match ingestor.receive(&record.datagram, record.source) {
            Ok(parsed) => {
                log_packet(&record, &parsed);
                if let Some(encoder) = &encoder {
                    if !verify(&ingestor, encoder, &record, &parsed) {
                        mismatched += 1;
                    }
                }
                ingestor.recycle(parsed);
            }
            Err(err) => {
                warn!(
                    line = record.line,
                    source = %record.source,
                    error = %err,
                    "datagram rejected"
                );
                if let IngestError::Frames { frames, .. } = &err {
                    for frame in frames {
                        debug!(line = record.line, "partial frame: {}", describe_frame(frame));
                    }
                }
                ingestor.recycle_error(err);
            }
        }
    }

    let snapshot = stats.snapshot();
    info!(
        datagrams = snapshot.datagrams,
        bytes = snapshot.bytes,
        packets = snapshot.packets,
        long_headers = snapshot.long_headers,
        short_headers = snapshot.short_headers,
        frames = snapshot.frames(),
        packet_errors = snapshot.packet_errors,
        frame_errors = snapshot.frame_errors,
        oversized = snapshot.oversized,
        malformed,
        mismatched,
        "Replay complete"
    );

    let buffers = pools.buffers.stats();
    let packets = pools.packets.stats();
    let headers = pools.headers.stats();
    debug!(?buffers, ?packets, ?headers, "Pool statistics");

    Ok(())
}

fn inspect_header(ingestor: &Ingestor, record: &ReplayRecord) {
    let result = ingestor.inspect_header(&record.datagram, |header, consumed| {
        info!(
            line = record.line,
            source = %record.source,
            consumed,
            "header: {}",
            describe_header(header)
        );
    });
    if let Err(err) = result {
        warn!(line = record.line, source = %record.source, error = %err, "header rejected");
    }
}

fn log_packet(record: &ReplayRecord, parsed: &ParsedPacket) {
    info!(
        line = record.line,
        source = %parsed.source,
        packet_number = parsed.packet.packet_number,
        payload_len = parsed.packet.payload.len(),
        frames = parsed.frames.len(),
        "packet: {}",
        describe_header(&parsed.packet.header)
    );
    for frame in &parsed.frames {
        debug!(line = record.line, "frame: {}", describe_frame(frame));
    }
}

fn verify(
    ingestor: &Ingestor,
    encoder: &PacketEncoder,
    record: &ReplayRecord,
    parsed: &ParsedPacket,
) -> bool {
    match ingestor.verify_roundtrip(encoder, parsed, &record.datagram) {
        Ok(true) => true,
        Ok(false) => {
            warn!(line = record.line, "re-encoded packet differs from input");
            false
        }
        Err(e) => {
            warn!(line = record.line, error = %e, "packet could not be re-encoded");
            false
        }
    }
}

fn describe_header(header: &PacketHeader) -> String {
    match header {
        PacketHeader::Long(h) => format!(
            "long version={:#010x} dcid={} scid={} payload_length={} pn_len={}",
            h.version,
            h.dcid,
            h.scid,
            h.payload_length.value(),
            h.packet_number_length
        ),
        PacketHeader::Short(h) => format!("short pn_len={}", h.packet_number_length),
    }
}

fn describe_frame(frame: &Frame) -> String {
    match frame {
        Frame::Padding => "PADDING".to_string(),
        Frame::Ack(ack) => format!("ACK largest={}", ack.largest_acknowledged),
        Frame::Stream(s) => format!(
            "STREAM id={} offset={} len={}",
            s.stream_id,
            s.offset,
            s.data.len()
        ),
    }
}
