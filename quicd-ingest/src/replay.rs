//! Recorded datagram input.
//!
//! One datagram per line:
//!
//! ```text
//! # comment
//! 192.0.2.1:4433 c1 12345678 04 01020304 03 050607 00 07 aabb 6869
//! 4500aa00
//! ```
//!
//! The source address is optional and defaults to [`UNSPECIFIED_SOURCE`].
//! Hex digits may be split by whitespace anywhere on the line.

use std::io::BufRead;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use thiserror::Error;

/// Source address used for records that do not name one.
pub const UNSPECIFIED_SOURCE: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));

/// One recorded datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayRecord {
    /// 1-based line number in the input
    pub line: usize,
    pub source: SocketAddr,
    pub datagram: Vec<u8>,
}

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("line {line}: invalid hex: {source}")]
    InvalidHex {
        line: usize,
        #[source]
        source: hex::FromHexError,
    },

    #[error("line {line}: no datagram bytes")]
    Empty { line: usize },

    #[error("failed to read input")]
    Io(#[from] std::io::Error),
}

/// Parse a single input line. Blank and `#` lines yield `Ok(None)`.
pub fn parse_line(line_no: usize, line: &str) -> Result<Option<ReplayRecord>, ReplayError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut tokens = line.split_whitespace().peekable();
    let source = match tokens.peek().and_then(|t| t.parse::<SocketAddr>().ok()) {
        Some(addr) => {
            tokens.next();
            addr
        }
        None => UNSPECIFIED_SOURCE,
    };

    let digits: String = tokens.collect();
    if digits.is_empty() {
        return Err(ReplayError::Empty { line: line_no });
    }

    let datagram = hex::decode(&digits).map_err(|source| ReplayError::InvalidHex {
        line: line_no,
        source,
    })?;

    Ok(Some(ReplayRecord {
        line: line_no,
        source,
        datagram,
    }))
}

/// Iterate over the records of a reader.
///
/// Malformed lines are yielded as errors; iteration continues after them.
pub fn records<R: BufRead>(reader: R) -> impl Iterator<Item = Result<ReplayRecord, ReplayError>> {
    reader
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| match line {
            Ok(text) => parse_line(idx + 1, &text).transpose(),
            Err(e) => Some(Err(ReplayError::Io(e))),
        })
}
