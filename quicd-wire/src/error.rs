//! Wire Error Types
//!
//! Every decode failure is terminal for the datagram being processed: the
//! decoder never retries, repairs, or caches partial state. Frame parsing is
//! the one place where already-decoded output travels with the error, see
//! [`FrameError`].

use crate::frame::Frame;
use thiserror::Error;

/// Result type for wire operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the decode and encode paths.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Buffer is shorter than the field being read requires.
    #[error("not enough bytes")]
    NotEnoughData,

    /// VarInt length class needs more bytes than remain in the buffer.
    #[error("varint length is larger than available bytes")]
    VarIntTooLarge,

    /// Structurally invalid header, or a header that cannot be encoded.
    #[error("malformed header: {0}")]
    MalformedHeader(&'static str),

    /// Frame type byte is not part of the supported grammar.
    #[error("unknown frame type 0x{0:02x}")]
    UnknownFrameType(u8),

    /// Frame body is shorter than its declared length.
    #[error("truncated frame (type 0x{frame_type:02x})")]
    TruncatedFrame { frame_type: u8 },

    /// Payload exceeds the configured maximum of an encode path.
    #[error("payload too large: {len} bytes exceeds limit of {max}")]
    PayloadTooLarge { len: usize, max: usize },

    /// Destination buffer cannot hold the encoded output.
    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    /// Value cannot be represented as a 62-bit varint.
    #[error("value {0} exceeds the varint range")]
    VarIntOutOfRange(u64),
}

impl Error {
    /// True for errors caused by running out of input bytes.
    pub fn is_truncation(&self) -> bool {
        matches!(
            self,
            Error::NotEnoughData | Error::VarIntTooLarge | Error::TruncatedFrame { .. }
        )
    }
}

/// Frame parsing failure together with the frames decoded before it.
///
/// The partial list is handed back for diagnostics; the parser does not
/// attempt to resume after the failing frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("frame parsing stopped after {} frame(s): {kind}", .frames.len())]
pub struct FrameError {
    /// Frames successfully parsed before the failure, in payload order.
    pub frames: Vec<Frame>,
    /// What went wrong.
    #[source]
    pub kind: Error,
}

impl FrameError {
    pub(crate) fn new(frames: Vec<Frame>, kind: Error) -> Self {
        Self { frames, kind }
    }

    /// Split into the partial frames and the error kind.
    pub fn into_parts(self) -> (Vec<Frame>, Error) {
        (self.frames, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncation_classification() {
        assert!(Error::NotEnoughData.is_truncation());
        assert!(Error::VarIntTooLarge.is_truncation());
        assert!(Error::TruncatedFrame { frame_type: 0x02 }.is_truncation());
        assert!(!Error::UnknownFrameType(0x07).is_truncation());
        assert!(!Error::MalformedHeader("x").is_truncation());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            Error::UnknownFrameType(0x1f).to_string(),
            "unknown frame type 0x1f"
        );
        assert_eq!(
            Error::BufferTooSmall {
                needed: 8,
                available: 3
            }
            .to_string(),
            "buffer too small: need 8 bytes, have 3"
        );
    }

    #[test]
    fn test_frame_error_keeps_partial_frames() {
        let err = FrameError::new(vec![Frame::Padding, Frame::Padding], Error::UnknownFrameType(9));
        assert_eq!(err.frames.len(), 2);
        assert!(err.to_string().contains("2 frame(s)"));

        let (frames, kind) = err.into_parts();
        assert_eq!(frames, vec![Frame::Padding, Frame::Padding]);
        assert_eq!(kind, Error::UnknownFrameType(9));
    }
}
