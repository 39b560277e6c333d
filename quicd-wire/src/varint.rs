//! # Variable-Length Integer Encoding
//!
//! The first two bits of the first byte select the encoded length:
//! 00=1 byte, 01=2 bytes, 10=4 bytes, 11=8 bytes. The remaining six bits of
//! the first byte and every following byte, read big-endian, form the value.
//! Maximum value: 2^62 - 1

use crate::error::{Error, Result};

/// Maximum value for a VarInt (2^62 - 1)
pub const VARINT_MAX: u64 = (1u64 << 62) - 1;

/// A decoded variable-length integer.
///
/// Keeps the length class it was read with so that headers can be
/// re-emitted byte-for-byte, including non-minimal encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VarInt {
    value: u64,
    len: u8,
}

impl VarInt {
    /// Decode a VarInt from the front of `buf`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotEnoughData`] if `buf` is empty
    /// - [`Error::VarIntTooLarge`] if the length class needs more bytes than remain
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let &first = buf.first().ok_or(Error::NotEnoughData)?;
        let len = 1usize << (first >> 6);

        if buf.len() < len {
            return Err(Error::VarIntTooLarge);
        }

        let mut value = u64::from(first & 0x3f);
        for &b in &buf[1..len] {
            value = (value << 8) | u64::from(b);
        }

        Ok(Self {
            value,
            len: len as u8,
        })
    }

    /// The decoded value.
    #[inline]
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Number of bytes the value occupied on the wire (1, 2, 4 or 8).
    #[inline]
    pub fn encoded_len(&self) -> usize {
        self.len as usize
    }

    /// Write this VarInt using its original length class.
    ///
    /// Returns the number of bytes written.
    pub fn write(&self, buf: &mut [u8]) -> Result<usize> {
        // Zero value (never decoded) falls back to the minimal class.
        let len = if self.len == 0 {
            size(self.value)
        } else {
            self.encoded_len()
        };
        write_with_len(self.value, len, buf)
    }
}

impl From<VarInt> for u64 {
    fn from(v: VarInt) -> u64 {
        v.value
    }
}

/// Encode `value` with the minimal length class, returning bytes written.
///
/// # Errors
///
/// - [`Error::VarIntOutOfRange`] if `value` exceeds [`VARINT_MAX`]
/// - [`Error::BufferTooSmall`] if `buf` cannot hold the encoding
pub fn encode(value: u64, buf: &mut [u8]) -> Result<usize> {
    if value > VARINT_MAX {
        return Err(Error::VarIntOutOfRange(value));
    }
    write_with_len(value, size(value), buf)
}

/// Calculate the minimal encoded size for a given value.
pub fn size(value: u64) -> usize {
    if value < 0x40 {
        1
    } else if value < 0x4000 {
        2
    } else if value < 0x4000_0000 {
        4
    } else {
        8
    }
}

fn write_with_len(value: u64, len: usize, buf: &mut [u8]) -> Result<usize> {
    let (tag, limit) = match len {
        1 => (0x00u8, 0x3f),
        2 => (0x40, 0x3fff),
        4 => (0x80, 0x3fff_ffff),
        8 => (0xc0, VARINT_MAX),
        _ => unreachable!("varint length class is always 1, 2, 4 or 8"),
    };
    if value > limit {
        return Err(Error::VarIntOutOfRange(value));
    }
    if buf.len() < len {
        return Err(Error::BufferTooSmall {
            needed: len,
            available: buf.len(),
        });
    }

    let bytes = value.to_be_bytes();
    buf[..len].copy_from_slice(&bytes[8 - len..]);
    buf[0] |= tag;
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    mod decode_tests {
        use super::*;

        #[test]
        fn test_decode_1byte() {
            let v = VarInt::decode(&[0x25]).unwrap();
            assert_eq!(v.value(), 0x25);
            assert_eq!(v.encoded_len(), 1);
        }

        #[test]
        fn test_decode_1byte_maximum() {
            let v = VarInt::decode(&[0x3f]).unwrap();
            assert_eq!(v.value(), 63);
        }

        #[test]
        fn test_decode_2byte() {
            let v = VarInt::decode(&[0x41, 0x01]).unwrap();
            assert_eq!(v.value(), 0x0101);
            assert_eq!(v.encoded_len(), 2);
        }

        #[test]
        fn test_decode_4byte() {
            let v = VarInt::decode(&[0x82, 0x11, 0x22, 0x33]).unwrap();
            assert_eq!(v.value(), 0x0211_2233);
            assert_eq!(v.encoded_len(), 4);
        }

        #[test]
        fn test_decode_8byte() {
            let v = VarInt::decode(&[0xc3, 1, 2, 3, 4, 5, 6, 7]).unwrap();
            assert_eq!(v.value(), 0x0301_0203_0405_0607);
            assert_eq!(v.encoded_len(), 8);
        }

        #[test]
        fn test_decode_8byte_maximum_masks_selector_bits() {
            let v = VarInt::decode(&[0xff; 8]).unwrap();
            assert_eq!(v.value(), VARINT_MAX);
        }

        #[test]
        fn test_decode_ignores_trailing_bytes() {
            let v = VarInt::decode(&[0x40, 0x40, 0xaa, 0xbb]).unwrap();
            assert_eq!(v.value(), 64);
            assert_eq!(v.encoded_len(), 2);
        }

        #[test]
        fn test_decode_empty_buffer() {
            assert_eq!(VarInt::decode(&[]), Err(Error::NotEnoughData));
        }

        #[test]
        fn test_decode_one_byte_short_for_every_class() {
            assert_eq!(VarInt::decode(&[0x40]), Err(Error::VarIntTooLarge));
            assert_eq!(VarInt::decode(&[0x80, 0, 0]), Err(Error::VarIntTooLarge));
            assert_eq!(
                VarInt::decode(&[0xc0, 0, 0, 0, 0, 0, 0]),
                Err(Error::VarIntTooLarge)
            );
        }
    }

    mod encode_tests {
        use super::*;

        #[test]
        fn test_encode_rfc_samples() {
            let mut buf = [0u8; 8];
            assert_eq!(encode(37, &mut buf).unwrap(), 1);
            assert_eq!(buf[0], 0x25);

            assert_eq!(encode(15293, &mut buf).unwrap(), 2);
            assert_eq!(&buf[..2], &[0x7b, 0xbd]);

            assert_eq!(encode(494_878_333, &mut buf).unwrap(), 4);
            assert_eq!(&buf[..4], &[0x9d, 0x7f, 0x3e, 0x7d]);

            assert_eq!(encode(151_288_809_941_952_652, &mut buf).unwrap(), 8);
            assert_eq!(buf, [0xc2, 0x19, 0x7c, 0x5e, 0xff, 0x14, 0xe8, 0x8c]);
        }

        #[test]
        fn test_encode_exceeds_max() {
            let mut buf = [0u8; 8];
            assert_eq!(
                encode(VARINT_MAX + 1, &mut buf),
                Err(Error::VarIntOutOfRange(VARINT_MAX + 1))
            );
        }

        #[test]
        fn test_encode_buffer_too_small() {
            let mut buf = [0u8; 1];
            assert_eq!(
                encode(100, &mut buf),
                Err(Error::BufferTooSmall {
                    needed: 2,
                    available: 1
                })
            );
        }

        #[test]
        fn test_size_boundaries() {
            assert_eq!(size(0), 1);
            assert_eq!(size(63), 1);
            assert_eq!(size(64), 2);
            assert_eq!(size(16383), 2);
            assert_eq!(size(16384), 4);
            assert_eq!(size(1_073_741_823), 4);
            assert_eq!(size(1_073_741_824), 8);
            assert_eq!(size(VARINT_MAX), 8);
        }

        #[test]
        fn test_write_preserves_non_minimal_class() {
            // 5 encoded in the 2-byte class
            let v = VarInt::decode(&[0x40, 0x05]).unwrap();
            let mut buf = [0u8; 4];
            assert_eq!(v.write(&mut buf).unwrap(), 2);
            assert_eq!(&buf[..2], &[0x40, 0x05]);
        }

        #[test]
        fn test_write_default_uses_minimal_class() {
            let mut buf = [0xffu8; 2];
            assert_eq!(VarInt::default().write(&mut buf).unwrap(), 1);
            assert_eq!(buf[0], 0x00);
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn decode_inverts_encode(value in 0u64..=VARINT_MAX) {
                let mut buf = [0u8; 8];
                let n = encode(value, &mut buf).unwrap();
                let decoded = VarInt::decode(&buf[..n]).unwrap();
                prop_assert_eq!(decoded.value(), value);
                prop_assert_eq!(decoded.encoded_len(), n);
            }

            #[test]
            fn write_reproduces_decoded_bytes(first in any::<u8>(), rest in any::<[u8; 7]>()) {
                let mut input = [0u8; 8];
                input[0] = first;
                input[1..].copy_from_slice(&rest);
                let v = VarInt::decode(&input).unwrap();
                let mut out = [0u8; 8];
                let n = v.write(&mut out).unwrap();
                prop_assert_eq!(&out[..n], &input[..n]);
            }
        }
    }
}
