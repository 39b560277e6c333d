//! Bounds-checked output cursor shared by the encoders.

use crate::error::{Error, Result};
use crate::varint::{self, VarInt};

pub(crate) struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    pub(crate) fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    /// Skip over `n` bytes already written by another encoder.
    pub(crate) fn advance(&mut self, n: usize) -> Result<()> {
        self.reserve(n)?;
        self.pos += n;
        Ok(())
    }

    fn reserve(&self, n: usize) -> Result<()> {
        let available = self.buf.len() - self.pos;
        if available < n {
            return Err(Error::BufferTooSmall {
                needed: self.pos + n,
                available: self.buf.len(),
            });
        }
        Ok(())
    }

    pub(crate) fn put_u8(&mut self, b: u8) -> Result<()> {
        self.reserve(1)?;
        self.buf[self.pos] = b;
        self.pos += 1;
        Ok(())
    }

    pub(crate) fn put_slice(&mut self, src: &[u8]) -> Result<()> {
        self.reserve(src.len())?;
        self.buf[self.pos..self.pos + src.len()].copy_from_slice(src);
        self.pos += src.len();
        Ok(())
    }

    pub(crate) fn put_varint(&mut self, value: u64) -> Result<()> {
        match varint::encode(value, &mut self.buf[self.pos..]) {
            Ok(n) => {
                self.pos += n;
                Ok(())
            }
            Err(Error::BufferTooSmall { needed, .. }) => Err(Error::BufferTooSmall {
                needed: self.pos + needed,
                available: self.buf.len(),
            }),
            Err(e) => Err(e),
        }
    }

    /// Write a decoded varint in its original length class.
    pub(crate) fn put_varint_exact(&mut self, v: &VarInt) -> Result<()> {
        match v.write(&mut self.buf[self.pos..]) {
            Ok(n) => {
                self.pos += n;
                Ok(())
            }
            Err(Error::BufferTooSmall { needed, .. }) => Err(Error::BufferTooSmall {
                needed: self.pos + needed,
                available: self.buf.len(),
            }),
            Err(e) => Err(e),
        }
    }
}
