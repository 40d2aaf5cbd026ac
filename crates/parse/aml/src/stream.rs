//! Bounds-checked byte cursors over AML buffers.
//!
//! [`AmlStream`] reads forward over a borrowed slice and is what the parser
//! consumes; [`AmlStreamMut`] writes forward into a pre-sized buffer and is
//! what the serializer fills. Neither ever reallocates.

use crate::AmlError;

/// Forward-reading cursor over a borrowed AML byte slice.
#[derive(Clone)]
pub struct AmlStream<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> AmlStream<'a> {
    /// Creates a cursor positioned at the start of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current offset from the start of the underlying slice.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of unread bytes.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns `true` once every byte has been consumed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Unread bytes, without consuming them.
    #[must_use]
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Returns the next byte without consuming it.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::UnexpectedEnd`] at the end of the stream.
    pub fn peek_byte(&self) -> Result<u8, AmlError> {
        self.data.get(self.pos).copied().ok_or(AmlError::UnexpectedEnd)
    }

    /// Returns the byte `offset` positions ahead without consuming anything.
    #[must_use]
    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.data.get(self.pos + offset).copied()
    }

    /// Consumes and returns one byte.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::UnexpectedEnd`] at the end of the stream.
    pub fn read_byte(&mut self) -> Result<u8, AmlError> {
        let byte = self.peek_byte()?;
        self.pos += 1;
        Ok(byte)
    }

    /// Consumes `n` bytes and returns them as a slice.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::UnexpectedEnd`] if fewer than `n` bytes remain.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], AmlError> {
        if n > self.remaining() {
            return Err(AmlError::UnexpectedEnd);
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Skips `n` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::UnexpectedEnd`] if fewer than `n` bytes remain.
    pub fn advance(&mut self, n: usize) -> Result<(), AmlError> {
        self.read_bytes(n).map(|_| ())
    }

    /// Splits off the next `len` bytes as an independent cursor and advances
    /// past them.
    ///
    /// This is how PkgLength-bounded scopes are parsed: the child cursor can
    /// never read beyond the budget its PkgLength declared.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::InvalidPkgLength`] if the budget exceeds what is
    /// left in this cursor.
    pub fn split(&mut self, len: usize) -> Result<AmlStream<'a>, AmlError> {
        if len > self.remaining() {
            return Err(AmlError::InvalidPkgLength);
        }
        let sub = AmlStream::new(&self.data[self.pos..self.pos + len]);
        self.pos += len;
        Ok(sub)
    }
}

/// Forward-writing cursor over a caller-sized buffer.
pub struct AmlStreamMut<'a> {
    data: &'a mut [u8],
    pos: usize,
}

impl<'a> AmlStreamMut<'a> {
    /// Creates a cursor positioned at the start of `data`.
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Number of bytes written so far.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Space left in the buffer.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Appends one byte.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::BufferTooSmall`] if the buffer is full.
    pub fn write_byte(&mut self, byte: u8) -> Result<(), AmlError> {
        self.write_bytes(&[byte])
    }

    /// Appends `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::BufferTooSmall`] if they do not fit.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), AmlError> {
        if bytes.len() > self.remaining() {
            return Err(AmlError::BufferTooSmall);
        }
        self.data[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_and_bounds() {
        let data = [0x10, 0x05, 0x5F, 0x53, 0x42, 0x5F];
        let mut stream = AmlStream::new(&data);
        assert_eq!(stream.peek_byte(), Ok(0x10));
        assert_eq!(stream.read_byte(), Ok(0x10));
        assert_eq!(stream.read_bytes(1), Ok(&[0x05][..]));
        assert_eq!(stream.remaining(), 4);
        assert_eq!(stream.read_bytes(5), Err(AmlError::UnexpectedEnd));
        assert_eq!(stream.read_bytes(4), Ok(&b"_SB_"[..]));
        assert!(stream.is_empty());
        assert_eq!(stream.read_byte(), Err(AmlError::UnexpectedEnd));
    }

    #[test]
    fn split_bounds_child() {
        let data = [1, 2, 3, 4, 5];
        let mut stream = AmlStream::new(&data);
        stream.advance(1).unwrap();
        let mut child = stream.split(2).unwrap();
        assert_eq!(stream.position(), 3);
        assert_eq!(child.read_bytes(2), Ok(&[2, 3][..]));
        assert_eq!(child.read_byte(), Err(AmlError::UnexpectedEnd));
        assert!(stream.split(3).is_err());
    }

    #[test]
    fn writer_never_grows() {
        let mut buf = [0u8; 3];
        let mut out = AmlStreamMut::new(&mut buf);
        out.write_byte(0xAA).unwrap();
        out.write_bytes(&[0xBB, 0xCC]).unwrap();
        assert_eq!(out.write_byte(0xDD), Err(AmlError::BufferTooSmall));
        assert_eq!(out.position(), 3);
        assert_eq!(buf, [0xAA, 0xBB, 0xCC]);
    }
}
