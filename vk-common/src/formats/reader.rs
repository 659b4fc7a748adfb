//! Bounds-checked little-endian reader used by the decoders.

use crate::VK_ASSET_FORMAT;

/// Errors produced while decoding an asset file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unrecognized magic tag (expected {expected})")]
    BadMagic { expected: &'static str },

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u32),

    #[error("unexpected end of data at offset {offset}: need {needed} more bytes")]
    UnexpectedEof { offset: usize, needed: usize },

    #[error("joint name at offset {0} is not NUL-terminated")]
    UnterminatedName(usize),

    #[error("joint name at offset {0} is not valid UTF-8")]
    InvalidName(usize),

    #[error("invalid joint count {0}")]
    InvalidJointCount(i16),

    #[error("{0} poses declared with no joints")]
    PosesWithoutJoints(u32),

    #[error("{0} trailing bytes after asset data")]
    TrailingBytes(usize),
}

/// Cursor over a byte slice.
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Current offset from the start of the data
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Fail unless every byte has been consumed
    pub fn finish(&self) -> Result<(), DecodeError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(DecodeError::TrailingBytes(n)),
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < len {
            return Err(DecodeError::UnexpectedEof {
                offset: self.pos,
                needed: len - self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Whether the unread data starts with `magic` (does not consume)
    pub fn peek_magic(&self, magic: &[u8]) -> bool {
        self.bytes[self.pos..].starts_with(magic)
    }

    /// Consume `magic`, failing with [`DecodeError::BadMagic`] on mismatch
    pub fn expect_magic(&mut self, magic: &[u8], name: &'static str) -> Result<(), DecodeError> {
        if !self.peek_magic(magic) {
            return Err(DecodeError::BadMagic { expected: name });
        }
        self.pos += magic.len();
        Ok(())
    }

    /// Read the version word and reject anything but the current revision
    pub fn expect_version(&mut self) -> Result<u32, DecodeError> {
        let version = self.read_u32()?;
        if version != VK_ASSET_FORMAT.version {
            return Err(DecodeError::UnsupportedVersion(version));
        }
        Ok(version)
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16, DecodeError> {
        Ok(i16::from_le_bytes(self.take_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, DecodeError> {
        Ok(f32::from_le_bytes(self.take_array()?))
    }

    pub fn read_f32s<const N: usize>(&mut self) -> Result<[f32; N], DecodeError> {
        let mut out = [0.0f32; N];
        for value in &mut out {
            *value = self.read_f32()?;
        }
        Ok(out)
    }

    pub fn read_i16s<const N: usize>(&mut self) -> Result<[i16; N], DecodeError> {
        let mut out = [0i16; N];
        for value in &mut out {
            *value = self.read_i16()?;
        }
        Ok(out)
    }

    pub fn read_u32s<const N: usize>(&mut self) -> Result<[u32; N], DecodeError> {
        let mut out = [0u32; N];
        for value in &mut out {
            *value = self.read_u32()?;
        }
        Ok(out)
    }

    /// Read a NUL-terminated UTF-8 string
    pub fn read_cstr(&mut self) -> Result<String, DecodeError> {
        let start = self.pos;
        let len = self.bytes[start..]
            .iter()
            .position(|&b| b == 0)
            .ok_or(DecodeError::UnterminatedName(start))?;
        let raw = self.take(len)?;
        self.pos += 1; // NUL
        String::from_utf8(raw.to_vec()).map_err(|_| DecodeError::InvalidName(start))
    }
}
