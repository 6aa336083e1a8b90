//! Little-endian byte helpers shared by the transaction and block codecs.

use crate::error::CodecError;

pub type Sha256Hash = [u8; 32];

/// Forward-only reader over a borrowed buffer. Every read is bounds-checked
/// and reports how many bytes were missing.
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::Truncated {
                needed: self.pos + n,
                got: self.buf.len(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn read_u32_le(&mut self) -> Result<u32, CodecError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_array32(&mut self) -> Result<[u8; 32], CodecError> {
        let mut out = [0u8; 32];
        out.copy_from_slice(self.take(32)?);
        Ok(out)
    }
}

pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

pub fn from_hex(s: &str) -> Result<Vec<u8>, CodecError> {
    hex::decode(s.trim()).map_err(|e| CodecError::InvalidHex(e.to_string()))
}

/// Parses a 64-character hex string into a 32-byte hash.
pub fn hash_from_hex(s: &str) -> Result<Sha256Hash, CodecError> {
    let mut out = [0u8; 32];
    hex::decode_to_slice(s.trim(), &mut out).map_err(|e| CodecError::InvalidHex(e.to_string()))?;
    Ok(out)
}
