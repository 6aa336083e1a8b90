/// Transaction types for NamiChain
use crate::codec::{ByteReader, Sha256Hash};
use crate::error::{ChainError, CodecError};
use sha2::{Digest, Sha256};

use super::validation::{validate_field, KEY_LENGTH, VALUE_LENGTH};

/// Bytes reserved for one string slot: a length byte plus the padded payload.
pub const SLOT_SIZE: usize = 1 + KEY_LENGTH;

/// Encoded size of a transaction (key slot followed by value slot).
pub const TX_SIZE: usize = 2 * SLOT_SIZE;

/// A key/value write. Equality is by the `(key, value)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
pub struct Transaction {
    key: String,
    value: String,
}

impl Transaction {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Result<Self, ChainError> {
        let key = key.into();
        let value = value.into();
        validate_field("key", &key, KEY_LENGTH)?;
        validate_field("value", &value, VALUE_LENGTH)?;
        Ok(Transaction { key, value })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn encode(&self) -> [u8; TX_SIZE] {
        let mut out = [0u8; TX_SIZE];
        write_slot(&mut out[..SLOT_SIZE], &self.key);
        write_slot(&mut out[SLOT_SIZE..], &self.value);
        out
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.encode());
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut reader = ByteReader::new(bytes);
        let tx = Self::read_from(&mut reader)?;
        if reader.remaining() != 0 {
            return Err(CodecError::SizeMismatch {
                declared: TX_SIZE,
                actual: bytes.len(),
            });
        }
        Ok(tx)
    }

    pub(crate) fn read_from(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        let key = read_slot(reader.take(SLOT_SIZE)?)?;
        let value = read_slot(reader.take(SLOT_SIZE)?)?;
        Ok(Transaction { key, value })
    }

    /// SHA-256 of the encoded transaction.
    pub fn hash(&self) -> Sha256Hash {
        Sha256::digest(self.encode()).into()
    }

    pub fn hash_str(&self) -> String {
        hex::encode(self.hash())
    }
}

fn write_slot(slot: &mut [u8], s: &str) {
    let bytes = s.as_bytes();
    slot[0] = bytes.len() as u8;
    slot[1..1 + bytes.len()].copy_from_slice(bytes);
}

fn read_slot(slot: &[u8]) -> Result<String, CodecError> {
    let len = slot[0];
    if len as usize > SLOT_SIZE - 1 {
        return Err(CodecError::FieldOverflow(len));
    }
    let (payload, padding) = slot[1..].split_at(len as usize);
    if padding.iter().any(|b| *b != 0) {
        return Err(CodecError::NonZeroPadding(len));
    }
    String::from_utf8(payload.to_vec()).map_err(|_| CodecError::InvalidUtf8)
}
