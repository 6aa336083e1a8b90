//! Error types for NamiChain

use std::fmt;

/// Failures of the fixed-width binary codec. Always fatal to the decode call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("invalid block signature")]
    InvalidSignature,
    #[error("declared size {declared} does not match buffer length {actual}")]
    SizeMismatch { declared: usize, actual: usize },
    #[error("tx_count {tx_count} requires {expected} bytes, block holds {actual}")]
    LengthMismatch {
        tx_count: u32,
        expected: usize,
        actual: usize,
    },
    #[error("truncated buffer: needed {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },
    #[error("field length byte {0} exceeds the 32-byte slot")]
    FieldOverflow(u8),
    #[error("non-zero padding after a {0}-byte field")]
    NonZeroPadding(u8),
    #[error("field is not valid UTF-8")]
    InvalidUtf8,
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    Codec(CodecError),
    ValueTooLong { field: &'static str, len: usize },
    InvalidBlock(String),
    KeyNotFound(String),
    BlockNotFound(String),
    NoSolutionFound,
    CorruptChain(String),
    IoError(String),
    ConfigError(String),
    ApiError(String),
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChainError::Codec(err) => write!(f, "Codec error: {}", err),
            ChainError::ValueTooLong { field, len } => {
                write!(f, "Value too long: {} is {} bytes (max 32)", field, len)
            }
            ChainError::InvalidBlock(msg) => write!(f, "Invalid block: {}", msg),
            ChainError::KeyNotFound(key) => write!(f, "Key not found: {}", key),
            ChainError::BlockNotFound(id) => write!(f, "Block not found: {}", id),
            ChainError::NoSolutionFound => write!(f, "No nonce satisfies the target"),
            ChainError::CorruptChain(msg) => write!(f, "Corrupt chain file: {}", msg),
            ChainError::IoError(msg) => write!(f, "IO error: {}", msg),
            ChainError::ConfigError(msg) => write!(f, "Config error: {}", msg),
            ChainError::ApiError(msg) => write!(f, "API error: {}", msg),
        }
    }
}

impl std::error::Error for ChainError {}

impl From<CodecError> for ChainError {
    fn from(err: CodecError) -> Self {
        ChainError::Codec(err)
    }
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<reqwest::Error> for ChainError {
    fn from(err: reqwest::Error) -> Self {
        ChainError::ApiError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
