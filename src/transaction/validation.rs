use crate::error::ChainError;

pub const KEY_LENGTH: usize = 32;
pub const VALUE_LENGTH: usize = 32;

/// Rejects strings whose UTF-8 encoding does not fit the fixed-width slot.
pub fn validate_field(field: &'static str, s: &str, max_len: usize) -> Result<(), ChainError> {
    let len = s.len();
    if len > max_len {
        return Err(ChainError::ValueTooLong { field, len });
    }
    Ok(())
}
