// Bincode helpers. Fixed-int encoding keeps the size of fixed-layout
// structs independent of their field values.
use crate::error::{LedgerError, Result};

/// Serialize data using bincode 2.0 with fixed-width integers
pub fn serialize<T: bincode::Encode>(data: &T) -> Result<Vec<u8>> {
    let config = bincode::config::standard().with_fixed_int_encoding();
    bincode::encode_to_vec(data, config)
        .map_err(|e| LedgerError::Serialization(format!("Serialization failed: {e}")))
}

/// Number of bytes `data` occupies under [`serialize`]
pub fn encoded_size<T: bincode::Encode>(data: &T) -> Result<usize> {
    Ok(serialize(data)?.len())
}
