//! Alternate-identifier encoding
//!
//! Lists of alternate identifiers are persisted as one comma-joined string.
//! The encoding is only lossless when no entry is empty and no entry
//! contains the delimiter, so both backends reject such lists on write.

use crate::error::{CatalogError, Result};

pub const ALTERNATE_IDENTIFIER_DELIMITER: char = ',';

/// Reject lists that would not survive a join/split round trip
pub fn validate_alternate_identifiers(values: &[String]) -> Result<()> {
    for value in values {
        if value.is_empty() {
            return Err(CatalogError::validation_error(
                "alternate identifier must not be empty",
            ));
        }
        if value.contains(ALTERNATE_IDENTIFIER_DELIMITER) {
            return Err(CatalogError::validation_error(format!(
                "alternate identifier '{}' contains the '{}' delimiter",
                value, ALTERNATE_IDENTIFIER_DELIMITER
            )));
        }
    }
    Ok(())
}

pub fn encode_alternate_identifiers(values: &[String]) -> Result<String> {
    validate_alternate_identifiers(values)?;
    Ok(join_alternate_identifiers(values))
}

/// Join without validation; used for matching against already stored lists
pub fn join_alternate_identifiers(values: &[String]) -> String {
    values.join(",")
}

pub fn decode_alternate_identifiers(encoded: &str) -> Vec<String> {
    if encoded.is_empty() {
        return Vec::new();
    }
    encoded
        .split(ALTERNATE_IDENTIFIER_DELIMITER)
        .map(str::to_string)
        .collect()
}
