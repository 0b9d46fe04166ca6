use std::fmt::Write;

use crate::bail;
use crate::error::{BulkResult, ErrorKind};

/// Converts a Postgres bytea hex string to a byte array.
///
/// The input uses the `\x` prefix followed by pairs of hexadecimal digits.
pub fn parse_bytea_hex(bytea_hex_string: &str) -> BulkResult<Vec<u8>> {
    let Some(digits) = bytea_hex_string.strip_prefix("\\x") else {
        bail!(
            ErrorKind::ConversionError,
            "Could not convert from bytea hex string to byte array",
            "The prefix '\\x' is missing"
        );
    };

    if digits.len() % 2 != 0 {
        bail!(
            ErrorKind::ConversionError,
            "Could not convert from bytea hex string to byte array",
            "The number of digits is odd"
        );
    }

    let mut result = Vec::with_capacity(digits.len() / 2);
    for i in (0..digits.len()).step_by(2) {
        let Some(pair) = digits.get(i..i + 2) else {
            bail!(
                ErrorKind::ConversionError,
                "Could not convert from bytea hex string to byte array",
                "The input contains non ascii characters"
            );
        };
        result.push(u8::from_str_radix(pair, 16)?);
    }

    Ok(result)
}

/// Formats bytes in the bytea hex format, `\x` followed by lowercase hexadecimal digits.
pub fn to_bytea_hex(bytes: &[u8]) -> String {
    let mut result = String::with_capacity(2 + bytes.len() * 2);
    result.push_str("\\x");
    for byte in bytes {
        // Writing into a String cannot fail.
        let _ = write!(result, "{byte:02x}");
    }

    result
}
