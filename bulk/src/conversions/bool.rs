use crate::bail;
use crate::error::{BulkResult, ErrorKind};

/// Parses a boolean the way Postgres' `boolin` does, ignoring case and surrounding whitespace.
pub fn parse_bool(s: &str) -> BulkResult<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "t" | "true" | "y" | "yes" | "on" | "1" => Ok(true),
        "f" | "false" | "n" | "no" | "off" | "0" => Ok(false),
        _ => {
            bail!(
                ErrorKind::ConversionError,
                "Invalid boolean value",
                format!("Boolean value must be one of t, true, yes, on, 1, f, false, no, off or 0 (received: {s})")
            );
        }
    }
}
