//! Conversions between textual input and typed cell values.

pub mod bool;
pub mod hex;
pub mod numeric;
pub mod temporal;
