//! Postgres relation metadata and helpers shared by the bulk engine.

pub mod schema;
#[cfg(feature = "tokio")]
pub mod tokio;
pub mod types;
