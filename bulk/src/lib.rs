//! Bulk loading and deleting of rows in Postgres.
//!
//! Rows from typed records, field bags, JSON objects, data tables or readers are loaded
//! through `COPY ... FROM STDIN` in text or binary format. Deletes and identity-returning
//! inserts go through a staging relation that is joined against the destination in a single
//! set-based statement and dropped on every exit path.
//!
//! The entry point is [`operations::BulkEngine`], with a blocking counterpart in
//! [`blocking::BulkEngine`].

pub mod backend;
pub mod blocking;
mod codec;
pub mod concurrency;
pub mod conversions;
pub mod error;
pub mod failpoints;
pub mod macros;
pub mod mapping;
pub mod metrics;
pub mod operations;
mod qualifier;
mod reconcile;
pub mod source;
pub mod staging;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
mod transfer;
pub mod types;
