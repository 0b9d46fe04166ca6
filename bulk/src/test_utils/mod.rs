//! Utilities for testing bulk operations.
//!
//! - [`recording`] provides [`recording::RecordingBackend`], an in-memory backend recording
//!   every statement it receives.
//! - [`schema`] provides table metadata matching the tables the tests create.
//! - [`entities`] provides a typed entity implementing [`crate::types::BulkEntity`].
//! - [`database`] spawns isolated Postgres databases.
//! - [`failpoints`] configures fail points for the duration of a test.

pub mod database;
pub mod entities;
pub mod failpoints;
pub mod recording;
pub mod schema;
