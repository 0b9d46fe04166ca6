//! Shared configuration types for the bulk engine.

mod base;
mod bulk;
mod connection;
mod engine;

pub use base::ValidationError;
pub use bulk::{BulkConfig, IdentityBehaviorConfig, StagingStrategyConfig};
pub use connection::{
    BULK_SESSION_SETTINGS, IntoConnectOptions, PgConnectionConfig, TcpKeepaliveConfig, TlsConfig,
    session_options,
};
pub use engine::BulkEngineConfig;
