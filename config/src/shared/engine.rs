use std::path::Path;

use serde::Deserialize;

use crate::load::{LoadConfigError, load_config, load_config_from};
use crate::shared::{BulkConfig, PgConnectionConfig, ValidationError};

/// Top level configuration of a bulk engine: where to connect and the operation defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkEngineConfig {
    pub pg_connection: PgConnectionConfig,
    #[serde(default)]
    pub bulk: BulkConfig,
}

impl BulkEngineConfig {
    /// Loads and validates the configuration from the `configuration` directory of the working
    /// directory.
    pub fn load() -> Result<Self, LoadConfigError> {
        let config = load_config::<Self>()?;
        config.validate()?;

        Ok(config)
    }

    /// Loads and validates the configuration from `directory`.
    pub fn load_from(directory: &Path) -> Result<Self, LoadConfigError> {
        let config = load_config_from::<Self>(directory)?;
        config.validate()?;

        Ok(config)
    }

    /// Validates every section of the configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.pg_connection.validate()?;
        self.bulk.validate()
    }
}
