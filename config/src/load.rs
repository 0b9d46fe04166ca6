use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;
use crate::shared::ValidationError;

/// Directory holding the configuration files, relative to the working directory.
const CONFIGURATION_DIR: &str = "configuration";

const EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// Prefix of environment variable overrides, e.g. `APP_BULK__BATCH_SIZE`.
const ENV_PREFIX: &str = "APP";

/// Separator of nested keys in environment variable overrides.
const ENV_KEY_SEPARATOR: &str = "__";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    #[error("configuration directory `{0}` does not exist")]
    MissingDirectory(PathBuf),

    #[error("no `{stem}` configuration file in `{directory}`, expected one of: {expected}")]
    MissingFile {
        stem: String,
        directory: PathBuf,
        expected: String,
    },

    #[error("failed to select the environment: {0}")]
    Environment(#[from] io::Error),

    #[error("failed to read configuration: {0}")]
    Read(#[source] rust_cli_config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] ValidationError),
}

/// Loads configuration from the `configuration` directory of the working directory.
///
/// See [`load_config_from`].
pub fn load_config<T: DeserializeOwned>() -> Result<T, LoadConfigError> {
    let working_dir = std::env::current_dir().map_err(LoadConfigError::CurrentDir)?;

    load_config_from(&working_dir.join(CONFIGURATION_DIR))
}

/// Loads configuration layered from lowest to highest precedence:
///
/// 1. `base.{yaml,yml,json}` in `directory`.
/// 2. `{environment}.{yaml,yml,json}` in `directory`, the environment coming from
///    `APP_ENVIRONMENT`.
/// 3. `APP_`-prefixed environment variables, nested keys separated by `__`.
pub fn load_config_from<T: DeserializeOwned>(directory: &Path) -> Result<T, LoadConfigError> {
    if !directory.is_dir() {
        return Err(LoadConfigError::MissingDirectory(directory.to_path_buf()));
    }

    let environment = Environment::load()?;
    let base_file = layer_file(directory, "base")?;
    let environment_file = layer_file(directory, environment.as_str())?;

    rust_cli_config::Config::builder()
        .add_source(rust_cli_config::File::from(base_file))
        .add_source(rust_cli_config::File::from(environment_file))
        .add_source(
            rust_cli_config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator(ENV_KEY_SEPARATOR)
                .try_parsing(true),
        )
        .build()
        .and_then(|settings| settings.try_deserialize::<T>())
        .map_err(LoadConfigError::Read)
}

fn layer_file(directory: &Path, stem: &str) -> Result<PathBuf, LoadConfigError> {
    EXTENSIONS
        .iter()
        .map(|extension| directory.join(format!("{stem}.{extension}")))
        .find(|path| path.is_file())
        .ok_or_else(|| LoadConfigError::MissingFile {
            stem: stem.to_string(),
            directory: directory.to_path_buf(),
            expected: EXTENSIONS
                .iter()
                .map(|extension| format!("{stem}.{extension}"))
                .collect::<Vec<_>>()
                .join(", "),
        })
}
