use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_postgres::{Config as TokioPgConnectOptions, config::SslMode as TokioPgSslMode};

use crate::shared::ValidationError;

/// Session parameters set on every connection opened by the bulk engine.
///
/// The date and float settings keep the text values read back from staging relations
/// parseable. Statements are never timed out.
pub const BULK_SESSION_SETTINGS: &[(&str, &str)] = &[
    ("datestyle", "ISO"),
    ("intervalstyle", "postgres"),
    ("extra_float_digits", "3"),
    ("client_encoding", "UTF8"),
    ("timezone", "UTC"),
    ("statement_timeout", "0"),
    ("lock_timeout", "30000"),
    ("idle_in_transaction_session_timeout", "60000"),
    ("application_name", "bulk_engine"),
];

/// Renders session parameters as the startup `options` string.
pub fn session_options(settings: &[(&str, &str)]) -> String {
    settings
        .iter()
        .map(|(name, value)| format!("-c {name}={value}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Connection settings for the Postgres database the bulk engine writes to.
#[derive(Debug, Clone, Deserialize)]
pub struct PgConnectionConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub username: String,
    pub password: Option<SecretString>,
    pub tls: TlsConfig,
    /// TCP keepalive configuration for connection health monitoring.
    /// When `None`, TCP keepalives are disabled.
    #[serde(default)]
    pub keepalive: Option<TcpKeepaliveConfig>,
}

impl PgConnectionConfig {
    /// Validates the connection settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.tls.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    pub trusted_root_certs: String,
    pub enabled: bool,
}

impl TlsConfig {
    pub fn disabled() -> Self {
        Self {
            trusted_root_certs: "".to_string(),
            enabled: false,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.enabled && self.trusted_root_certs.trim().is_empty() {
            return Err(ValidationError::MissingTrustedRootCerts);
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpKeepaliveConfig {
    pub idle_secs: u64,
    pub interval_secs: u64,
    pub retries: u32,
}

impl Default for TcpKeepaliveConfig {
    fn default() -> Self {
        Self {
            idle_secs: 30,
            interval_secs: 30,
            retries: 3,
        }
    }
}

/// Conversion of a connection config into driver-specific connect options.
pub trait IntoConnectOptions<Output> {
    fn without_db(&self) -> Output;
    fn with_db(&self) -> Output;
}

impl IntoConnectOptions<TokioPgConnectOptions> for PgConnectionConfig {
    fn without_db(&self) -> TokioPgConnectOptions {
        let ssl_mode = if self.tls.enabled {
            TokioPgSslMode::Require
        } else {
            TokioPgSslMode::Prefer
        };
        let mut config = TokioPgConnectOptions::new();
        config
            .host(self.host.clone())
            .port(self.port)
            .user(self.username.clone())
            .ssl_mode(ssl_mode)
            .options(session_options(BULK_SESSION_SETTINGS));

        if let Some(password) = &self.password {
            config.password(password.expose_secret());
        }

        if let Some(keepalive) = &self.keepalive {
            config
                .keepalives(true)
                .keepalives_idle(Duration::from_secs(keepalive.idle_secs))
                .keepalives_interval(Duration::from_secs(keepalive.interval_secs))
                .keepalives_retries(keepalive.retries);
        }

        config
    }

    fn with_db(&self) -> TokioPgConnectOptions {
        let mut config: TokioPgConnectOptions = self.without_db();
        config.dbname(self.name.clone());
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_options_render_each_setting() {
        assert_eq!(
            session_options(&[("datestyle", "ISO"), ("timezone", "UTC")]),
            "-c datestyle=ISO -c timezone=UTC"
        );
        assert!(
            session_options(BULK_SESSION_SETTINGS).ends_with("-c application_name=bulk_engine")
        );
    }

    #[test]
    fn tls_without_certificates_is_rejected() {
        let tls = TlsConfig {
            trusted_root_certs: " ".to_string(),
            enabled: true,
        };

        assert!(matches!(
            tls.validate(),
            Err(ValidationError::MissingTrustedRootCerts)
        ));
        assert!(TlsConfig::disabled().validate().is_ok());
    }

    #[test]
    fn connect_options_carry_database_name() {
        let config = PgConnectionConfig {
            host: "localhost".to_string(),
            port: 5433,
            name: "bulk".to_string(),
            username: "postgres".to_string(),
            password: None,
            tls: TlsConfig::disabled(),
            keepalive: Some(TcpKeepaliveConfig::default()),
        };

        let with_db: TokioPgConnectOptions = config.with_db();
        let without_db: TokioPgConnectOptions = config.without_db();

        assert_eq!(with_db.get_dbname(), Some("bulk"));
        assert_eq!(without_db.get_dbname(), None);
        assert_eq!(with_db.get_ports(), &[5433]);
    }
}
