use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Where staging relations are allocated by default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagingStrategyConfig {
    /// Temporary relation scoped to the session.
    #[default]
    SessionTemporary,
    /// Unlogged relation with a generated unique name.
    Physical,
}

/// How caller-supplied primary key values are treated by default on insert.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityBehaviorConfig {
    KeepIdentity,
    #[default]
    ResetIdentity,
}

/// Defaults applied to bulk operations when the caller leaves an option unset.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BulkConfig {
    /// Rows per COPY invocation. `None` loads the whole source in one invocation.
    #[serde(default)]
    pub batch_size: Option<usize>,
    /// Staging strategy used by delete and identity-returning insert operations.
    #[serde(default)]
    pub staging: StagingStrategyConfig,
    /// Identity behavior used by insert operations.
    #[serde(default)]
    pub identity_behavior: IdentityBehaviorConfig,
    /// Name prefix of physical staging relations.
    #[serde(default = "default_staging_prefix")]
    pub staging_prefix: String,
}

impl BulkConfig {
    /// Default name prefix of physical staging relations.
    pub const DEFAULT_STAGING_PREFIX: &'static str = "bulk_staging_";

    /// Longest prefix that still leaves room for the 32 character unique suffix within
    /// Postgres' 63 byte identifier limit.
    pub const MAX_STAGING_PREFIX_LEN: usize = 31;

    /// Validates bulk configuration settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.batch_size == Some(0) {
            return Err(ValidationError::InvalidFieldValue {
                field: "bulk.batch_size".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if self.staging_prefix.is_empty() || self.staging_prefix.len() > Self::MAX_STAGING_PREFIX_LEN
        {
            return Err(ValidationError::InvalidFieldValue {
                field: "bulk.staging_prefix".to_string(),
                constraint: format!(
                    "must be between 1 and {} bytes long",
                    Self::MAX_STAGING_PREFIX_LEN
                ),
            });
        }

        Ok(())
    }
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            batch_size: None,
            staging: StagingStrategyConfig::default(),
            identity_behavior: IdentityBehaviorConfig::default(),
            staging_prefix: default_staging_prefix(),
        }
    }
}

fn default_staging_prefix() -> String {
    BulkConfig::DEFAULT_STAGING_PREFIX.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_filled_in_when_missing() {
        let config: BulkConfig = serde_json::from_str("{}").unwrap();

        assert_eq!(config.batch_size, None);
        assert_eq!(config.staging, StagingStrategyConfig::SessionTemporary);
        assert_eq!(config.identity_behavior, IdentityBehaviorConfig::ResetIdentity);
        assert_eq!(config.staging_prefix, "bulk_staging_");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn strategies_use_snake_case() {
        let config: BulkConfig =
            serde_json::from_str(r#"{"staging": "physical", "identity_behavior": "keep_identity"}"#)
                .unwrap();

        assert_eq!(config.staging, StagingStrategyConfig::Physical);
        assert_eq!(config.identity_behavior, IdentityBehaviorConfig::KeepIdentity);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let config = BulkConfig {
            batch_size: Some(0),
            ..BulkConfig::default()
        };

        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidFieldValue { .. })
        ));
    }

    #[test]
    fn overlong_staging_prefix_is_rejected() {
        let config = BulkConfig {
            staging_prefix: "x".repeat(40),
            ..BulkConfig::default()
        };

        assert!(config.validate().is_err());
    }
}
