use config::shared::{BulkConfig, IdentityBehaviorConfig};

use crate::mapping::ColumnMapping;
use crate::staging::StagingStrategy;

/// How caller-supplied values of generated columns are treated on insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdentityBehavior {
    /// Supplied values are loaded as they are.
    KeepIdentity,
    /// Supplied values are ignored and the destination generates new ones.
    #[default]
    ResetIdentity,
}

impl From<IdentityBehaviorConfig> for IdentityBehavior {
    fn from(config: IdentityBehaviorConfig) -> Self {
        match config {
            IdentityBehaviorConfig::KeepIdentity => IdentityBehavior::KeepIdentity,
            IdentityBehaviorConfig::ResetIdentity => IdentityBehavior::ResetIdentity,
        }
    }
}

/// Options of the insert operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertOptions {
    /// Explicit field to column associations. Derived from the rows when unset.
    pub mappings: Option<Vec<ColumnMapping>>,
    /// Rows per COPY invocation. Everything is loaded in one invocation when unset.
    pub batch_size: Option<usize>,
    /// Writes the generated primary key back onto each row.
    pub return_identity: bool,
    pub identity_behavior: IdentityBehavior,
    pub staging: StagingStrategy,
}

impl InsertOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mappings<I, M>(mut self, mappings: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<ColumnMapping>,
    {
        self.mappings = Some(mappings.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn with_return_identity(mut self, return_identity: bool) -> Self {
        self.return_identity = return_identity;
        self
    }

    pub fn with_identity_behavior(mut self, identity_behavior: IdentityBehavior) -> Self {
        self.identity_behavior = identity_behavior;
        self
    }

    pub fn with_staging(mut self, staging: StagingStrategy) -> Self {
        self.staging = staging;
        self
    }
}

impl From<&BulkConfig> for InsertOptions {
    fn from(config: &BulkConfig) -> Self {
        Self {
            mappings: None,
            batch_size: config.batch_size,
            return_identity: false,
            identity_behavior: config.identity_behavior.into(),
            staging: config.staging.into(),
        }
    }
}

/// Options of the delete operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteOptions {
    /// Explicit field to column associations. Derived from the rows when unset.
    pub mappings: Option<Vec<ColumnMapping>>,
    /// Columns matching rows against the destination. The primary key when unset.
    pub qualifiers: Option<Vec<String>>,
    /// Rows per COPY invocation into the staging relation.
    pub batch_size: Option<usize>,
    pub staging: StagingStrategy,
}

impl DeleteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mappings<I, M>(mut self, mappings: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<ColumnMapping>,
    {
        self.mappings = Some(mappings.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_qualifiers<I, S>(mut self, qualifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.qualifiers = Some(qualifiers.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn with_staging(mut self, staging: StagingStrategy) -> Self {
        self.staging = staging;
        self
    }
}

impl From<&BulkConfig> for DeleteOptions {
    fn from(config: &BulkConfig) -> Self {
        Self {
            mappings: None,
            qualifiers: None,
            batch_size: config.batch_size,
            staging: config.staging.into(),
        }
    }
}
