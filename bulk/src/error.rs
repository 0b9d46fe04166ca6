//! Error types and result definitions for bulk operations.
//!
//! Provides an error system with classification, aggregation, and captured diagnostic metadata.
//! The [`BulkError`] type supports single errors, errors with additional detail, and multiple
//! aggregated errors, the latter being used when cleanup of a staging relation fails after the
//! operation itself already failed.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::Location;
use std::sync::Arc;

use bigdecimal::ParseBigDecimalError;
use config::shared::ValidationError;

/// Convenient result type for bulk operations using [`BulkError`] as the error type.
pub type BulkResult<T> = Result<T, BulkError>;

/// Detailed payload stored for single [`BulkError`] instances.
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type for bulk operations.
///
/// [`BulkError`] can represent single errors, errors with additional detail, or multiple
/// aggregated errors.
#[derive(Debug, Clone)]
pub struct BulkError {
    repr: ErrorRepr,
}

/// Internal representation of error data.
#[derive(Debug, Clone)]
enum ErrorRepr {
    /// Single error payload holding rich metadata.
    Single(ErrorPayload),
    /// Multiple aggregated errors, the first one being the primary failure.
    Many {
        errors: Vec<BulkError>,
        location: &'static Location<'static>,
    },
}

/// Categories of errors that can occur during bulk operations.
///
/// The first group classifies the phase of a bulk operation that failed, the second group
/// classifies failures of the underlying transport and environment.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Operation Errors
    InvalidInput,
    SchemaMismatch,
    MissingRelation,
    StagingFailure,
    TransferFailure,
    ReconciliationFailure,
    Cancelled,

    // Transport Errors
    ConnectionFailed,
    AuthenticationError,
    EncryptionError,
    QueryFailed,
    ConversionError,
    ConfigError,
    IoError,

    // Unknown / Uncategorized
    Unknown,
}

impl BulkError {
    /// Returns the [`ErrorKind`] of this error.
    ///
    /// For multiple errors, returns the kind of the first error or [`ErrorKind::Unknown`]
    /// if the error list is empty.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns all [`ErrorKind`]s present in this error, flattened.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => errors
                .iter()
                .flat_map(|err| err.kinds())
                .collect::<Vec<_>>(),
        }
    }

    /// Returns the static description of this error.
    ///
    /// For multiple errors, returns the description of the first error.
    pub fn description(&self) -> &str {
        match self.repr {
            ErrorRepr::Single(ref payload) => &payload.description,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.description())
                .unwrap_or("aggregated errors"),
        }
    }

    /// Returns the detailed error information if available.
    ///
    /// For multiple errors, returns the detail of the first error that has one.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    /// Returns the captured backtrace for this error.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Attaches an originating [`error::Error`] to this error and returns the modified instance.
    ///
    /// Has no effect when called on aggregated errors because aggregates forward the first
    /// contained error as their source.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }
        self
    }

    /// Creates a [`BulkError`] from its components.
    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        BulkError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }
}

impl PartialEq for BulkError {
    fn eq(&self, other: &BulkError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (
                ErrorRepr::Many {
                    errors: errors_a, ..
                },
                ErrorRepr::Many {
                    errors: errors_b, ..
                },
            ) => {
                errors_a.len() == errors_b.len()
                    && errors_a.iter().zip(errors_b.iter()).all(|(a, b)| a == b)
            }
            _ => false,
        }
    }
}

impl Hash for BulkError {
    /// Hashes the error using only its kind and static description.
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(&self.repr).hash(state);
        match &self.repr {
            ErrorRepr::Single(payload) => {
                payload.kind.hash(state);
                payload.description.hash(state);
            }
            ErrorRepr::Many { errors, .. } => {
                errors.len().hash(state);
                for error in errors {
                    error.hash(state);
                }
            }
        }
    }
}

impl fmt::Display for BulkError {
    /// Renders the kind, the description and the callsite on the first line, followed by the
    /// indented detail, cause and backtrace. Aggregates list their errors numbered.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                write!(
                    f,
                    "[{:?}] {} @ {}",
                    payload.kind,
                    payload.description,
                    payload.location
                )?;
                if let Some(detail) = &payload.detail {
                    write_indented(f, "Detail", detail)?;
                }
                if let Some(source) = &payload.source {
                    write_indented(f, "Caused by", &source.to_string())?;
                }
                if payload.backtrace.status() == BacktraceStatus::Captured {
                    write_indented(f, "Backtrace", &payload.backtrace.to_string())?;
                }

                Ok(())
            }
            ErrorRepr::Many { errors, location } => {
                write!(f, "[Many] {} errors aggregated @ {location}", errors.len())?;
                for (index, error) in errors.iter().enumerate() {
                    write_indented(f, &format!("{}.", index + 1), &error.to_string())?;
                }

                Ok(())
            }
        }
    }
}

impl error::Error for BulkError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

/// Writes `label` on its own indented line, followed by `text` indented one level deeper.
fn write_indented(f: &mut fmt::Formatter<'_>, label: &str, text: &str) -> fmt::Result {
    write!(f, "\n  {label}:")?;
    for line in text.lines() {
        write!(f, "\n    {line}")?;
    }

    Ok(())
}

/// Creates a [`BulkError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for BulkError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> BulkError {
        BulkError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`BulkError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for BulkError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> BulkError {
        BulkError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Creates a [`BulkError`] from a vector of errors for aggregation.
///
/// If the vector contains exactly one error, returns that error directly without wrapping
/// it in the [`ErrorRepr::Many`] variant.
impl<E> From<Vec<E>> for BulkError
where
    E: Into<BulkError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> BulkError {
        let location = Location::caller();

        let mut errors: Vec<BulkError> = errors.into_iter().map(Into::into).collect();

        if errors.len() == 1
            && let Some(error) = errors.pop()
        {
            return error;
        }

        BulkError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

/// Converts [`std::io::Error`] to [`BulkError`] with [`ErrorKind::IoError`].
impl From<std::io::Error> for BulkError {
    #[track_caller]
    fn from(err: std::io::Error) -> BulkError {
        let detail = err.to_string();
        BulkError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`ValidationError`] to [`BulkError`] with [`ErrorKind::ConfigError`].
impl From<ValidationError> for BulkError {
    #[track_caller]
    fn from(err: ValidationError) -> BulkError {
        let detail = err.to_string();
        BulkError::from_components(
            ErrorKind::ConfigError,
            Cow::Borrowed("Invalid configuration"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`serde_json::Error`] to [`BulkError`] with [`ErrorKind::ConversionError`].
impl From<serde_json::Error> for BulkError {
    #[track_caller]
    fn from(err: serde_json::Error) -> BulkError {
        let kind = match err.classify() {
            serde_json::error::Category::Io => ErrorKind::IoError,
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => ErrorKind::ConversionError,
        };

        let detail = err.to_string();
        BulkError::from_components(
            kind,
            Cow::Borrowed("JSON conversion failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`std::num::ParseIntError`] to [`BulkError`] with [`ErrorKind::ConversionError`].
impl From<std::num::ParseIntError> for BulkError {
    #[track_caller]
    fn from(err: std::num::ParseIntError) -> BulkError {
        let detail = err.to_string();
        BulkError::from_components(
            ErrorKind::ConversionError,
            Cow::Borrowed("Integer parsing failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`std::num::ParseFloatError`] to [`BulkError`] with [`ErrorKind::ConversionError`].
impl From<std::num::ParseFloatError> for BulkError {
    #[track_caller]
    fn from(err: std::num::ParseFloatError) -> BulkError {
        let detail = err.to_string();
        BulkError::from_components(
            ErrorKind::ConversionError,
            Cow::Borrowed("Float parsing failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`ParseBigDecimalError`] to [`BulkError`] with [`ErrorKind::ConversionError`].
impl From<ParseBigDecimalError> for BulkError {
    #[track_caller]
    fn from(err: ParseBigDecimalError) -> BulkError {
        let detail = err.to_string();
        BulkError::from_components(
            ErrorKind::ConversionError,
            Cow::Borrowed("Numeric parsing failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`uuid::Error`] to [`BulkError`] with [`ErrorKind::ConversionError`].
impl From<uuid::Error> for BulkError {
    #[track_caller]
    fn from(err: uuid::Error) -> BulkError {
        let detail = err.to_string();
        BulkError::from_components(
            ErrorKind::ConversionError,
            Cow::Borrowed("UUID parsing failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`chrono::ParseError`] to [`BulkError`] with [`ErrorKind::ConversionError`].
impl From<chrono::ParseError> for BulkError {
    #[track_caller]
    fn from(err: chrono::ParseError) -> BulkError {
        let detail = err.to_string();
        BulkError::from_components(
            ErrorKind::ConversionError,
            Cow::Borrowed("Datetime parsing failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`rustls::Error`] to [`BulkError`] with [`ErrorKind::EncryptionError`].
impl From<rustls::Error> for BulkError {
    #[track_caller]
    fn from(err: rustls::Error) -> BulkError {
        let detail = err.to_string();
        BulkError::from_components(
            ErrorKind::EncryptionError,
            Cow::Borrowed("TLS configuration failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`tokio_postgres::Error`] to [`BulkError`] with the appropriate error kind.
///
/// Maps errors based on Postgres SQLSTATE codes. Call sites that know which phase of an
/// operation failed wrap the converted error into the kind of that phase.
impl From<tokio_postgres::Error> for BulkError {
    #[track_caller]
    fn from(err: tokio_postgres::Error) -> BulkError {
        let (kind, description) = match err.code() {
            Some(sqlstate) => {
                use tokio_postgres::error::SqlState;

                match *sqlstate {
                    // Connection errors (08xxx)
                    SqlState::CONNECTION_EXCEPTION
                    | SqlState::CONNECTION_DOES_NOT_EXIST
                    | SqlState::CONNECTION_FAILURE
                    | SqlState::SQLCLIENT_UNABLE_TO_ESTABLISH_SQLCONNECTION
                    | SqlState::SQLSERVER_REJECTED_ESTABLISHMENT_OF_SQLCONNECTION => (
                        ErrorKind::ConnectionFailed,
                        "PostgreSQL connection failed",
                    ),

                    // Authentication errors (28xxx)
                    SqlState::INVALID_AUTHORIZATION_SPECIFICATION | SqlState::INVALID_PASSWORD => (
                        ErrorKind::AuthenticationError,
                        "PostgreSQL authentication failed",
                    ),

                    // Missing relations (42P01, 3F000)
                    SqlState::UNDEFINED_TABLE | SqlState::UNDEFINED_SCHEMA => (
                        ErrorKind::MissingRelation,
                        "PostgreSQL relation not found",
                    ),

                    // Column and type mismatches (42703, 42804)
                    SqlState::UNDEFINED_COLUMN | SqlState::DATATYPE_MISMATCH => (
                        ErrorKind::SchemaMismatch,
                        "PostgreSQL column mismatch",
                    ),

                    // Data conversion errors (22xxx)
                    SqlState::DATA_EXCEPTION
                    | SqlState::INVALID_TEXT_REPRESENTATION
                    | SqlState::INVALID_DATETIME_FORMAT
                    | SqlState::NUMERIC_VALUE_OUT_OF_RANGE
                    | SqlState::STRING_DATA_RIGHT_TRUNCATION
                    | SqlState::BAD_COPY_FILE_FORMAT
                    | SqlState::INVALID_BINARY_REPRESENTATION => (
                        ErrorKind::ConversionError,
                        "PostgreSQL data conversion failed",
                    ),

                    // Operator intervention errors (57xxx)
                    SqlState::QUERY_CANCELED => {
                        (ErrorKind::Cancelled, "PostgreSQL query canceled")
                    }
                    SqlState::ADMIN_SHUTDOWN
                    | SqlState::CRASH_SHUTDOWN
                    | SqlState::CANNOT_CONNECT_NOW
                    | SqlState::TOO_MANY_CONNECTIONS => (
                        ErrorKind::ConnectionFailed,
                        "PostgreSQL server unavailable",
                    ),

                    // Configuration file errors (F0xxx)
                    SqlState::CONFIG_FILE_ERROR | SqlState::LOCK_FILE_EXISTS => {
                        (ErrorKind::ConfigError, "PostgreSQL configuration error")
                    }

                    SqlState::IO_ERROR | SqlState::DISK_FULL => {
                        (ErrorKind::IoError, "PostgreSQL I/O error")
                    }

                    _ => (ErrorKind::QueryFailed, "PostgreSQL query failed"),
                }
            }
            // No SQL state means connection issue
            None => (
                ErrorKind::ConnectionFailed,
                "PostgreSQL connection failed",
            ),
        };

        let detail = err.to_string();
        BulkError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}
