use std::fmt;
use std::str::FromStr;

use pg_escape::quote_identifier;
use tokio_postgres::types::Type;

/// Schema used when a relation name is given without one.
pub const DEFAULT_SCHEMA: &str = "public";

/// Fully qualified PostgreSQL table name with schema and table components.
///
/// Represents a complete table identifier that includes both schema and table name,
/// providing methods for proper SQL identifier quoting and formatting.
#[derive(Debug, Clone, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct TableName {
    /// The schema name containing the table
    pub schema: String,
    /// The name of the table within the schema
    pub name: String,
}

impl TableName {
    /// Creates a new [`TableName`] with the given schema and table name.
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> TableName {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Creates a new [`TableName`] in the [`DEFAULT_SCHEMA`].
    pub fn in_default_schema(name: impl Into<String>) -> TableName {
        Self::new(DEFAULT_SCHEMA, name)
    }

    /// Returns the table name as a properly quoted PostgreSQL identifier.
    ///
    /// Escapes both schema and table names according to PostgreSQL identifier
    /// quoting rules to handle special characters and reserved keywords safely.
    pub fn as_quoted_identifier(&self) -> String {
        let quoted_schema = quote_identifier(&self.schema);
        let quoted_name = quote_identifier(&self.name);

        format!("{quoted_schema}.{quoted_name}")
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("{0}.{1}", self.schema, self.name))
    }
}

/// Error returned when parsing a [`TableName`] from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTableNameError(String);

impl fmt::Display for ParseTableNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid table name '{}'", self.0)
    }
}

impl std::error::Error for ParseTableNameError {}

impl FromStr for TableName {
    type Err = ParseTableNameError;

    /// Parses `schema.name` or `name`, the latter landing in [`DEFAULT_SCHEMA`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('.');
        let (schema, name) = match (parts.next(), parts.next(), parts.next()) {
            (Some(name), None, None) => (DEFAULT_SCHEMA, name),
            (Some(schema), Some(name), None) => (schema, name),
            _ => return Err(ParseTableNameError(s.to_string())),
        };

        if schema.is_empty() || name.is_empty() {
            return Err(ParseTableNameError(s.to_string()));
        }

        Ok(TableName::new(schema, name))
    }
}

/// PostgreSQL type modifier for specifying type-specific attributes.
///
/// Used to store additional type information such as varchar length or numeric precision.
type TypeModifier = i32;

/// Schema metadata for a single PostgreSQL table column.
///
/// Contains complete column information including name, data type, type modifier,
/// nullability constraint, primary key membership and whether the value is generated
/// by the database.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ColumnSchema {
    /// The name of the column
    pub name: String,
    /// The PostgreSQL data type of the column
    pub typ: Type,
    /// Type-specific modifier value (e.g., length for varchar)
    pub modifier: TypeModifier,
    /// Whether the column can contain NULL values
    pub nullable: bool,
    /// One-based position of the column in the primary key, if it is part of it
    pub primary_key_position: Option<i32>,
    /// Whether the column is filled by a sequence default or is an identity column
    pub generated: bool,
    /// Whether the column is an `generated always as identity` column
    pub identity_always: bool,
}

impl ColumnSchema {
    /// Creates a new [`ColumnSchema`] with the specified metadata.
    pub fn new(
        name: String,
        typ: Type,
        modifier: TypeModifier,
        nullable: bool,
        primary_key_position: Option<i32>,
    ) -> ColumnSchema {
        Self {
            name,
            typ,
            modifier,
            nullable,
            primary_key_position,
            generated: false,
            identity_always: false,
        }
    }

    /// Marks the column as generated by the database.
    pub fn with_generated(mut self, generated: bool, identity_always: bool) -> ColumnSchema {
        self.generated = generated;
        self.identity_always = identity_always;
        self
    }

    /// Returns whether the column is part of the primary key.
    pub fn primary_key(&self) -> bool {
        self.primary_key_position.is_some()
    }

    /// Returns the column name as a quoted identifier.
    pub fn quoted_name(&self) -> String {
        quote_identifier(&self.name).into_owned()
    }
}

/// Complete schema metadata for a PostgreSQL table.
///
/// Contains the table name along with the schemas of all columns in the table in their
/// ordinal order.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TableSchema {
    /// The fully qualified name of the table
    pub name: TableName,
    /// The schemas of all columns in the table
    pub column_schemas: Vec<ColumnSchema>,
}

impl TableSchema {
    /// Creates a new [`TableSchema`] with the given components.
    pub fn new(name: TableName, column_schemas: Vec<ColumnSchema>) -> Self {
        Self {
            name,
            column_schemas,
        }
    }

    /// Returns whether the table has primary key columns.
    pub fn has_primary_keys(&self) -> bool {
        self.column_schemas.iter().any(|cs| cs.primary_key())
    }

    /// Returns the primary key columns ordered by their position in the key.
    pub fn primary_key_columns(&self) -> Vec<&ColumnSchema> {
        let mut columns = self
            .column_schemas
            .iter()
            .filter(|cs| cs.primary_key())
            .collect::<Vec<_>>();
        columns.sort_by_key(|cs| cs.primary_key_position);

        columns
    }

    /// Looks up a column by name.
    ///
    /// An exact match wins, otherwise the first column whose name matches ignoring ASCII case
    /// is returned.
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.column_schemas
            .iter()
            .find(|cs| cs.name == name)
            .or_else(|| {
                self.column_schemas
                    .iter()
                    .find(|cs| cs.name.eq_ignore_ascii_case(name))
            })
    }
}
