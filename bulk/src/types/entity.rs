use postgres::schema::TableName;

use crate::mapping::ColumnMapping;
use crate::types::Row;

/// A typed record with a declared destination relation.
///
/// Implementors describe where they are stored and which of their fields go to which
/// column, so the entity operations of [`crate::operations::BulkEngine`] need neither a table
/// name nor explicit mappings.
pub trait BulkEntity: Row {
    /// Returns the relation the entity is stored in.
    fn table_name() -> TableName;

    /// Returns the field to column associations of the entity.
    fn column_mappings() -> Vec<ColumnMapping>;
}
