use postgres::schema::TableName;

use crate::bail;
use crate::error::{BulkResult, ErrorKind};
use crate::mapping::ColumnMapping;
use crate::types::{BulkEntity, Cell, Row};

/// A row of the table described by [`crate::test_utils::schema::customers_schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub id: Option<i64>,
    pub name: String,
    pub email: Option<String>,
}

impl Customer {
    /// Creates a customer without an identity.
    pub fn new(name: impl Into<String>, email: Option<&str>) -> Self {
        Self {
            id: None,
            name: name.into(),
            email: email.map(str::to_string),
        }
    }
}

impl Row for Customer {
    fn field_names(&self) -> Vec<String> {
        vec!["id".to_string(), "name".to_string(), "email".to_string()]
    }

    fn value(&self, field: &str) -> Option<Cell> {
        match field {
            "id" => Some(self.id.map(Cell::I64).unwrap_or(Cell::Null)),
            "name" => Some(Cell::String(self.name.clone())),
            "email" => Some(
                self.email
                    .clone()
                    .map(Cell::String)
                    .unwrap_or(Cell::Null),
            ),
            _ => None,
        }
    }

    fn set_value(&mut self, field: &str, value: Cell) -> BulkResult<()> {
        match (field, value) {
            ("id", Cell::I64(id)) => self.id = Some(id),
            ("id", Cell::Null) => self.id = None,
            (field, value) => bail!(
                ErrorKind::InvalidInput,
                "Customer field cannot be set",
                format!("Field '{field}' cannot hold a {} value", value.kind_name())
            ),
        }

        Ok(())
    }
}

impl BulkEntity for Customer {
    fn table_name() -> TableName {
        TableName::new("public", "customers")
    }

    fn column_mappings() -> Vec<ColumnMapping> {
        vec![
            ColumnMapping::new("id", "id"),
            ColumnMapping::new("name", "name"),
            ColumnMapping::new("email", "email"),
        ]
    }
}
