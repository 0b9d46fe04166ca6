use std::sync::Arc;

use crate::bail;
use crate::error::{BulkResult, ErrorKind};
use crate::types::{Cell, Row};

/// A materialized table of rows sharing one set of columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    columns: Arc<Vec<String>>,
    rows: Vec<DataRow>,
}

/// A row of a [`DataTable`].
#[derive(Debug, Clone, PartialEq)]
pub struct DataRow {
    columns: Arc<Vec<String>>,
    values: Vec<Cell>,
}

impl DataTable {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: Arc::new(columns.into_iter().map(Into::into).collect()),
            rows: Vec::new(),
        }
    }

    /// Appends a row, which must hold exactly one value per column.
    pub fn add_row(&mut self, values: Vec<Cell>) -> BulkResult<()> {
        if values.len() != self.columns.len() {
            bail!(
                ErrorKind::InvalidInput,
                "Row does not match the table columns",
                format!(
                    "The table has {} columns but the row has {} values",
                    self.columns.len(),
                    values.len()
                )
            );
        }

        self.rows.push(DataRow {
            columns: self.columns.clone(),
            values,
        });

        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[DataRow] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [DataRow] {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl DataRow {
    pub fn values(&self) -> &[Cell] {
        &self.values
    }

    fn position(&self, field: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == field)
    }
}

impl Row for DataRow {
    fn field_names(&self) -> Vec<String> {
        self.columns.as_ref().clone()
    }

    fn value(&self, field: &str) -> Option<Cell> {
        self.position(field).map(|index| self.values[index].clone())
    }

    fn set_value(&mut self, field: &str, value: Cell) -> BulkResult<()> {
        let Some(index) = self.position(field) else {
            bail!(
                ErrorKind::InvalidInput,
                "Column not present in data table",
                format!("The data table has no column '{field}' to write the value to")
            );
        };

        self.values[index] = value;

        Ok(())
    }
}
