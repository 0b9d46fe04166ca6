//! Encoding of rows into `COPY ... FROM STDIN` payloads.

mod binary;
mod text;

use bytes::{Bytes, BytesMut};
use pg_escape::quote_identifier;
use postgres::schema::{ColumnSchema, TableName};
use tokio_postgres::types::Type;

use crate::backend::CopyPayload;
use crate::bail;
use crate::bulk_error;
use crate::error::{BulkResult, ErrorKind};
use crate::mapping::ResolvedMapping;
use crate::types::{Cell, Row};

/// Size after which the encoded rows are cut into a new chunk.
const CHUNK_SIZE: usize = 1024 * 1024;

/// Type of the ordinal column.
static ORDINAL_TYPE: Type = Type::INT8;

/// Wire format of a COPY payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopyFormat {
    #[default]
    Text,
    Binary,
}

impl CopyFormat {
    fn as_sql(&self) -> &'static str {
        match self {
            CopyFormat::Text => "text",
            CopyFormat::Binary => "binary",
        }
    }

    /// Checks that every column can be loaded in this format.
    ///
    /// The text format leaves parsing to the backend and takes any column. The binary format
    /// fails with [`ErrorKind::SchemaMismatch`] on a column type it has no encoding for.
    pub(crate) fn check_columns<'c>(
        self,
        table: &TableName,
        columns: impl IntoIterator<Item = &'c ColumnSchema>,
    ) -> BulkResult<()> {
        if self == CopyFormat::Text {
            return Ok(());
        }

        for column in columns {
            if !binary::has_binary_representation(&column.typ) {
                bail!(
                    ErrorKind::SchemaMismatch,
                    "Column type has no binary representation",
                    format!(
                        "Column '{}' of table {table} has type {} which the binary copy format cannot encode, use the text format",
                        column.name, column.typ
                    )
                );
            }
        }

        Ok(())
    }
}

/// A loaded column together with the row field its values come from.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CopyColumn {
    pub(crate) source_field: String,
    pub(crate) column: ColumnSchema,
}

impl From<&ResolvedMapping> for CopyColumn {
    fn from(mapping: &ResolvedMapping) -> Self {
        CopyColumn {
            source_field: mapping.source_field.clone(),
            column: mapping.column.clone(),
        }
    }
}

/// Describes one COPY into a relation: the columns, their order and the wire format.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CopyPlan {
    /// Quoted relation the rows are copied into.
    pub(crate) target: String,
    pub(crate) columns: Vec<CopyColumn>,
    /// Trailing `bigint` column filled with the position of each row in the source.
    pub(crate) ordinal_column: Option<String>,
    pub(crate) format: CopyFormat,
}

impl CopyPlan {
    pub(crate) fn new(target: String, columns: Vec<CopyColumn>, format: CopyFormat) -> Self {
        Self {
            target,
            columns,
            ordinal_column: None,
            format,
        }
    }

    pub(crate) fn with_ordinal_column(mut self, name: impl Into<String>) -> Self {
        self.ordinal_column = Some(name.into());
        self
    }

    /// Returns the number of fields written per row.
    pub(crate) fn field_count(&self) -> usize {
        self.columns.len() + usize::from(self.ordinal_column.is_some())
    }

    pub(crate) fn copy_statement(&self) -> String {
        let mut column_list = self
            .columns
            .iter()
            .map(|column| column.column.quoted_name())
            .collect::<Vec<_>>();
        if let Some(ordinal_column) = &self.ordinal_column {
            column_list.push(quote_identifier(ordinal_column).into_owned());
        }

        format!(
            "copy {} ({}) from stdin with (format {})",
            self.target,
            column_list.join(", "),
            self.format.as_sql()
        )
    }

    /// Encodes rows into a payload.
    ///
    /// Every value is coerced to the type of its column first. The ordinal of the first row is
    /// `first_ordinal`, following rows count up from it.
    pub(crate) fn encode<'r>(
        &self,
        first_ordinal: u64,
        rows: impl Iterator<Item = &'r dyn Row>,
    ) -> BulkResult<CopyPayload> {
        let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
        let mut chunks: Vec<Bytes> = vec![];
        let mut row_count = 0u64;
        let mut cells: Vec<(Cell, &Type)> = Vec::with_capacity(self.field_count());

        if self.format == CopyFormat::Binary {
            binary::write_header(&mut buf);
        }

        for (offset, row) in rows.enumerate() {
            let ordinal = first_ordinal + offset as u64;
            cells.clear();

            for copy_column in &self.columns {
                let Some(value) = row.value(&copy_column.source_field) else {
                    return Err(bulk_error!(
                        ErrorKind::InvalidInput,
                        "Row is missing a mapped field",
                        format!(
                            "Row {ordinal} has no field '{}' for column '{}'",
                            copy_column.source_field, copy_column.column.name
                        )
                    ));
                };

                let cell = value.coerce_to(&copy_column.column.typ).map_err(|err| {
                    bulk_error!(
                        ErrorKind::ConversionError,
                        "Row value cannot be loaded into its column",
                        format!(
                            "Field '{}' of row {ordinal} cannot be loaded into column '{}'",
                            copy_column.source_field, copy_column.column.name
                        ),
                        source: err
                    )
                })?;
                cells.push((cell, &copy_column.column.typ));
            }

            if self.ordinal_column.is_some() {
                // Source positions never exceed the range of a bigint.
                cells.push((Cell::I64(ordinal as i64), &ORDINAL_TYPE));
            }

            match self.format {
                CopyFormat::Text => text::write_row(&mut buf, &cells),
                CopyFormat::Binary => binary::write_row(&mut buf, &cells)?,
            }
            row_count += 1;

            if buf.len() >= CHUNK_SIZE {
                chunks.push(buf.split().freeze());
            }
        }

        if self.format == CopyFormat::Binary {
            binary::write_trailer(&mut buf);
        }

        if !buf.is_empty() {
            chunks.push(buf.freeze());
        }

        Ok(CopyPayload {
            chunks,
            rows: row_count,
        })
    }
}
