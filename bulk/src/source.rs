//! Normalization of the accepted input shapes into one row sequence.
//!
//! A [`RowSource`] wraps the caller's data without copying it. Before any backend work starts,
//! the source is adapted: empty sources are detected, JSON elements are validated and the row
//! shape used for mapping resolution is collected.

use std::fmt;

use futures::StreamExt;
use futures::stream::{BoxStream, Stream};
use serde_json::Value;
use tracing::debug;

use crate::bulk_error;
use crate::error::{BulkResult, ErrorKind};
use crate::types::{Cell, DataTable, FieldBag, Row};

/// The rows of a bulk operation.
pub enum RowSource<'a> {
    /// Typed records, usually [`crate::types::BulkEntity`] implementors.
    Records(Vec<&'a mut dyn Row>),
    /// Dynamic field bags.
    Bags(&'a mut [FieldBag]),
    /// JSON objects, one per row.
    Json(&'a mut [Value]),
    /// A materialized table.
    Table(&'a mut DataTable),
    /// A forward-only reader, consumed exactly once.
    Reader(BoxStream<'a, BulkResult<FieldBag>>),
    /// Values of a single-column primary key, only accepted by delete operations.
    Keys(Vec<Cell>),
}

impl<'a> RowSource<'a> {
    pub fn records<T: Row>(records: &'a mut [T]) -> Self {
        RowSource::Records(
            records
                .iter_mut()
                .map(|record| record as &mut dyn Row)
                .collect(),
        )
    }

    pub fn bags(bags: &'a mut [FieldBag]) -> Self {
        RowSource::Bags(bags)
    }

    /// Creates a source over JSON values. Every element must be an object.
    pub fn json(values: &'a mut [Value]) -> Self {
        RowSource::Json(values)
    }

    pub fn table(table: &'a mut DataTable) -> Self {
        RowSource::Table(table)
    }

    pub fn reader<S>(stream: S) -> Self
    where
        S: Stream<Item = BulkResult<FieldBag>> + Send + 'a,
    {
        RowSource::Reader(stream.boxed())
    }

    pub fn keys<I, C>(keys: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Cell>,
    {
        RowSource::Keys(keys.into_iter().map(Into::into).collect())
    }

    /// Returns the name of the source shape.
    pub fn shape_name(&self) -> &'static str {
        match self {
            RowSource::Records(_) => "records",
            RowSource::Bags(_) => "bags",
            RowSource::Json(_) => "json",
            RowSource::Table(_) => "table",
            RowSource::Reader(_) => "reader",
            RowSource::Keys(_) => "keys",
        }
    }

    pub fn is_reader(&self) -> bool {
        matches!(self, RowSource::Reader(_))
    }
}

impl fmt::Debug for RowSource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowSource")
            .field("shape", &self.shape_name())
            .finish()
    }
}

/// A field of the row shape together with the first non-null value seen for it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ShapeField {
    pub(crate) name: String,
    pub(crate) sample: Option<Cell>,
}

/// Field names of the rows, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct RowShape {
    fields: Vec<ShapeField>,
}

impl RowShape {
    fn observe(&mut self, row: &dyn Row) {
        for name in row.field_names() {
            let index = match self.fields.iter().position(|field| field.name == name) {
                Some(index) => index,
                None => {
                    self.fields.push(ShapeField {
                        name: name.clone(),
                        sample: None,
                    });
                    self.fields.len() - 1
                }
            };

            let field = &mut self.fields[index];
            if field.sample.is_none() {
                field.sample = row.value(&name).filter(|value| !value.is_null());
            }
        }
    }

    pub(crate) fn fields(&self) -> &[ShapeField] {
        &self.fields
    }

    /// Looks up a field, preferring an exact match over one ignoring ASCII case.
    pub(crate) fn field(&self, name: &str) -> Option<&ShapeField> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .or_else(|| {
                self.fields
                    .iter()
                    .find(|field| field.name.eq_ignore_ascii_case(name))
            })
    }
}

/// Rows of an adapted source.
pub(crate) enum SourceRows<'a> {
    /// Caller-owned rows, which can be visited again to write identities back.
    Borrowed(Vec<&'a mut dyn Row>),
    /// Rows built by the engine, e.g. from primary key values.
    Owned(Vec<FieldBag>),
    /// A reader whose first row was already pulled to learn the row shape.
    Stream {
        first: Option<FieldBag>,
        rest: BoxStream<'a, BulkResult<FieldBag>>,
    },
}

impl SourceRows<'_> {
    /// Returns the number of rows, unknown for readers.
    pub(crate) fn len(&self) -> Option<usize> {
        match self {
            SourceRows::Borrowed(rows) => Some(rows.len()),
            SourceRows::Owned(rows) => Some(rows.len()),
            SourceRows::Stream { .. } => None,
        }
    }
}

/// A non-empty source ready to be loaded.
pub(crate) struct AdaptedSource<'a> {
    pub(crate) rows: SourceRows<'a>,
    pub(crate) shape: RowShape,
}

impl<'a> AdaptedSource<'a> {
    /// Builds single-field rows out of primary key values.
    pub(crate) fn from_keys(field: &str, keys: Vec<Cell>) -> AdaptedSource<'a> {
        let rows = keys
            .into_iter()
            .map(|key| FieldBag::new().with(field, key))
            .collect::<Vec<_>>();

        let mut shape = RowShape::default();
        for row in &rows {
            shape.observe(row);
        }

        AdaptedSource {
            rows: SourceRows::Owned(rows),
            shape,
        }
    }
}

/// Result of adapting a [`RowSource`].
pub(crate) enum Adapted<'a> {
    /// The source holds no rows.
    Empty,
    Rows(AdaptedSource<'a>),
    /// Primary key values, turned into rows once the key column is known.
    Keys(Vec<Cell>),
}

/// Adapts a source without contacting the backend.
///
/// JSON elements that are not objects are rejected with [`ErrorKind::InvalidInput`]. For
/// readers, the first row is pulled to learn the shape and replayed during the load.
pub(crate) async fn adapt(source: RowSource<'_>) -> BulkResult<Adapted<'_>> {
    let rows: Vec<&mut dyn Row> = match source {
        RowSource::Records(records) => records,
        RowSource::Bags(bags) => bags.iter_mut().map(|bag| bag as &mut dyn Row).collect(),
        RowSource::Json(values) => {
            let mut rows: Vec<&mut dyn Row> = Vec::with_capacity(values.len());
            for (index, value) in values.iter_mut().enumerate() {
                match value {
                    Value::Object(object) => rows.push(object),
                    Value::Null => {
                        return Err(bulk_error!(
                            ErrorKind::InvalidInput,
                            "Row source contains a null element",
                            format!("The JSON element at index {index} is null")
                        ));
                    }
                    other => {
                        return Err(bulk_error!(
                            ErrorKind::InvalidInput,
                            "Row source element is not an object",
                            format!(
                                "The JSON element at index {index} is not an object: {other}"
                            )
                        ));
                    }
                }
            }
            rows
        }
        RowSource::Table(table) => table
            .rows_mut()
            .iter_mut()
            .map(|row| row as &mut dyn Row)
            .collect(),
        RowSource::Reader(mut stream) => {
            let first = match stream.next().await {
                None => return Ok(Adapted::Empty),
                Some(first) => first.map_err(|err| {
                    bulk_error!(
                        ErrorKind::InvalidInput,
                        "Row reader failed",
                        source: err
                    )
                })?,
            };

            let mut shape = RowShape::default();
            shape.observe(&first);

            return Ok(Adapted::Rows(AdaptedSource {
                rows: SourceRows::Stream {
                    first: Some(first),
                    rest: stream,
                },
                shape,
            }));
        }
        RowSource::Keys(keys) => {
            if keys.is_empty() {
                return Ok(Adapted::Empty);
            }
            return Ok(Adapted::Keys(keys));
        }
    };

    if rows.is_empty() {
        return Ok(Adapted::Empty);
    }

    let mut shape = RowShape::default();
    for row in &rows {
        shape.observe(&**row);
    }

    debug!(rows = rows.len(), fields = shape.fields().len(), "adapted row source");

    Ok(Adapted::Rows(AdaptedSource {
        rows: SourceRows::Borrowed(rows),
        shape,
    }))
}
