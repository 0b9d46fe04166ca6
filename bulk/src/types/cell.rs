use std::error::Error;

use bigdecimal::BigDecimal;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use postgres::types::{is_decimal_type, is_integer_type, is_text_type};
use tokio_postgres::types::{IsNull, Kind, ToSql, Type, to_sql_checked};
use uuid::Uuid;

use crate::bulk_error;
use crate::conversions::bool::parse_bool;
use crate::conversions::hex::parse_bytea_hex;
use crate::conversions::numeric::PgNumeric;
use crate::conversions::temporal::{parse_date, parse_time, parse_timestamp, parse_timestamptz};
use crate::error::{BulkError, BulkResult, ErrorKind};

/// A single typed value of a row.
///
/// Values are not bound to a column type until they are loaded: [`Cell::coerce_to`] converts a
/// cell into the representation expected by the destination column, so an [`Cell::I64`] can be
/// loaded into an `int4` column and a [`Cell::String`] into a `uuid` or `date` column.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    U32(u32),
    F32(f32),
    F64(f64),
    Numeric(PgNumeric),
    String(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Uuid(Uuid),
    Json(serde_json::Value),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Returns the name of the variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Cell::Null => "null",
            Cell::Bool(_) => "bool",
            Cell::I16(_) => "i16",
            Cell::I32(_) => "i32",
            Cell::I64(_) => "i64",
            Cell::U32(_) => "u32",
            Cell::F32(_) => "f32",
            Cell::F64(_) => "f64",
            Cell::Numeric(_) => "numeric",
            Cell::String(_) => "string",
            Cell::Bytes(_) => "bytes",
            Cell::Date(_) => "date",
            Cell::Time(_) => "time",
            Cell::Timestamp(_) => "timestamp",
            Cell::TimestampTz(_) => "timestamptz",
            Cell::Uuid(_) => "uuid",
            Cell::Json(_) => "json",
        }
    }

    /// Returns whether values of this kind can ever be loaded into a column of type `typ`.
    ///
    /// This is a check on the kind only. Strings are parsed by the column type, so they pass
    /// here and `"abc"` only fails later during coercion into an `int4` column. Numbers never
    /// load into text columns, which catches swapped source fields in mappings.
    pub fn is_compatible_with(&self, typ: &Type) -> bool {
        if matches!(typ.kind(), Kind::Enum(_)) {
            return matches!(self, Cell::Null | Cell::String(_));
        }

        match self {
            Cell::Null => true,
            Cell::Bool(_) => *typ == Type::BOOL || is_json_type(typ),
            Cell::I16(_) | Cell::I32(_) | Cell::I64(_) | Cell::U32(_) => {
                is_integer_type(typ) || is_decimal_type(typ) || is_json_type(typ)
            }
            Cell::F32(_) | Cell::F64(_) | Cell::Numeric(_) => {
                is_decimal_type(typ) || is_json_type(typ)
            }
            Cell::String(_) => true,
            Cell::Bytes(_) => *typ == Type::BYTEA,
            Cell::Date(_) => matches!(*typ, Type::DATE | Type::TIMESTAMP | Type::TIMESTAMPTZ),
            Cell::Time(_) => *typ == Type::TIME,
            Cell::Timestamp(_) | Cell::TimestampTz(_) => {
                matches!(*typ, Type::TIMESTAMP | Type::TIMESTAMPTZ | Type::DATE)
            }
            Cell::Uuid(_) => *typ == Type::UUID || is_text_type(typ),
            Cell::Json(_) => is_json_type(typ),
        }
    }

    /// Converts the cell into the variant matching the column type `typ`.
    ///
    /// Integer narrowing is range checked and strings are parsed. Types without a dedicated
    /// variant, enums included, keep the textual value which the backend parses itself.
    pub fn coerce_to(&self, typ: &Type) -> BulkResult<Cell> {
        if self.is_null() {
            return Ok(Cell::Null);
        }

        if !self.is_compatible_with(typ) {
            return Err(incompatible(self, typ));
        }

        let cell = match *typ {
            Type::BOOL => match self {
                Cell::Bool(value) => Cell::Bool(*value),
                Cell::String(value) => Cell::Bool(parse_bool(value)?),
                _ => return Err(incompatible(self, typ)),
            },
            Type::INT2 => Cell::I16(self.to_integer(typ)?),
            Type::INT4 => Cell::I32(self.to_integer(typ)?),
            Type::INT8 => Cell::I64(self.to_integer(typ)?),
            Type::OID => Cell::U32(self.to_integer(typ)?),
            Type::FLOAT4 => Cell::F32(self.to_f64()? as f32),
            Type::FLOAT8 => Cell::F64(self.to_f64()?),
            Type::NUMERIC => Cell::Numeric(self.to_numeric()?),
            Type::BYTEA => match self {
                Cell::Bytes(value) => Cell::Bytes(value.clone()),
                Cell::String(value) => Cell::Bytes(parse_bytea_hex(value)?),
                _ => return Err(incompatible(self, typ)),
            },
            Type::DATE => match self {
                Cell::Date(value) => Cell::Date(*value),
                Cell::Timestamp(value) => Cell::Date(value.date()),
                Cell::TimestampTz(value) => Cell::Date(value.date_naive()),
                Cell::String(value) => Cell::Date(parse_date(value)?),
                _ => return Err(incompatible(self, typ)),
            },
            Type::TIME => match self {
                Cell::Time(value) => Cell::Time(*value),
                Cell::String(value) => Cell::Time(parse_time(value)?),
                _ => return Err(incompatible(self, typ)),
            },
            Type::TIMESTAMP => match self {
                Cell::Date(value) => Cell::Timestamp(value.and_time(NaiveTime::MIN)),
                Cell::Timestamp(value) => Cell::Timestamp(*value),
                Cell::TimestampTz(value) => Cell::Timestamp(value.naive_utc()),
                Cell::String(value) => Cell::Timestamp(parse_timestamp(value)?),
                _ => return Err(incompatible(self, typ)),
            },
            Type::TIMESTAMPTZ => match self {
                Cell::Date(value) => Cell::TimestampTz(value.and_time(NaiveTime::MIN).and_utc()),
                Cell::Timestamp(value) => Cell::TimestampTz(value.and_utc()),
                Cell::TimestampTz(value) => Cell::TimestampTz(*value),
                Cell::String(value) => Cell::TimestampTz(parse_timestamptz(value)?),
                _ => return Err(incompatible(self, typ)),
            },
            Type::UUID => match self {
                Cell::Uuid(value) => Cell::Uuid(*value),
                Cell::String(value) => Cell::Uuid(Uuid::parse_str(value.trim())?),
                _ => return Err(incompatible(self, typ)),
            },
            Type::JSON | Type::JSONB => match self {
                Cell::String(value) => Cell::Json(serde_json::from_str(value)?),
                other => Cell::Json(other.to_json()),
            },
            _ => match self {
                Cell::String(value) => Cell::String(value.clone()),
                Cell::Uuid(value) => Cell::String(value.to_string()),
                _ => return Err(incompatible(self, typ)),
            },
        };

        Ok(cell)
    }

    /// Converts the cell into a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;

        match self {
            Cell::Null => Value::Null,
            Cell::Bool(value) => Value::Bool(*value),
            Cell::I16(value) => Value::from(*value),
            Cell::I32(value) => Value::from(*value),
            Cell::I64(value) => Value::from(*value),
            Cell::U32(value) => Value::from(*value),
            Cell::F32(value) => Value::from(*value),
            Cell::F64(value) => Value::from(*value),
            Cell::Numeric(value) => serde_json::from_str(&value.to_string())
                .unwrap_or_else(|_| Value::String(value.to_string())),
            Cell::String(value) => Value::String(value.clone()),
            Cell::Bytes(value) => Value::String(crate::conversions::hex::to_bytea_hex(value)),
            Cell::Date(value) => Value::String(value.to_string()),
            Cell::Time(value) => Value::String(value.to_string()),
            Cell::Timestamp(value) => Value::String(value.to_string()),
            Cell::TimestampTz(value) => Value::String(value.to_rfc3339()),
            Cell::Uuid(value) => Value::String(value.to_string()),
            Cell::Json(value) => value.clone(),
        }
    }

    /// Creates a cell from a JSON value.
    ///
    /// Numbers become integers when they fit in an `i64`, arbitrary precision numerics when they
    /// are larger integers and floats otherwise. Arrays and objects stay JSON.
    pub fn from_json(value: &serde_json::Value) -> Cell {
        use serde_json::Value;

        match value {
            Value::Null => Cell::Null,
            Value::Bool(value) => Cell::Bool(*value),
            Value::Number(number) => {
                if let Some(value) = number.as_i64() {
                    Cell::I64(value)
                } else if let Some(value) = number.as_u64() {
                    Cell::Numeric(PgNumeric::Value(BigDecimal::from(value)))
                } else {
                    Cell::F64(number.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(value) => Cell::String(value.clone()),
            Value::Array(_) | Value::Object(_) => Cell::Json(value.clone()),
        }
    }

    fn to_integer<T>(&self, typ: &Type) -> BulkResult<T>
    where
        T: TryFrom<i64> + TryFrom<u32> + std::str::FromStr,
    {
        let out_of_range = || {
            bulk_error!(
                ErrorKind::ConversionError,
                "Integer value out of range",
                format!("{self:?} does not fit into a column of type {typ}")
            )
        };

        match self {
            Cell::I16(value) => {
                <T as TryFrom<i64>>::try_from(i64::from(*value)).map_err(|_| out_of_range())
            }
            Cell::I32(value) => {
                <T as TryFrom<i64>>::try_from(i64::from(*value)).map_err(|_| out_of_range())
            }
            Cell::I64(value) => <T as TryFrom<i64>>::try_from(*value).map_err(|_| out_of_range()),
            Cell::U32(value) => <T as TryFrom<u32>>::try_from(*value).map_err(|_| out_of_range()),
            Cell::String(value) => value.trim().parse::<T>().map_err(|_| {
                bulk_error!(
                    ErrorKind::ConversionError,
                    "Integer parsing failed",
                    format!("'{value}' is not a valid value for a column of type {typ}")
                )
            }),
            _ => Err(incompatible(self, typ)),
        }
    }

    fn to_f64(&self) -> BulkResult<f64> {
        let value = match self {
            Cell::I16(value) => f64::from(*value),
            Cell::I32(value) => f64::from(*value),
            Cell::I64(value) => *value as f64,
            Cell::U32(value) => f64::from(*value),
            Cell::F32(value) => f64::from(*value),
            Cell::F64(value) => *value,
            Cell::Numeric(value) => value.to_string().parse::<f64>()?,
            Cell::String(value) => value.trim().parse::<f64>()?,
            _ => return Err(incompatible(self, &Type::FLOAT8)),
        };

        Ok(value)
    }

    fn to_numeric(&self) -> BulkResult<PgNumeric> {
        let value = match self {
            Cell::I16(value) => PgNumeric::from(i64::from(*value)),
            Cell::I32(value) => PgNumeric::from(i64::from(*value)),
            Cell::I64(value) => PgNumeric::from(*value),
            Cell::U32(value) => PgNumeric::from(i64::from(*value)),
            Cell::F32(value) => PgNumeric::from_f64(f64::from(*value)),
            Cell::F64(value) => PgNumeric::from_f64(*value),
            Cell::Numeric(value) => value.clone(),
            Cell::String(value) => value.trim().parse::<PgNumeric>()?,
            _ => return Err(incompatible(self, &Type::NUMERIC)),
        };

        Ok(value)
    }
}

fn incompatible(cell: &Cell, typ: &Type) -> BulkError {
    bulk_error!(
        ErrorKind::ConversionError,
        "Value is incompatible with the column type",
        format!("a {} value cannot be loaded into a column of type {typ}", cell.kind_name())
    )
}

fn is_json_type(typ: &Type) -> bool {
    matches!(*typ, Type::JSON | Type::JSONB)
}

/// Encodes the cell in the binary format of the column type.
///
/// Cells must be coerced to the column type first, the variant then dictates the encoding.
impl ToSql for Cell {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            Cell::Null => Ok(IsNull::Yes),
            Cell::Bool(value) => value.to_sql_checked(ty, out),
            Cell::I16(value) => value.to_sql_checked(ty, out),
            Cell::I32(value) => value.to_sql_checked(ty, out),
            Cell::I64(value) => value.to_sql_checked(ty, out),
            Cell::U32(value) => value.to_sql_checked(ty, out),
            Cell::F32(value) => value.to_sql_checked(ty, out),
            Cell::F64(value) => value.to_sql_checked(ty, out),
            Cell::Numeric(value) => value.to_sql_checked(ty, out),
            // The binary representation of text-like and enum values is the raw UTF-8.
            Cell::String(value) => {
                out.extend_from_slice(value.as_bytes());
                Ok(IsNull::No)
            }
            Cell::Bytes(value) => value.to_sql_checked(ty, out),
            Cell::Date(value) => value.to_sql_checked(ty, out),
            Cell::Time(value) => value.to_sql_checked(ty, out),
            Cell::Timestamp(value) => value.to_sql_checked(ty, out),
            Cell::TimestampTz(value) => value.to_sql_checked(ty, out),
            Cell::Uuid(value) => value.to_sql_checked(ty, out),
            Cell::Json(value) => value.to_sql_checked(ty, out),
        }
    }

    fn accepts(_: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Bool(value)
    }
}

impl From<i16> for Cell {
    fn from(value: i16) -> Self {
        Cell::I16(value)
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Self {
        Cell::I32(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::I64(value)
    }
}

impl From<u32> for Cell {
    fn from(value: u32) -> Self {
        Cell::U32(value)
    }
}

impl From<f32> for Cell {
    fn from(value: f32) -> Self {
        Cell::F32(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::F64(value)
    }
}

impl From<PgNumeric> for Cell {
    fn from(value: PgNumeric) -> Self {
        Cell::Numeric(value)
    }
}

impl From<BigDecimal> for Cell {
    fn from(value: BigDecimal) -> Self {
        Cell::Numeric(PgNumeric::Value(value))
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::String(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::String(value.to_string())
    }
}

impl From<Vec<u8>> for Cell {
    fn from(value: Vec<u8>) -> Self {
        Cell::Bytes(value)
    }
}

impl From<NaiveDate> for Cell {
    fn from(value: NaiveDate) -> Self {
        Cell::Date(value)
    }
}

impl From<NaiveTime> for Cell {
    fn from(value: NaiveTime) -> Self {
        Cell::Time(value)
    }
}

impl From<NaiveDateTime> for Cell {
    fn from(value: NaiveDateTime) -> Self {
        Cell::Timestamp(value)
    }
}

impl From<DateTime<Utc>> for Cell {
    fn from(value: DateTime<Utc>) -> Self {
        Cell::TimestampTz(value)
    }
}

impl From<Uuid> for Cell {
    fn from(value: Uuid) -> Self {
        Cell::Uuid(value)
    }
}

impl From<serde_json::Value> for Cell {
    fn from(value: serde_json::Value) -> Self {
        Cell::Json(value)
    }
}

impl<T> From<Option<T>> for Cell
where
    T: Into<Cell>,
{
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_narrowed_with_range_checks() {
        assert_eq!(Cell::I64(7).coerce_to(&Type::INT4).unwrap(), Cell::I32(7));
        assert_eq!(Cell::I32(-3).coerce_to(&Type::INT2).unwrap(), Cell::I16(-3));

        let err = Cell::I64(i64::from(i32::MAX) + 1)
            .coerce_to(&Type::INT4)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConversionError);
    }

    #[test]
    fn strings_are_parsed_into_the_column_type() {
        let uuid = "67e55044-10b1-426f-9247-bb680e5fe0c8";
        assert_eq!(
            Cell::from(uuid).coerce_to(&Type::UUID).unwrap(),
            Cell::Uuid(Uuid::parse_str(uuid).unwrap())
        );
        assert_eq!(
            Cell::from("42").coerce_to(&Type::INT8).unwrap(),
            Cell::I64(42)
        );
        assert_eq!(
            Cell::from("yes").coerce_to(&Type::BOOL).unwrap(),
            Cell::Bool(true)
        );
        assert!(matches!(
            Cell::from("2024-05-01").coerce_to(&Type::DATE).unwrap(),
            Cell::Date(_)
        ));
        assert!(Cell::from("abc").coerce_to(&Type::INT4).is_err());
    }

    #[test]
    fn integers_never_load_into_text_columns() {
        assert!(!Cell::I32(1).is_compatible_with(&Type::TEXT));
        assert!(!Cell::I64(1).is_compatible_with(&Type::VARCHAR));
        assert!(Cell::from("name").is_compatible_with(&Type::TEXT));
        assert!(Cell::Null.is_compatible_with(&Type::INT4));
    }

    #[test]
    fn numbers_widen_into_decimal_columns() {
        assert_eq!(
            Cell::I32(5).coerce_to(&Type::NUMERIC).unwrap(),
            Cell::Numeric(PgNumeric::from(5))
        );
        assert_eq!(Cell::I32(5).coerce_to(&Type::FLOAT8).unwrap(), Cell::F64(5.0));
        assert_eq!(Cell::F64(1.5).coerce_to(&Type::FLOAT4).unwrap(), Cell::F32(1.5));
    }

    #[test]
    fn json_columns_accept_strings_and_scalars() {
        assert_eq!(
            Cell::from(r#"{"a": 1}"#).coerce_to(&Type::JSONB).unwrap(),
            Cell::Json(serde_json::json!({"a": 1}))
        );
        assert_eq!(
            Cell::I64(3).coerce_to(&Type::JSON).unwrap(),
            Cell::Json(serde_json::json!(3))
        );
    }

    #[test]
    fn json_numbers_become_integers_when_possible() {
        assert_eq!(Cell::from_json(&serde_json::json!(12)), Cell::I64(12));
        assert_eq!(Cell::from_json(&serde_json::json!(1.25)), Cell::F64(1.25));
        assert_eq!(Cell::from_json(&serde_json::json!(null)), Cell::Null);
        assert_eq!(
            Cell::from_json(&serde_json::json!(u64::MAX)),
            Cell::Numeric(PgNumeric::Value(BigDecimal::from(u64::MAX)))
        );
    }

    #[test]
    fn binary_encoding_uses_the_variant() {
        let mut out = BytesMut::new();
        Cell::I32(258).to_sql_checked(&Type::INT4, &mut out).unwrap();
        assert_eq!(out.as_ref(), &[0, 0, 1, 2]);

        let mut out = BytesMut::new();
        let is_null = Cell::Null.to_sql_checked(&Type::TEXT, &mut out).unwrap();
        assert!(matches!(is_null, IsNull::Yes));

        let mut out = BytesMut::new();
        Cell::from("héllo").to_sql_checked(&Type::TEXT, &mut out).unwrap();
        assert_eq!(out.as_ref(), "héllo".as_bytes());
    }
}
