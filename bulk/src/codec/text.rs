use bytes::{BufMut, BytesMut};
use chrono::{Datelike, NaiveDate, NaiveTime};
use tokio_postgres::types::Type;

use crate::conversions::hex::to_bytea_hex;
use crate::types::Cell;

/// Marker of a null field.
const NULL: &[u8] = b"\\N";

/// Writes one row in the text COPY format: tab separated fields ending with a newline.
pub(super) fn write_row(buf: &mut BytesMut, cells: &[(Cell, &Type)]) {
    for (index, (cell, _)) in cells.iter().enumerate() {
        if index > 0 {
            buf.put_u8(b'\t');
        }
        write_cell(buf, cell);
    }
    buf.put_u8(b'\n');
}

fn write_cell(buf: &mut BytesMut, cell: &Cell) {
    match cell {
        Cell::Null => buf.put_slice(NULL),
        Cell::Bool(value) => buf.put_u8(if *value { b't' } else { b'f' }),
        Cell::I16(value) => buf.put_slice(value.to_string().as_bytes()),
        Cell::I32(value) => buf.put_slice(value.to_string().as_bytes()),
        Cell::I64(value) => buf.put_slice(value.to_string().as_bytes()),
        Cell::U32(value) => buf.put_slice(value.to_string().as_bytes()),
        Cell::F32(value) => write_float(buf, f64::from(*value), value.to_string()),
        Cell::F64(value) => write_float(buf, *value, value.to_string()),
        Cell::Numeric(value) => buf.put_slice(value.to_string().as_bytes()),
        Cell::String(value) => write_escaped(buf, value),
        Cell::Bytes(value) => write_escaped(buf, &to_bytea_hex(value)),
        Cell::Date(value) => write_datetime(buf, *value, None, ""),
        Cell::Time(value) => write_time(buf, *value),
        Cell::Timestamp(value) => write_datetime(buf, value.date(), Some(value.time()), ""),
        Cell::TimestampTz(value) => {
            let value = value.naive_utc();
            write_datetime(buf, value.date(), Some(value.time()), "+00");
        }
        Cell::Uuid(value) => buf.put_slice(value.to_string().as_bytes()),
        Cell::Json(value) => write_escaped(buf, &value.to_string()),
    }
}

/// Writes a date, optionally followed by a time and a zone offset.
///
/// Postgres reads years before 1 AD as a positive year with a trailing ` BC`, so year 0 is
/// written as `0001 ... BC`.
fn write_datetime(buf: &mut BytesMut, date: NaiveDate, time: Option<NaiveTime>, offset: &str) {
    let (is_common_era, year) = date.year_ce();
    buf.put_slice(format!("{year:04}-{:02}-{:02}", date.month(), date.day()).as_bytes());

    if let Some(time) = time {
        buf.put_u8(b' ');
        write_time(buf, time);
        buf.put_slice(offset.as_bytes());
    }

    if !is_common_era {
        buf.put_slice(b" BC");
    }
}

fn write_time(buf: &mut BytesMut, time: NaiveTime) {
    buf.put_slice(time.format("%H:%M:%S%.f").to_string().as_bytes());
}

/// Writes a float, spelling out the special values the way Postgres parses them.
fn write_float(buf: &mut BytesMut, value: f64, rendered: String) {
    if value.is_nan() {
        buf.put_slice(b"NaN");
    } else if value == f64::INFINITY {
        buf.put_slice(b"Infinity");
    } else if value == f64::NEG_INFINITY {
        buf.put_slice(b"-Infinity");
    } else {
        buf.put_slice(rendered.as_bytes());
    }
}

/// Writes text escaping the characters with a meaning in the COPY text format.
fn write_escaped(buf: &mut BytesMut, value: &str) {
    for byte in value.bytes() {
        match byte {
            b'\\' => buf.put_slice(b"\\\\"),
            b'\t' => buf.put_slice(b"\\t"),
            b'\n' => buf.put_slice(b"\\n"),
            b'\r' => buf.put_slice(b"\\r"),
            other => buf.put_u8(other),
        }
    }
}
