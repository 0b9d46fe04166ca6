use bytes::{BufMut, BytesMut};
use postgres::types::is_text_type;
use tokio_postgres::types::{IsNull, Kind, ToSql, Type};

use crate::bail;
use crate::bulk_error;
use crate::error::{BulkResult, ErrorKind};
use crate::types::Cell;

/// Signature opening every binary COPY stream.
const SIGNATURE: &[u8] = b"PGCOPY\n\xff\r\n\0";

/// Writes the signature, the flags field and an empty header extension.
pub(super) fn write_header(buf: &mut BytesMut) {
    buf.put_slice(SIGNATURE);
    buf.put_i32(0);
    buf.put_i32(0);
}

/// Writes the end of data marker.
pub(super) fn write_trailer(buf: &mut BytesMut) {
    buf.put_i16(-1);
}

/// Writes one tuple: the field count, then each field as its length followed by the binary
/// representation of the value in the column type.
pub(super) fn write_row(buf: &mut BytesMut, cells: &[(Cell, &Type)]) -> BulkResult<()> {
    let Ok(field_count) = i16::try_from(cells.len()) else {
        bail!(
            ErrorKind::InvalidInput,
            "Too many columns for a binary copy",
            format!("A tuple holds at most {} fields, got {}", i16::MAX, cells.len())
        );
    };
    buf.put_i16(field_count);

    for (cell, typ) in cells {
        write_field(buf, cell, typ)?;
    }

    Ok(())
}

/// Returns whether values of `typ` can be written in the binary copy format.
///
/// Text and enum columns take the raw string. Every other type needs a cell variant of its own,
/// the textual fallback other types coerce into is only understood by the text format.
pub(super) fn has_binary_representation(typ: &Type) -> bool {
    is_text_type(typ)
        || matches!(typ.kind(), Kind::Enum(_))
        || matches!(
            *typ,
            Type::BOOL
                | Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::OID
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::NUMERIC
                | Type::BYTEA
                | Type::DATE
                | Type::TIME
                | Type::TIMESTAMP
                | Type::TIMESTAMPTZ
                | Type::UUID
                | Type::JSON
                | Type::JSONB
        )
}

fn write_field(buf: &mut BytesMut, cell: &Cell, typ: &Type) -> BulkResult<()> {
    if let Cell::String(_) = cell
        && !is_text_type(typ)
        && !matches!(typ.kind(), Kind::Enum(_))
    {
        bail!(
            ErrorKind::ConversionError,
            "Column type has no binary representation",
            format!("Values of type {typ} cannot be written in the binary copy format")
        );
    }

    let length_position = buf.len();
    buf.put_i32(0);

    let is_null = cell.to_sql_checked(typ, buf).map_err(|err| {
        bulk_error!(
            ErrorKind::ConversionError,
            "Binary encoding failed",
            format!("A {} value could not be encoded as {typ}: {err}", cell.kind_name())
        )
    })?;

    let length = match is_null {
        IsNull::Yes => {
            buf.truncate(length_position + 4);
            -1
        }
        IsNull::No => {
            let length = buf.len() - length_position - 4;
            let Ok(length) = i32::try_from(length) else {
                bail!(
                    ErrorKind::InvalidInput,
                    "Field too large for a binary copy",
                    format!("A {typ} value of {length} bytes exceeds the field size limit")
                );
            };
            length
        }
    };
    buf[length_position..length_position + 4].copy_from_slice(&length.to_be_bytes());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversions::numeric::PgNumeric;
    use byteorder::{BigEndian, ReadBytesExt};
    use std::io::{Cursor, Read};
    use uuid::Uuid;

    fn fields(buf: &BytesMut) -> Vec<Option<Vec<u8>>> {
        let mut reader = Cursor::new(buf.as_ref());
        let count = reader.read_i16::<BigEndian>().unwrap();

        (0..count)
            .map(|_| {
                let length = reader.read_i32::<BigEndian>().unwrap();
                if length < 0 {
                    return None;
                }
                let mut value = vec![0; length as usize];
                reader.read_exact(&mut value).unwrap();
                Some(value)
            })
            .collect()
    }

    #[test]
    fn header_and_trailer_frame_the_stream() {
        let mut buf = BytesMut::new();
        write_header(&mut buf);
        write_trailer(&mut buf);

        assert_eq!(&buf[..11], b"PGCOPY\n\xff\r\n\0");
        assert_eq!(&buf[11..], &[0, 0, 0, 0, 0, 0, 0, 0, 0xff, 0xff]);
    }

    #[test]
    fn fields_carry_their_length_and_null_marker() {
        let mut buf = BytesMut::new();
        let uuid = Uuid::from_u128(7);
        write_row(
            &mut buf,
            &[
                (Cell::I32(258), &Type::INT4),
                (Cell::Null, &Type::TEXT),
                (Cell::from("héllo"), &Type::TEXT),
                (Cell::Uuid(uuid), &Type::UUID),
            ],
        )
        .unwrap();

        let fields = fields(&buf);
        assert_eq!(fields[0], Some(vec![0, 0, 1, 2]));
        assert_eq!(fields[1], None);
        assert_eq!(fields[2], Some("héllo".as_bytes().to_vec()));
        assert_eq!(fields[3], Some(uuid.as_bytes().to_vec()));
    }

    #[test]
    fn numeric_uses_the_base_10000_layout() {
        let mut buf = BytesMut::new();
        let numeric = "1.5".parse::<PgNumeric>().unwrap();
        write_row(&mut buf, &[(Cell::Numeric(numeric), &Type::NUMERIC)]).unwrap();

        let fields = fields(&buf);
        assert_eq!(
            fields[0],
            Some(vec![0, 2, 0, 0, 0, 0, 0, 1, 0, 1, 0x13, 0x88])
        );
    }

    #[test]
    fn strings_need_a_textual_column() {
        let mut buf = BytesMut::new();

        let err = write_row(&mut buf, &[(Cell::from("1 day"), &Type::INTERVAL)]).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConversionError);
    }

    #[test]
    fn only_types_with_a_cell_variant_have_a_binary_representation() {
        assert!(has_binary_representation(&Type::VARCHAR));
        assert!(has_binary_representation(&Type::JSONB));
        assert!(has_binary_representation(&Type::TIMESTAMPTZ));
        assert!(!has_binary_representation(&Type::INTERVAL));
        assert!(!has_binary_representation(&Type::INET));
        assert!(!has_binary_representation(&Type::INT4_ARRAY));
    }

    #[test]
    fn mismatched_variants_are_rejected() {
        let mut buf = BytesMut::new();

        let err = write_row(&mut buf, &[(Cell::Bool(true), &Type::INT4)]).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConversionError);
    }
}
