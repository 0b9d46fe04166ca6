use tokio_postgres::types::{Kind, Type};

/// Converts a type oid to a [`Type`] defaulting to an unnamed type in case of failure to
/// look up the type.
pub fn convert_type_oid_to_type(type_oid: u32) -> Type {
    Type::from_oid(type_oid).unwrap_or(Type::new(
        format!("unnamed_type({type_oid})"),
        type_oid,
        Kind::Simple,
        "pg_catalog".to_string(),
    ))
}

/// Returns whether values of the [`Type`] are stored as text.
pub fn is_text_type(typ: &Type) -> bool {
    matches!(
        typ,
        &Type::TEXT | &Type::VARCHAR | &Type::BPCHAR | &Type::NAME | &Type::CHAR | &Type::UNKNOWN
    )
}

/// Returns whether the [`Type`] is an integer type.
pub fn is_integer_type(typ: &Type) -> bool {
    matches!(typ, &Type::INT2 | &Type::INT4 | &Type::INT8 | &Type::OID)
}

/// Returns whether the [`Type`] is a floating point or arbitrary precision type.
pub fn is_decimal_type(typ: &Type) -> bool {
    matches!(typ, &Type::FLOAT4 | &Type::FLOAT8 | &Type::NUMERIC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_oid_becomes_unnamed_type() {
        let typ = convert_type_oid_to_type(999_999);

        assert_eq!(typ.name(), "unnamed_type(999999)");
        assert_eq!(typ.oid(), 999_999);
    }

    #[test]
    fn known_oid_is_resolved() {
        assert_eq!(convert_type_oid_to_type(20), Type::INT8);
        assert!(is_integer_type(&convert_type_oid_to_type(23)));
        assert!(is_text_type(&convert_type_oid_to_type(25)));
        assert!(is_decimal_type(&convert_type_oid_to_type(1700)));
    }
}
