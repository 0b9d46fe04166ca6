use serde_json::{Map, Value};

use crate::bail;
use crate::error::{BulkResult, ErrorKind};
use crate::types::Cell;

/// An ordered collection of named values.
///
/// Every input shape of a bulk operation is read through this trait. Field names are matched
/// exactly, the case-insensitive matching against destination columns happens when mappings
/// are resolved.
pub trait Row: Send + Sync {
    /// Returns the field names in their declared order.
    fn field_names(&self) -> Vec<String>;

    /// Returns the value of a field, or [`None`] if the row has no such field.
    fn value(&self, field: &str) -> Option<Cell>;

    /// Writes a value back onto the row.
    ///
    /// Used to return generated identities. Rows that cannot hold the field return an error.
    fn set_value(&mut self, field: &str, value: Cell) -> BulkResult<()>;

    /// Returns whether [`Row::set_value`] can write `field`.
    ///
    /// Defaults to the fields the row already has. Rows that grow new fields on write override
    /// it.
    fn accepts_field(&self, field: &str) -> bool {
        self.value(field).is_some()
    }
}

/// JSON objects are rows whose fields are the object keys.
impl Row for Map<String, Value> {
    fn field_names(&self) -> Vec<String> {
        self.keys().cloned().collect()
    }

    fn value(&self, field: &str) -> Option<Cell> {
        self.get(field).map(Cell::from_json)
    }

    fn set_value(&mut self, field: &str, value: Cell) -> BulkResult<()> {
        if field.is_empty() {
            bail!(
                ErrorKind::InvalidInput,
                "Field name is empty",
                "A value cannot be written to a JSON object under an empty key"
            );
        }

        self.insert(field.to_string(), value.to_json());

        Ok(())
    }

    fn accepts_field(&self, field: &str) -> bool {
        !field.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_objects_expose_their_keys() {
        let mut object = json!({"id": 1, "name": "ada"});
        let row = object.as_object_mut().unwrap();

        assert_eq!(row.field_names(), vec!["id".to_string(), "name".to_string()]);
        assert_eq!(row.value("name"), Some(Cell::from("ada")));
        assert_eq!(row.value("missing"), None);

        row.set_value("id", Cell::I64(42)).unwrap();
        assert!(row.accepts_field("email"));
        assert!(!row.accepts_field(""));
        assert_eq!(object["id"], json!(42));
    }
}
