use crate::error::BulkResult;
use crate::types::{Cell, Row};

/// A dynamic row made of named values in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldBag {
    fields: Vec<(String, Cell)>,
}

impl FieldBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field and returns the bag, for building bags inline.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Cell>) -> Self {
        self.insert(name, value);
        self
    }

    /// Sets a field, replacing the value of an existing field with the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Cell>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(field, _)| *field == name) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Cell> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl Row for FieldBag {
    fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|(name, _)| name.clone()).collect()
    }

    fn value(&self, field: &str) -> Option<Cell> {
        self.get(field).cloned()
    }

    fn set_value(&mut self, field: &str, value: Cell) -> BulkResult<()> {
        self.insert(field, value);
        Ok(())
    }

    fn accepts_field(&self, _field: &str) -> bool {
        true
    }
}

impl<N, V> FromIterator<(N, V)> for FieldBag
where
    N: Into<String>,
    V: Into<Cell>,
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut bag = FieldBag::new();
        for (name, value) in iter {
            bag.insert(name, value);
        }
        bag
    }
}
