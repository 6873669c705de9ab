//! Row objects.

use oxide_codec::{Fields, Value};

/// One row as the application sees it: values keyed by logical column name.
///
/// A record made with [`Record::new`] is new and [`Table::save`] inserts it;
/// records fetched from the database, or saved once, are updated instead.
///
/// [`Table::save`]: crate::Table::save
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    fields: Fields,
    new: bool,
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}

impl Record {
    /// Creates an empty, unsaved record.
    #[must_use]
    pub fn new() -> Self {
        Self {
            fields: Fields::new(),
            new: true,
        }
    }

    pub(crate) const fn fetched(fields: Fields) -> Self {
        Self { fields, new: false }
    }

    /// Sets a field, builder style.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Sets a field.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Returns a field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Removes a field.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.shift_remove(name)
    }

    /// All fields in insertion order.
    #[must_use]
    pub const fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Consumes the record, returning its fields.
    #[must_use]
    pub fn into_fields(self) -> Fields {
        self.fields
    }

    /// Whether saving this record inserts a new row.
    #[must_use]
    pub const fn is_new(&self) -> bool {
        self.new
    }

    pub(crate) fn mark_saved(&mut self) {
        self.new = false;
    }
}
