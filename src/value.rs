//! Row and document value types
//!
//! A [`Row`] is what the source store hands back for one record, a
//! [`Document`] is what gets written to the target store. Both keep their
//! fields in column order.

use chrono::{DateTime, Utc};

/// A scalar read from a source table column
#[derive(Clone, Debug, PartialEq)]
pub enum SourceValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    DateTime(DateTime<Utc>),
    Bytes(Vec<u8>),
    /// Integer too wide to be stored as a plain document number
    BigInt(i128),
}

/// A scalar the target store can hold natively
#[derive(Clone, Debug, PartialEq)]
pub enum DocumentValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(DateTime<Utc>),
}

/// One source record: column name to value, in column order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    fields: Vec<(String, SourceValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column, keeping insertion order
    pub fn push(&mut self, name: impl Into<String>, value: SourceValue) {
        self.fields.push((name.into(), value));
    }

    pub fn with(mut self, name: impl Into<String>, value: SourceValue) -> Self {
        self.push(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&SourceValue> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SourceValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl IntoIterator for Row {
    type Item = (String, SourceValue);
    type IntoIter = std::vec::IntoIter<(String, SourceValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl FromIterator<(String, SourceValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, SourceValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// One target document: field name to value, in source column order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    fields: Vec<(String, DocumentValue)>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: DocumentValue) {
        self.fields.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&DocumentValue> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DocumentValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, DocumentValue)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, DocumentValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_keeps_column_order() {
        let row = Row::new()
            .with("id", SourceValue::Int(1))
            .with("callsign", SourceValue::String("K1ABC".into()))
            .with("active", SourceValue::Bool(true));

        let names: Vec<&str> = row.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["id", "callsign", "active"]);
        assert_eq!(row.get("callsign"), Some(&SourceValue::String("K1ABC".into())));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn test_document_lookup() {
        let mut doc = Document::new();
        doc.insert("a", DocumentValue::Integer(1));
        doc.insert("b", DocumentValue::Null);

        assert_eq!(doc.len(), 2);
        assert_eq!(doc.get("a"), Some(&DocumentValue::Integer(1)));
        assert_eq!(doc.field_names().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
