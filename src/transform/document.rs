//! Row to document transformer
//!
//! Normalizes source column values into values the document store can hold.

use crate::etl::Transformer;
use crate::value::{Document, DocumentValue, Row, SourceValue};
use base64::Engine;
use eyre::Result;

/// Transformer that turns a source [`Row`] into a target [`Document`]
///
/// Every column becomes a field of the same name, in the same order:
/// - date/time values become timestamps
/// - big integers become their decimal text
/// - binary values become standard base64 text
/// - everything else passes through unchanged
///
/// # Example
/// ```
/// use sql_firestore_migrate::transform::DocumentTransformer;
/// use sql_firestore_migrate::etl::Transformer;
/// use sql_firestore_migrate::value::{DocumentValue, Row, SourceValue};
///
/// let row = Row::new()
///     .with("id", SourceValue::BigInt(18_446_744_073_709_551_615))
///     .with("photo", SourceValue::Bytes(b"hi".to_vec()));
///
/// let doc = DocumentTransformer.transform(row).unwrap();
/// assert_eq!(
///     doc.get("id"),
///     Some(&DocumentValue::String("18446744073709551615".into()))
/// );
/// assert_eq!(doc.get("photo"), Some(&DocumentValue::String("aGk=".into())));
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct DocumentTransformer;

impl DocumentTransformer {
    /// Convert one row; this never fails
    pub fn convert(row: Row) -> Document {
        row.into_iter()
            .map(|(name, value)| (name, DocumentValue::from(value)))
            .collect()
    }
}

impl From<SourceValue> for DocumentValue {
    fn from(value: SourceValue) -> Self {
        match value {
            SourceValue::DateTime(at) => DocumentValue::Timestamp(at),
            SourceValue::BigInt(n) => DocumentValue::String(n.to_string()),
            SourceValue::Bytes(bytes) => {
                DocumentValue::String(base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            SourceValue::Null => DocumentValue::Null,
            SourceValue::Bool(b) => DocumentValue::Boolean(b),
            SourceValue::Int(n) => DocumentValue::Integer(n),
            SourceValue::Float(x) => DocumentValue::Double(x),
            SourceValue::String(s) => DocumentValue::String(s),
        }
    }
}

impl Transformer for DocumentTransformer {
    type Input = Row;
    type Output = Document;

    fn transform(&self, input: Self::Input) -> Result<Self::Output> {
        Ok(Self::convert(input))
    }
}
