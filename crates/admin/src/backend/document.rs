//! Store-agnostic document values.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use shopfloor_core::DocumentId;

/// A single field value inside a document.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Explicit null.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit integer.
    Integer(i64),
    /// Double precision number.
    Double(f64),
    /// UTF-8 text.
    String(String),
    /// Point in time.
    Timestamp(DateTime<Utc>),
    /// Write-only sentinel: the store replaces it with its own clock at
    /// commit time. Never appears in documents read back.
    ServerTimestamp,
}

impl FieldValue {
    /// The value as text, if it is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The value as a number, if it is numeric.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(n) => Some(*n),
            Self::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// The value as a timestamp, if it is one.
    #[must_use]
    pub const fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Rank of the value's type in the store's cross-type ordering.
    const fn type_rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Integer(_) | Self::Double(_) => 2,
            Self::Timestamp(_) | Self::ServerTimestamp => 3,
            Self::String(_) => 4,
        }
    }

    /// Total order used by ordered queries: null, booleans, numbers,
    /// timestamps, strings.
    #[must_use]
    pub fn query_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (Self::Timestamp(a), Self::Timestamp(b)) => a.cmp(b),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                _ => self.type_rank().cmp(&other.type_rank()),
            },
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

/// Field map of a document.
pub type Fields = BTreeMap<String, FieldValue>;

/// A document as read back from a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    /// Document identifier within its collection.
    pub id: DocumentId,
    /// Field values; server timestamps are resolved.
    pub fields: Fields,
}

impl StoredDocument {
    /// Look up a field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }
}

/// Sort direction of an ordered query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

impl Direction {
    /// Wire name used by the hosted store.
    #[must_use]
    pub const fn as_wire(self) -> &'static str {
        match self {
            Self::Ascending => "ASCENDING",
            Self::Descending => "DESCENDING",
        }
    }
}

/// Sort documents by a field the way an ordered query does.
///
/// Documents missing the field are excluded, like the hosted store does.
#[must_use]
pub fn order_documents(
    docs: impl IntoIterator<Item = StoredDocument>,
    order_field: &str,
    direction: Direction,
) -> Vec<StoredDocument> {
    let mut docs: Vec<StoredDocument> = docs
        .into_iter()
        .filter(|doc| doc.fields.contains_key(order_field))
        .collect();
    docs.sort_by(|a, b| {
        let ordering = match (a.get(order_field), b.get(order_field)) {
            (Some(x), Some(y)) => x.query_cmp(y),
            _ => Ordering::Equal,
        };
        let ordering = ordering.then_with(|| a.id.cmp(&b.id));
        match direction {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        }
    });
    docs
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn doc(id: &str, created_secs: Option<i64>) -> StoredDocument {
        let mut fields = Fields::new();
        if let Some(secs) = created_secs {
            fields.insert(
                "createdAt".to_string(),
                FieldValue::Timestamp(Utc.timestamp_opt(secs, 0).unwrap()),
            );
        }
        StoredDocument {
            id: DocumentId::parse(id).unwrap(),
            fields,
        }
    }

    #[test]
    fn test_order_descending_by_timestamp() {
        let ordered = order_documents(
            vec![doc("a", Some(10)), doc("b", Some(30)), doc("c", Some(20))],
            "createdAt",
            Direction::Descending,
        );
        let ids: Vec<&str> = ordered.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_order_excludes_documents_without_field() {
        let ordered = order_documents(
            vec![doc("a", Some(10)), doc("b", None)],
            "createdAt",
            Direction::Ascending,
        );
        assert_eq!(ordered.len(), 1);
    }

    #[test]
    fn test_numbers_compare_across_integer_and_double() {
        assert_eq!(
            FieldValue::Integer(2).query_cmp(&FieldValue::Double(1.5)),
            Ordering::Greater
        );
        assert_eq!(
            FieldValue::Null.query_cmp(&FieldValue::String(String::new())),
            Ordering::Less
        );
    }
}
