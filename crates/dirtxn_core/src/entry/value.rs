//! Attribute values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single attribute value.
///
/// Values are totally ordered: first by variant (integers, then text, then
/// binary), then by content. Normalisation according to matching rules is
/// the schema layer's job; the engine compares values as given.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Value {
    /// Integer value.
    Integer(i64),
    /// UTF-8 string value.
    Text(String),
    /// Opaque binary value.
    Binary(Vec<u8>),
}

impl Value {
    /// Creates a text value.
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Returns the text content, if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Binary(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Binary(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_within_variant() {
        assert!(Value::Integer(4) < Value::Integer(10));
        assert!(Value::text("abc") < Value::text("abd"));
    }

    #[test]
    fn ordering_across_variants() {
        assert!(Value::Integer(i64::MAX) < Value::text(""));
        assert!(Value::text("zzz") < Value::Binary(vec![]));
    }

    #[test]
    fn debug_is_compact() {
        assert_eq!(format!("{:?}", Value::Integer(5)), "5");
        assert_eq!(format!("{:?}", Value::text("cn")), "\"cn\"");
        assert_eq!(format!("{:?}", Value::Binary(vec![1, 2])), "<2 bytes>");
    }
}
