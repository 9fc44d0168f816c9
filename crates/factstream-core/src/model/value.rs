//! Sampled attribute values.

use serde::Serialize;

/// A value read from a managed-object attribute.
///
/// Scalar variants serialize via default string conversion; `Bytes`, `List`
/// and `Map` need an explicit expansion rule in the formatter (the
/// path/value formatter has one, the name/value formatter skips them).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<AttrValue>),
    Map(Vec<(String, AttrValue)>),
}

impl AttrValue {
    /// Numeric view used by relational conditions. Non-numeric values have
    /// no numeric view.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Int(v) => Some(*v as f64),
            AttrValue::Float(v) => Some(*v),
            AttrValue::Bool(_)
            | AttrValue::Null
            | AttrValue::Str(_)
            | AttrValue::Bytes(_)
            | AttrValue::List(_)
            | AttrValue::Map(_) => None,
        }
    }

    /// True for variants with a default string conversion.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            AttrValue::Null
                | AttrValue::Bool(_)
                | AttrValue::Int(_)
                | AttrValue::Float(_)
                | AttrValue::Str(_)
        )
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_f64() {
        assert_eq!(AttrValue::Int(42).as_f64(), Some(42.0));
        assert_eq!(AttrValue::Float(1.5).as_f64(), Some(1.5));
        assert_eq!(AttrValue::Str("42".into()).as_f64(), None);
        assert_eq!(AttrValue::Bool(true).as_f64(), None);
    }

    #[test]
    fn test_is_scalar() {
        assert!(AttrValue::Null.is_scalar());
        assert!(AttrValue::Str("x".into()).is_scalar());
        assert!(!AttrValue::Bytes(vec![1, 2]).is_scalar());
        assert!(!AttrValue::List(vec![]).is_scalar());
    }
}
