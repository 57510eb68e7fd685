use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ordered mapping of field name to value, the payload of every record.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// A single field value.
///
/// The set of shapes is closed so that equality and hashing are well defined
/// on every device. Serialized untagged, so it maps directly onto JSON
/// `null`, booleans, numbers, strings and arrays.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<FieldValue>),
}

impl FieldValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Appends a canonical, type-tagged encoding of this value to `out`.
    ///
    /// Two values produce the same bytes iff they are equal, with `-0.0`
    /// folded onto `0.0`.
    pub(crate) fn encode_canonical(&self, out: &mut Vec<u8>) {
        match self {
            FieldValue::Null => out.push(0),
            FieldValue::Bool(b) => {
                out.push(1);
                out.push(u8::from(*b));
            }
            FieldValue::Number(n) => {
                out.push(2);
                let n = if *n == 0.0 { 0.0 } else { *n };
                out.extend_from_slice(&n.to_bits().to_be_bytes());
            }
            FieldValue::Text(s) => {
                out.push(3);
                encode_str(s, out);
            }
            FieldValue::List(items) => {
                out.push(4);
                out.extend_from_slice(&(items.len() as u64).to_be_bytes());
                for item in items {
                    item.encode_canonical(out);
                }
            }
        }
    }
}

pub(crate) fn encode_str(s: &str, out: &mut Vec<u8>) {
    out.extend_from_slice(&(s.len() as u64).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Number(n as f64)
    }
}

impl From<i32> for FieldValue {
    fn from(n: i32) -> Self {
        FieldValue::Number(f64::from(n))
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(items: Vec<T>) -> Self {
        FieldValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl TryFrom<serde_json::Value> for FieldValue {
    type Error = crate::ModelError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value;
        match value {
            Value::Null => Ok(FieldValue::Null),
            Value::Bool(b) => Ok(FieldValue::Bool(b)),
            Value::Number(n) => n
                .as_f64()
                .map(FieldValue::Number)
                .ok_or_else(|| crate::ModelError::UnsupportedValue(n.to_string())),
            Value::String(s) => Ok(FieldValue::Text(s)),
            Value::Array(items) => items
                .into_iter()
                .map(FieldValue::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map(FieldValue::List),
            Value::Object(_) => Err(crate::ModelError::UnsupportedValue(
                "nested objects are not syncable field values".to_string(),
            )),
        }
    }
}

/// Field-level diff of `current` against an optional `previous` snapshot.
///
/// Without a previous snapshot every field counts as changed. Fields that
/// disappeared are reported as [`FieldValue::Null`].
#[must_use]
pub fn diff_fields(previous: Option<&FieldMap>, current: &FieldMap) -> FieldMap {
    let Some(previous) = previous else {
        return current.clone();
    };

    let mut changed: FieldMap = current
        .iter()
        .filter(|(key, value)| previous.get(*key) != Some(*value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    for key in previous.keys() {
        if !current.contains_key(key) {
            changed.insert(key.clone(), FieldValue::Null);
        }
    }
    changed
}
