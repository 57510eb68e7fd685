//! Record model for Helix sync.
//!
//! Defines the types every device and the backend agree on:
//! - [`FieldValue`] / [`FieldMap`]: closed, hashable record payloads
//! - [`SyncableEntity`]: a record plus its [`SyncMeta`] and content hash
//! - [`LocalChange`]: an edit handed to the core by the host
//! - [`DeltaChange`]: an inbound remote change reshaped for the host
//! - [`ChangeLogEntry`]: a row of the append-only change log
//! - [`PresenceRecord`]: a device liveness record

mod change;
mod entity;
mod value;

pub use change::{
    ChangeLogEntry, ChangeOperation, DeltaChange, LocalChange, PresenceRecord, PresenceStatus,
};
pub use entity::{content_hash, SyncMeta, SyncableEntity};
pub use value::{diff_fields, FieldMap, FieldValue};

/// Errors raised while converting host data into the record model.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("unsupported field value: {0}")]
    UnsupportedValue(String),

    #[error("expected a JSON object of fields")]
    NotAnObject,
}

/// Converts a JSON object into a [`FieldMap`].
pub fn fields_from_json(value: serde_json::Value) -> Result<FieldMap, ModelError> {
    match value {
        serde_json::Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| FieldValue::try_from(v).map(|v| (k, v)))
            .collect(),
        _ => Err(ModelError::NotAnObject),
    }
}

/// Builds a [`FieldMap`] from `key => value` pairs.
#[macro_export]
macro_rules! fields {
    () => { $crate::FieldMap::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::FieldMap::new();
        $( map.insert(::std::string::String::from($key), $crate::FieldValue::from($value)); )+
        map
    }};
}
