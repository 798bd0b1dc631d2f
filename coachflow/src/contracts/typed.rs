//! Typed reads of validated stage outputs.
//!
//! Shapes guarantee the JSON form; `TypedOutput` turns an accepted value
//! into the domain model with serde so downstream code works with closed
//! enums instead of strings.

use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;

use super::errors::{codes, FieldError};

/// Serde bridge between validated JSON and a typed model.
#[derive(Debug)]
pub struct TypedOutput<T> {
    /// Dotted path prefix used in error messages.
    root: String,
    _marker: PhantomData<T>,
}

impl<T> TypedOutput<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Creates a reader rooted at the top of the value.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: String::new(),
            _marker: PhantomData,
        }
    }

    /// Creates a reader that reports errors under `root`.
    #[must_use]
    pub fn at(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            _marker: PhantomData,
        }
    }

    /// Deserializes a JSON value into `T`.
    pub fn from_json(&self, value: serde_json::Value) -> Result<T, FieldError> {
        serde_json::from_value(value).map_err(|e| {
            FieldError::structural(
                self.root.clone(),
                codes::TYPED_READ,
                format!("could not be read as {}: {}", short_type_name::<T>(), e),
            )
        })
    }

    /// Serializes `T` back into a JSON object value.
    pub fn to_json(&self, payload: &T) -> Result<serde_json::Value, FieldError> {
        let value = serde_json::to_value(payload).map_err(|e| {
            FieldError::structural(
                self.root.clone(),
                codes::TYPED_READ,
                format!("serialization error: {e}"),
            )
        })?;

        if value.is_object() {
            Ok(value)
        } else {
            Err(FieldError::structural(
                self.root.clone(),
                codes::TYPE_MISMATCH,
                "payload must serialize to an object",
            ))
        }
    }
}

impl<T> Default for TypedOutput<T>
where
    T: Serialize + DeserializeOwned,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Extracts a typed field from a JSON object.
pub fn extract_field<T: DeserializeOwned>(
    value: &serde_json::Value,
    field: &str,
) -> Result<T, FieldError> {
    let raw = value.get(field).ok_or_else(|| {
        FieldError::structural(field, codes::MISSING_FIELD, "required field is missing")
    })?;

    serde_json::from_value(raw.clone()).map_err(|e| {
        FieldError::structural(field, codes::TYPED_READ, format!("invalid type: {e}"))
    })
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}
