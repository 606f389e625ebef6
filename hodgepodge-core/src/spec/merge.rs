//! Field-level merge of a patch document onto a base document.
//!
//! Maps merge recursively, scalars in the patch win, `null` deletes a field.
//! Lists are replaced wholesale unless the [`MergeSchema`] declares a merge
//! key for their path, in which case elements are matched on that key.

use crate::error::{HodgeError, Result};
use serde::Serialize;
use serde::de::{self, DeserializeOwned};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const PATCH_DIRECTIVE: &str = "$patch";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListStrategy {
    Replace,
    MergeKey(String),
}

/// List merge metadata keyed by dot-separated field path.
///
/// Fields of elements inside a merge-keyed list continue the list's path,
/// so `slots.options` addresses `options` on every element of `slots`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSchema {
    lists: BTreeMap<String, ListStrategy>,
}

impl MergeSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(mut self, path: impl Into<String>) -> Self {
        self.lists.insert(path.into(), ListStrategy::Replace);
        self
    }

    pub fn merge_key(mut self, path: impl Into<String>, key: impl Into<String>) -> Self {
        self.lists
            .insert(path.into(), ListStrategy::MergeKey(key.into()));
        self
    }

    pub fn list_strategy(&self, path: &str) -> &ListStrategy {
        self.lists.get(path).unwrap_or(&ListStrategy::Replace)
    }
}

/// Documents that carry their own list merge metadata.
pub trait StrategicMerge: Serialize + DeserializeOwned {
    fn merge_schema() -> MergeSchema;
}

fn ensure_object(what: &str, document: &Value) -> Result<()> {
    if document.is_object() {
        return Ok(());
    }
    Err(HodgeError::decode(
        what,
        de::Error::custom("expected a JSON object at the top level"),
    ))
}

/// Merge `patch` onto `base`. Both must be JSON objects.
pub fn strategic_merge(base: &Value, patch: &Value, schema: &MergeSchema) -> Result<Value> {
    ensure_object("base document", base)?;
    ensure_object("patch document", patch)?;

    merge_value(base, patch, schema, "")
}

/// Byte-level entry point: decode, merge, encode.
pub fn merge_documents(base: &[u8], patch: &[u8], schema: &MergeSchema) -> Result<Vec<u8>> {
    let base: Value =
        serde_json::from_slice(base).map_err(|e| HodgeError::decode("base document", e))?;
    let patch: Value =
        serde_json::from_slice(patch).map_err(|e| HodgeError::decode("patch document", e))?;

    let merged = strategic_merge(&base, &patch, schema)?;
    Ok(serde_json::to_vec(&merged)?)
}

/// Merge a raw patch onto a typed document and decode the result.
pub fn patch_typed<T: StrategicMerge>(base: &T, patch: &Value) -> Result<T> {
    let base = serde_json::to_value(base)?;
    let merged = strategic_merge(&base, patch, &T::merge_schema())?;
    decode_value("merged document", &merged)
}

/// Decode a typed document from a JSON value through its encoded form.
///
/// Documents with flattened extras cannot be fed a `Value` directly: a
/// 128-bit integer in an unknown field fails to buffer.
pub fn decode_value<T: DeserializeOwned>(what: &str, value: &Value) -> Result<T> {
    let encoded = serde_json::to_vec(value)?;
    serde_json::from_slice(&encoded).map_err(|e| HodgeError::decode(what, e))
}

fn child_path(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", path, field)
    }
}

fn merge_value(base: &Value, patch: &Value, schema: &MergeSchema, path: &str) -> Result<Value> {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => merge_object(base, patch, schema, path),
        (Value::Array(base), Value::Array(patch)) => match schema.list_strategy(path) {
            ListStrategy::Replace => Ok(Value::Array(patch.iter().map(strip_nulls).collect())),
            ListStrategy::MergeKey(key) => merge_keyed_list(base, patch, key, schema, path),
        },
        (_, patch) => Ok(strip_nulls(patch)),
    }
}

fn merge_object(
    base: &Map<String, Value>,
    patch: &Map<String, Value>,
    schema: &MergeSchema,
    path: &str,
) -> Result<Value> {
    match patch.get(PATCH_DIRECTIVE) {
        None => {}
        Some(Value::String(directive)) if directive == "replace" => {
            return Ok(strip_nulls(&Value::Object(patch.clone())));
        }
        Some(other) => {
            return Err(HodgeError::InvalidPatch(format!(
                "unsupported {} directive {} at '{}'",
                PATCH_DIRECTIVE, other, path
            )));
        }
    }

    let mut merged = base.clone();
    for (field, value) in patch {
        if value.is_null() {
            merged.shift_remove(field);
            continue;
        }

        let field_path = child_path(path, field);
        let next = match merged.get(field) {
            Some(current) => merge_value(current, value, schema, &field_path)?,
            None => strip_nulls(value),
        };
        merged.insert(field.clone(), next);
    }

    Ok(Value::Object(merged))
}

fn merge_keyed_list(
    base: &[Value],
    patch: &[Value],
    key: &str,
    schema: &MergeSchema,
    path: &str,
) -> Result<Value> {
    let mut merged: Vec<Value> = base.to_vec();

    for element in patch {
        let object = element.as_object().ok_or_else(|| {
            HodgeError::InvalidPatch(format!(
                "element of merge-keyed list '{}' is not an object",
                path
            ))
        })?;
        let id = object.get(key).filter(|id| !id.is_null()).ok_or_else(|| {
            HodgeError::InvalidPatch(format!(
                "element of list '{}' lacks merge key '{}'",
                path, key
            ))
        })?;

        let position = merged
            .iter()
            .position(|existing| existing.get(key) == Some(id));

        let delete = matches!(
            object.get(PATCH_DIRECTIVE),
            Some(Value::String(directive)) if directive == "delete"
        );
        if delete {
            if let Some(position) = position {
                merged.remove(position);
            }
            continue;
        }

        match position {
            Some(position) => {
                let next = merge_value(&merged[position], element, schema, path)?;
                merged[position] = next;
            }
            None => merged.push(strip_nulls(element)),
        }
    }

    Ok(Value::Array(merged))
}

/// Drop nulls from a sub-document that has no base counterpart.
fn strip_nulls(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(field, value)| !value.is_null() && field.as_str() != PATCH_DIRECTIVE)
                .map(|(field, value)| (field.clone(), strip_nulls(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(strip_nulls).collect()),
        other => other.clone(),
    }
}
