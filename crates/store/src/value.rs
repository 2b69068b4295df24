//! Shared-structure value tree for the reactive store.
//!
//! Composite nodes (`Array`, `Object`) are `Arc`-shared, so "unchanged"
//! can be expressed as pointer identity rather than deep equality. The
//! change-propagation engine suppresses notifications only when a write
//! produces the *same* value in this identity sense, which is what lets
//! identity-preserving rebuilds (see [`update_array`]) terminate a
//! propagation cycle.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Array(Arc<Vec<Value>>),
    Object(Arc<BTreeMap<String, Value>>),
}

impl Value {
    pub fn object(pairs: impl IntoIterator<Item = (impl Into<String>, Value)>) -> Value {
        Value::Object(Arc::new(
            pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    pub fn empty_object() -> Value {
        Value::Object(Arc::new(BTreeMap::new()))
    }

    pub fn array(items: impl IntoIterator<Item = Value>) -> Value {
        Value::Array(Arc::new(items.into_iter().collect()))
    }

    pub fn empty_array() -> Value {
        Value::Array(Arc::new(Vec::new()))
    }

    /// Identity comparison: scalar equality, pointer equality for
    /// composites. The analogue of `===` on the original store's values.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => Arc::ptr_eq(a, b) || a == b,
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Loose boolean coercion used by `toggle` and condition checks.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Arc<Vec<Value>>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Arc<BTreeMap<String, Value>>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Field lookup on objects; `None` when absent or not an object.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Field lookup that folds "absent" into `Null`, mirroring how the
    /// store reads missing paths.
    pub fn get_or_null(&self, key: &str) -> Value {
        self.get(key).cloned().unwrap_or(Value::Null)
    }

    /// Returns a new object with `key` set to `value`; `self` is untouched.
    /// A non-object receiver is replaced by a fresh single-field object.
    pub fn with_field(&self, key: impl Into<String>, value: Value) -> Value {
        let mut map = match self.as_object() {
            Some(map) => (**map).clone(),
            None => BTreeMap::new(),
        };
        map.insert(key.into(), value);
        Value::Object(Arc::new(map))
    }

    pub fn without_field(&self, key: &str) -> Value {
        match self.as_object() {
            Some(map) if map.contains_key(key) => {
                let mut next = (**map).clone();
                next.remove(key);
                Value::Object(Arc::new(next))
            }
            _ => self.clone(),
        }
    }

    pub fn from_json(json: JsonValue) -> Value {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(0.0)),
            },
            JsonValue::String(s) => Value::Str(s.into()),
            JsonValue::Array(items) => {
                Value::Array(Arc::new(items.into_iter().map(Value::from_json).collect()))
            }
            JsonValue::Object(map) => Value::Object(Arc::new(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            )),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int(n) => JsonValue::from(*n),
            Value::Float(n) => JsonValue::from(*n),
            Value::Str(s) => JsonValue::String(s.to_string()),
            Value::Array(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
            Value::Object(map) => JsonValue::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    pub fn from_typed<T: Serialize>(value: &T) -> Result<Value, serde_json::Error> {
        Ok(Value::from_json(serde_json::to_value(value)?))
    }

    pub fn to_typed<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.to_json())
    }
}

/// Structural equality, the analogue of comparing persisted JSON. Distinct
/// from [`Value::same`], which is identity.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                Arc::ptr_eq(a, b) || (a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y))
            }
            (Value::Object(a), Value::Object(b)) => {
                Arc::ptr_eq(a, b)
                    || (a.len() == b.len()
                        && a.iter()
                            .zip(b.iter())
                            .all(|((ka, va), (kb, vb))| ka == kb && va == vb))
            }
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Value {
        Value::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Str(s.into())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Value {
        match opt {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// Identity-preserving element-wise rebuild of an array value.
///
/// Applies `f` to every element; if no element actually changed (by
/// identity), the original array value is returned, sharing the same
/// allocation. Downstream list-diffing by reference can then skip the
/// whole list, and a store write of the result is a no-op.
pub fn update_array(list: &Value, f: impl Fn(&Value) -> Value) -> Value {
    let Some(items) = list.as_array() else {
        return list.clone();
    };
    let mut changed = false;
    let mut next = Vec::with_capacity(items.len());
    for item in items.iter() {
        let mapped = f(item);
        if !mapped.same(item) {
            changed = true;
        }
        next.push(mapped);
    }
    if changed {
        Value::Array(Arc::new(next))
    } else {
        list.clone()
    }
}
