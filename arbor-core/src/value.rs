//! Dynamic Values
//!
//! [`Value`] is a closed set of semantic containers for graphs whose payloads
//! are not known statically (configuration blobs, data loaded from JSON,
//! style maps). Its [`StructuralEq`] implementation is the deep equality the
//! node write gate relies on:
//!
//! - variants must match, so a sequence never equals a map
//! - numbers compare by value, with `NaN` equal to `NaN`
//! - maps need the same key set and equal values per key
//! - opaque values (dates, patterns) compare by kind and canonical string
//! - shared references compare by identity, then by contents
//!
//! Shared references are the only way to build a cyclic value. While
//! comparing, every shared reference entered is pushed on a chain; meeting a
//! reference already on the chain compares unequal, which ends the recursion.

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Error as _, Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::reactive::StructuralEq;

/// A shared, mutable reference to a value.
pub type SharedValue = Arc<RwLock<Value>>;

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    /// The absent value.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A number.
    Number(f64),
    /// A string.
    String(String),
    /// An ordered sequence.
    Seq(Vec<Value>),
    /// A map with insertion-ordered keys.
    Map(IndexMap<String, Value>),
    /// A value compared by its canonical string form.
    Opaque {
        /// What kind of value this is, e.g. `"date"`.
        kind: String,
        /// Canonical representation.
        repr: String,
    },
    /// A shared reference. May form cycles.
    Shared(SharedValue),
}

impl Value {
    /// Build an opaque value.
    pub fn opaque(kind: impl Into<String>, repr: impl Into<String>) -> Self {
        Self::Opaque {
            kind: kind.into(),
            repr: repr.into(),
        }
    }

    /// Wrap a value in a shared reference.
    pub fn shared(value: Value) -> Self {
        Self::Shared(Arc::new(RwLock::new(value)))
    }

    /// True for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The number, if this is one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The string, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Look up a key in a map value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Map(map) => map.get(key),
            _ => None,
        }
    }
}

struct Chains {
    left: Vec<*const RwLock<Value>>,
    right: Vec<*const RwLock<Value>>,
}

fn compare(x: &Value, y: &Value, chains: &mut Chains) -> bool {
    match (x, y) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a.structural_eq(b),
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Seq(a), Value::Seq(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| compare(a, b, chains))
        }
        (Value::Map(a), Value::Map(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|w| compare(v, w, chains)))
        }
        (
            Value::Opaque { kind: ka, repr: ra },
            Value::Opaque { kind: kb, repr: rb },
        ) => ka == kb && ra == rb,
        (Value::Shared(a), Value::Shared(b)) => {
            if Arc::ptr_eq(a, b) {
                return true;
            }
            let (pa, pb) = (Arc::as_ptr(a), Arc::as_ptr(b));
            if chains.left.contains(&pa) || chains.right.contains(&pb) {
                return false;
            }
            chains.left.push(pa);
            chains.right.push(pb);
            let equal = {
                let (ga, gb) = (a.read_recursive(), b.read_recursive());
                compare(&ga, &gb, chains)
            };
            chains.left.pop();
            chains.right.pop();
            equal
        }
        _ => false,
    }
}

impl StructuralEq for Value {
    fn structural_eq(&self, other: &Self) -> bool {
        compare(
            self,
            other,
            &mut Chains {
                left: Vec::new(),
                right: Vec::new(),
            },
        )
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.structural_eq(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "{b:?}"),
            Self::Number(n) => write!(f, "{n:?}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Seq(items) => f.debug_list().entries(items).finish(),
            Self::Map(map) => f.debug_map().entries(map).finish(),
            Self::Opaque { kind, repr } => write!(f, "{kind}({repr})"),
            // Contents are not printed: they may loop back here.
            Self::Shared(shared) => write!(f, "Shared({:p})", Arc::as_ptr(shared)),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => Self::Seq(items.into_iter().map(Into::into).collect()),
            serde_json::Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl<V: Into<Value>> From<Vec<V>> for Value {
    fn from(items: Vec<V>) -> Self {
        Self::Seq(items.into_iter().map(Into::into).collect())
    }
}

impl<V: Into<Value>> FromIterator<(String, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        Self::Map(iter.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

/// Serializable view carrying the chain of shared references entered so far.
struct Tracked<'a> {
    value: &'a Value,
    chain: &'a RefCell<Vec<*const RwLock<Value>>>,
}

impl Serialize for Tracked<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.value {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Opaque { repr, .. } => serializer.serialize_str(repr),
            Value::Seq(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(&Tracked {
                        value: item,
                        chain: self.chain,
                    })?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(
                        key,
                        &Tracked {
                            value,
                            chain: self.chain,
                        },
                    )?;
                }
                out.end()
            }
            Value::Shared(shared) => {
                let ptr = Arc::as_ptr(shared);
                if self.chain.borrow().contains(&ptr) {
                    return Err(S::Error::custom("cannot serialize a cyclic shared value"));
                }
                self.chain.borrow_mut().push(ptr);
                let result = {
                    let guard = shared.read_recursive();
                    Tracked {
                        value: &guard,
                        chain: self.chain,
                    }
                    .serialize(serializer)
                };
                self.chain.borrow_mut().pop();
                result
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let chain = RefCell::new(Vec::new());
        Tracked {
            value: self,
            chain: &chain,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::equal;

    fn map(entries: &[(&str, Value)]) -> Value {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn primitives_compare_by_value() {
        assert!(equal(&Value::from(1), &Value::from(1.0)));
        assert!(equal(&Value::Number(f64::NAN), &Value::Number(f64::NAN)));
        assert!(!equal(&Value::from("1"), &Value::from(1)));
        assert!(equal(&Value::Null, &Value::default()));
    }

    #[test]
    fn variants_must_match() {
        let seq = Value::from(Vec::<Value>::new());
        let empty_map = map(&[]);
        assert!(!equal(&seq, &empty_map));
    }

    #[test]
    fn nested_maps_compare_deeply() {
        let a = map(&[("testing", map(&[("testing", Value::from(true))]))]);
        let b = map(&[("testing", map(&[("testing", Value::from(true))]))]);
        let c = map(&[("testing", map(&[("testing", Value::from(false))]))]);
        assert!(equal(&a, &b));
        assert!(!equal(&a, &c));
    }

    #[test]
    fn map_key_sets_must_match() {
        let a = map(&[("x", Value::from(1)), ("y", Value::Null)]);
        let b = map(&[("x", Value::from(1))]);
        assert!(!equal(&a, &b));
    }

    #[test]
    fn opaque_values_compare_by_canonical_form() {
        let a = Value::opaque("date", "2020-01-01T00:00:00Z");
        let b = Value::opaque("date", "2020-01-01T00:00:00Z");
        let c = Value::opaque("pattern", "2020-01-01T00:00:00Z");
        assert!(equal(&a, &b));
        assert!(!equal(&a, &c));
    }

    #[test]
    fn shared_values_compare_by_contents() {
        let a = Value::shared(Value::from(vec![1, 2]));
        let b = Value::shared(Value::from(vec![1, 2]));
        assert!(equal(&a, &b));
        assert!(equal(&a, &a.clone()));
    }

    #[test]
    fn cyclic_values_terminate() {
        let a = Arc::new(RwLock::new(Value::Null));
        *a.write() = map(&[("self", Value::Shared(a.clone()))]);
        let b = Arc::new(RwLock::new(Value::Null));
        *b.write() = map(&[("self", Value::Shared(b.clone()))]);

        // The recursion is cut where a reference repeats on the chain.
        assert!(!equal(&Value::Shared(a.clone()), &Value::Shared(b.clone())));
        assert!(equal(&Value::Shared(a.clone()), &Value::Shared(a.clone())));

        // Break the cycles so the test does not leak.
        *a.write() = Value::Null;
        *b.write() = Value::Null;
    }

    #[test]
    fn json_round_trip() {
        let json = serde_json::json!({"name": "box", "size": [10, 20.5], "visible": true, "parent": null});
        let value = Value::from(json.clone());
        assert_eq!(value.get("name").and_then(Value::as_str), Some("box"));

        let back = serde_json::to_value(&value).unwrap();
        assert_eq!(back["size"][1], serde_json::json!(20.5));
        assert_eq!(back["visible"], serde_json::json!(true));
        assert!(back["parent"].is_null());

        let parsed: Value = serde_json::from_str(r#"{"a": [1, 2]}"#).unwrap();
        assert!(equal(&parsed, &map(&[("a", Value::from(vec![1, 2]))])));
    }

    #[test]
    fn cyclic_values_fail_to_serialize() {
        let a = Arc::new(RwLock::new(Value::Null));
        *a.write() = Value::Seq(vec![Value::Shared(a.clone())]);

        let result = serde_json::to_string(&Value::Shared(a.clone()));
        assert!(result.is_err());

        *a.write() = Value::Null;
    }
}
