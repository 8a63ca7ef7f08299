//! Tagged configuration value tree and the layered merge rule.
//!
//! Every configuration document is represented as a [`ValueTree`]. Keeping the
//! shape explicit (instead of passing `serde_yaml::Value` or `serde_json::Value`
//! around) is what makes the merge rule unambiguous:
//!
//! - Mappings are merged recursively (overlay overrides base per-key)
//! - Sequences and scalars are replaced entirely by the overlay
//! - A type mismatch is always won by the overlay
//!
//! Mapping keys are unique strings. Deserialization stringifies scalar keys
//! (`1: x` becomes `"1": x`) so documents with numeric or boolean keys still
//! load, and a repeated key keeps its last value.

use std::fmt;

use indexmap::IndexMap;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, Serializer};

/// Ordered mapping of unique string keys to values.
pub type Mapping = IndexMap<String, ValueTree>;

/// Numeric scalar. Integers that fit in `i64` stay exact.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Number {
    /// Signed integer.
    Int(i64),
    /// Any other number.
    Float(f64),
}

impl Number {
    /// Value as `f64`, converting integers.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }

    /// Value as `i64` when it is an integer.
    pub fn as_i64(self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(i),
            Self::Float(_) => None,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
        }
    }
}

/// A configuration document: mapping, sequence, or scalar.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum ValueTree {
    /// Absent / `null` / `~`.
    #[default]
    Null,
    /// Boolean scalar.
    Bool(bool),
    /// Numeric scalar.
    Number(Number),
    /// String scalar.
    String(String),
    /// Ordered list of values.
    Sequence(Vec<ValueTree>),
    /// Ordered mapping with unique string keys.
    Mapping(Mapping),
}

impl ValueTree {
    /// An empty mapping, the value every failed or missing document degrades to.
    pub fn empty_mapping() -> Self {
        Self::Mapping(Mapping::new())
    }

    /// Short name of the variant, for log messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Sequence(_) => "sequence",
            Self::Mapping(_) => "mapping",
        }
    }

    /// Whether this value is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether this value is a mapping.
    pub fn is_mapping(&self) -> bool {
        matches!(self, Self::Mapping(_))
    }

    /// Whether this value is an empty mapping.
    pub fn is_empty_mapping(&self) -> bool {
        matches!(self, Self::Mapping(m) if m.is_empty())
    }

    /// Borrow the mapping, if this is one.
    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Self::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// Mutably borrow the mapping, if this is one.
    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Self::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// Borrow the sequence, if this is one.
    pub fn as_sequence(&self) -> Option<&[ValueTree]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow the string, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer, if this is an integral number.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    /// The number as `f64`, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(n.as_f64()),
            _ => None,
        }
    }

    /// Look up a key in a mapping. Returns `None` for non-mappings.
    pub fn get(&self, key: &str) -> Option<&ValueTree> {
        self.as_mapping().and_then(|m| m.get(key))
    }

    /// Follow a path of mapping keys.
    pub fn get_path(&self, path: &[&str]) -> Option<&ValueTree> {
        path.iter().try_fold(self, |node, key| node.get(key))
    }

    /// Look up a string scalar by key.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ValueTree::as_str)
    }

    /// Insert a key into this mapping, returning the previous value.
    ///
    /// A non-mapping value is first replaced by an empty mapping.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ValueTree>) -> Option<ValueTree> {
        if !self.is_mapping() {
            *self = Self::empty_mapping();
        }
        match self {
            Self::Mapping(m) => m.insert(key.into(), value.into()),
            _ => None,
        }
    }

    /// Apply `f` to every string scalar in the tree. Mapping keys are untouched.
    pub fn visit_strings_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut String),
    {
        match self {
            Self::String(s) => f(s),
            Self::Sequence(items) => {
                for item in items {
                    item.visit_strings_mut(f);
                }
            }
            Self::Mapping(map) => {
                for value in map.values_mut() {
                    value.visit_strings_mut(f);
                }
            }
            Self::Null | Self::Bool(_) | Self::Number(_) => {}
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Merge
// ─────────────────────────────────────────────────────────────────────────────

/// Merge `overlay` over `base`.
///
/// - Both mappings: every key of `base` is kept; each key of `overlay` is merged
///   recursively when both sides are mappings, otherwise the overlay value
///   replaces the base value in place
/// - Otherwise the overlay wins, including `Null` and sequences (never concatenated)
///
/// Pure and deterministic. Layers must be applied in precedence order: because
/// a type mismatch is won by the overlay, the operation is not associative in
/// general.
pub fn merge(base: ValueTree, overlay: ValueTree) -> ValueTree {
    match (base, overlay) {
        (ValueTree::Mapping(mut base_map), ValueTree::Mapping(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                if let Some(slot) = base_map.get_mut(&key) {
                    let base_val = std::mem::take(slot);
                    *slot = merge(base_val, overlay_val);
                } else {
                    let _ = base_map.insert(key, overlay_val);
                }
            }
            ValueTree::Mapping(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Fold layers lowest-precedence first, starting from an empty mapping.
pub fn merge_all<I>(layers: I) -> ValueTree
where
    I: IntoIterator<Item = ValueTree>,
{
    layers
        .into_iter()
        .fold(ValueTree::empty_mapping(), merge)
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversions
// ─────────────────────────────────────────────────────────────────────────────

impl From<bool> for ValueTree {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for ValueTree {
    fn from(i: i64) -> Self {
        Self::Number(Number::Int(i))
    }
}

impl From<i32> for ValueTree {
    fn from(i: i32) -> Self {
        Self::Number(Number::Int(i64::from(i)))
    }
}

impl From<f64> for ValueTree {
    fn from(f: f64) -> Self {
        Self::Number(Number::Float(f))
    }
}

impl From<&str> for ValueTree {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for ValueTree {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<ValueTree>> for ValueTree {
    fn from(items: Vec<ValueTree>) -> Self {
        Self::Sequence(items)
    }
}

impl From<Mapping> for ValueTree {
    fn from(map: Mapping) -> Self {
        Self::Mapping(map)
    }
}

impl<K: Into<String>, V: Into<ValueTree>> FromIterator<(K, V)> for ValueTree {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self::Mapping(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<ValueTree> for serde_json::Value {
    fn from(value: ValueTree) -> Self {
        match value {
            ValueTree::Null => Self::Null,
            ValueTree::Bool(b) => Self::Bool(b),
            ValueTree::Number(Number::Int(i)) => Self::from(i),
            ValueTree::Number(Number::Float(f)) => {
                serde_json::Number::from_f64(f).map_or(Self::Null, Self::Number)
            }
            ValueTree::String(s) => Self::String(s),
            ValueTree::Sequence(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            ValueTree::Mapping(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Serde
// ─────────────────────────────────────────────────────────────────────────────

impl Serialize for ValueTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(Number::Int(i)) => serializer.serialize_i64(*i),
            Self::Number(Number::Float(f)) => serializer.serialize_f64(*f),
            Self::String(s) => serializer.serialize_str(s),
            Self::Sequence(items) => serializer.collect_seq(items),
            Self::Mapping(map) => serializer.collect_map(map),
        }
    }
}

impl<'de> Deserialize<'de> for ValueTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueTreeVisitor)
    }
}

struct ValueTreeVisitor;

impl<'de> Visitor<'de> for ValueTreeVisitor {
    type Value = ValueTree;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a configuration value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<ValueTree, E> {
        Ok(ValueTree::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<ValueTree, E> {
        Ok(ValueTree::Number(Number::Int(v)))
    }

    #[allow(clippy::cast_precision_loss)]
    fn visit_u64<E: de::Error>(self, v: u64) -> Result<ValueTree, E> {
        let number = i64::try_from(v).map_or(Number::Float(v as f64), Number::Int);
        Ok(ValueTree::Number(number))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<ValueTree, E> {
        Ok(ValueTree::Number(Number::Float(v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<ValueTree, E> {
        Ok(ValueTree::String(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<ValueTree, E> {
        Ok(ValueTree::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<ValueTree, E> {
        Ok(ValueTree::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<ValueTree, E> {
        Ok(ValueTree::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<ValueTree, D::Error> {
        ValueTree::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<ValueTree, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(ValueTree::Sequence(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ValueTree, A::Error> {
        let mut map = Mapping::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((MapKey(key), value)) = access.next_entry::<MapKey, ValueTree>()? {
            let _ = map.insert(key, value);
        }
        Ok(ValueTree::Mapping(map))
    }
}

/// Mapping key that accepts any scalar and stringifies it.
struct MapKey(String);

impl<'de> Deserialize<'de> for MapKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MapKeyVisitor)
    }
}

struct MapKeyVisitor;

impl Visitor<'_> for MapKeyVisitor {
    type Value = MapKey;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a scalar mapping key")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<MapKey, E> {
        Ok(MapKey(v.to_string()))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<MapKey, E> {
        Ok(MapKey(v.to_string()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<MapKey, E> {
        Ok(MapKey(v.to_string()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<MapKey, E> {
        Ok(MapKey(v.to_string()))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<MapKey, E> {
        Ok(MapKey(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<MapKey, E> {
        Ok(MapKey(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<MapKey, E> {
        Ok(MapKey("null".to_owned()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
