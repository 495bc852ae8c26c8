use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CanonicalError;

/// A finite IEEE-754 number.
///
/// Construction rejects NaN and the infinities, and folds `-0.0` into `0.0`
/// so that equal numbers always share one canonical form.
#[derive(Clone, Copy, PartialEq, PartialOrd)]
pub struct Number(f64);

impl Number {
    /// Wrap a finite float. Returns `None` for NaN and ±Infinity.
    pub fn new(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        Some(Self(if value == 0.0 { 0.0 } else { value }))
    }

    pub fn as_f64(&self) -> f64 {
        self.0
    }

    /// The value as an integer, if it is integral and fits in `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        let v = self.0;
        if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
            Some(v as i64)
        } else {
            None
        }
    }
}

// NaN is unrepresentable, so equality is total.
impl Eq for Number {}

impl fmt::Debug for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for Number {
    fn from(v: i32) -> Self {
        Self(f64::from(v))
    }
}

impl From<u32> for Number {
    fn from(v: u32) -> Self {
        Self(f64::from(v))
    }
}

/// A validated payload value.
///
/// This is the closed set of shapes a stored payload may take. Every `Value`
/// has exactly one canonical encoding, and canonicalizing it cannot fail.
/// Map keys are kept sorted by the `BTreeMap`.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// An empty map.
    pub fn empty_map() -> Self {
        Self::Map(BTreeMap::new())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(n.as_f64()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a key when this value is a map.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|m| m.get(key))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Number> for Value {
    fn from(v: Number) -> Self {
        Self::Number(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Number(Number::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Number(Number::from(v))
    }
}

/// Integers beyond ±2^53 lose precision, exactly as they would in a JSON
/// number consumed by a double-precision reader.
impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Number(Number(v as f64))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::Number(Number(v as f64))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Self::Map(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            // JSON text cannot carry non-finite numbers.
            serde_json::Value::Number(n) => n
                .as_f64()
                .and_then(Number::new)
                .map_or(Self::Null, Self::Number),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => Self::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(v: &Value) -> Self {
        match v {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::from(i),
                None => serde_json::Number::from_f64(n.as_f64()).map_or(Self::Null, Self::Number),
            },
            Value::String(s) => Self::String(s.clone()),
            Value::List(items) => Self::Array(items.iter().map(Self::from).collect()),
            Value::Map(map) => Self::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::{SerializeMap, SerializeSeq};

        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => match n.as_i64() {
                Some(i) => serializer.serialize_i64(i),
                None => serializer.serialize_f64(n.as_f64()),
            },
            Self::String(s) => serializer.serialize_str(s),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from)
    }
}

/// Opaque or foreign shapes that have no canonical encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForeignKind {
    DateTime,
    HashMap,
    HashSet,
    Symbol,
    Function,
}

impl ForeignKind {
    /// Stable, human-readable rejection reason.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::DateTime => "date-time values are not allowed in canonicalized payloads",
            Self::HashMap => "hash-map containers are not allowed in canonicalized payloads",
            Self::HashSet => "hash-set containers are not allowed in canonicalized payloads",
            Self::Symbol => "symbol tokens have no canonical form",
            Self::Function => "function values have no canonical form",
        }
    }
}

impl fmt::Display for ForeignKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::DateTime => "DateTime",
            Self::HashMap => "HashMap",
            Self::HashSet => "HashSet",
            Self::Symbol => "Symbol",
            Self::Function => "Function",
        };
        write!(f, "{s}")
    }
}

/// A payload value as handed in by a caller, before validation.
///
/// Unlike [`Value`], a `RawValue` may contain the absent marker, non-finite
/// numbers, maps in insertion order (possibly with repeated keys, where the
/// last write wins), and shapes that are never accepted into the ledger.
/// [`RawValue::into_value`] consumes it and yields the stored form.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum RawValue {
    /// A key or element that was never set.
    Absent,
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<RawValue>),
    Map(Vec<(String, RawValue)>),
    Foreign(ForeignKind),
    /// An object with its own identity (a named type rather than a plain map).
    Instance {
        class_name: String,
        fields: Vec<(String, RawValue)>,
    },
}

impl RawValue {
    /// An empty map.
    pub fn map() -> Self {
        Self::Map(Vec::new())
    }

    /// Build a map from key/value pairs, keeping insertion order.
    pub fn object<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<RawValue>,
    {
        Self::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Builder-style insert. Has no effect unless `self` is a map.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<RawValue>) -> Self {
        if let Self::Map(pairs) = &mut self {
            pairs.push((key.into(), value.into()));
        }
        self
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// The error this node raises on its own, ignoring any children.
    pub fn rejection(&self) -> Option<CanonicalError> {
        match self {
            Self::Number(n) if !n.is_finite() => {
                Some(CanonicalError::InvalidValue(non_finite_label(*n).to_owned()))
            }
            Self::Foreign(kind) => Some(CanonicalError::UnsupportedType(*kind)),
            Self::Instance { class_name, .. } => {
                Some(CanonicalError::NotPlainValue(class_name.clone()))
            }
            _ => None,
        }
    }

    /// Validate and convert into the stored form.
    ///
    /// Absent map entries are dropped, absent list elements become `null`,
    /// and a top-level absent value becomes `null`.
    pub fn into_value(self) -> Result<Value, CanonicalError> {
        if let Some(err) = self.rejection() {
            return Err(err);
        }
        Ok(match self {
            Self::Absent | Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(b),
            Self::Number(n) => Value::Number(Number::new(n).ok_or_else(|| {
                CanonicalError::InvalidValue(non_finite_label(n).to_owned())
            })?),
            Self::String(s) => Value::String(s),
            Self::List(items) => Value::List(
                items
                    .into_iter()
                    .map(Self::into_value)
                    .collect::<Result<_, _>>()?,
            ),
            Self::Map(pairs) => {
                let latest: BTreeMap<String, RawValue> = pairs.into_iter().collect();
                Value::Map(
                    latest
                        .into_iter()
                        .filter(|(_, raw)| !raw.is_absent())
                        .map(|(key, raw)| raw.into_value().map(|value| (key, value)))
                        .collect::<Result<_, _>>()?,
                )
            }
            Self::Foreign(kind) => return Err(CanonicalError::UnsupportedType(kind)),
            Self::Instance { class_name, .. } => {
                return Err(CanonicalError::NotPlainValue(class_name))
            }
        })
    }
}

fn non_finite_label(n: f64) -> &'static str {
    if n.is_nan() {
        "NaN"
    } else if n.is_sign_positive() {
        "Infinity"
    } else {
        "-Infinity"
    }
}

impl From<bool> for RawValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<f32> for RawValue {
    fn from(v: f32) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<i32> for RawValue {
    fn from(v: i32) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<u32> for RawValue {
    fn from(v: u32) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        Self::Number(v as f64)
    }
}

impl From<u64> for RawValue {
    fn from(v: u64) -> Self {
        Self::Number(v as f64)
    }
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for RawValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Absent, Into::into)
    }
}

impl<T: Into<RawValue>> From<Vec<T>> for RawValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<RawValue>> From<BTreeMap<String, T>> for RawValue {
    fn from(v: BTreeMap<String, T>) -> Self {
        Self::Map(v.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

/// Hash maps iterate in an unspecified order and are refused outright.
impl<K, V, S> From<HashMap<K, V, S>> for RawValue {
    fn from(_: HashMap<K, V, S>) -> Self {
        Self::Foreign(ForeignKind::HashMap)
    }
}

impl<T, S> From<HashSet<T, S>> for RawValue {
    fn from(_: HashSet<T, S>) -> Self {
        Self::Foreign(ForeignKind::HashSet)
    }
}

impl<Tz: chrono::TimeZone> From<chrono::DateTime<Tz>> for RawValue {
    fn from(_: chrono::DateTime<Tz>) -> Self {
        Self::Foreign(ForeignKind::DateTime)
    }
}

impl From<chrono::NaiveDateTime> for RawValue {
    fn from(_: chrono::NaiveDateTime) -> Self {
        Self::Foreign(ForeignKind::DateTime)
    }
}

impl From<Value> for RawValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n.as_f64()),
            Value::String(s) => Self::String(s),
            Value::List(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Map(map) => Self::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect()),
        }
    }
}

impl From<serde_json::Value> for RawValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map_or(Self::Null, Self::Number),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl<'de> Deserialize<'de> for RawValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from)
    }
}
