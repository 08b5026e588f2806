//! The dynamic value model.
//!
//! A [`Value`] is what the store's data record is made of and what every
//! expression evaluates to. Objects preserve insertion order; functions are
//! reference-counted closures that compare by identity, matching the
//! reference-equality semantics the store's no-op write check relies on.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// Signature of a callable value. Arguments are positional; the return
/// value is `Value::Undefined` for procedures.
pub type NativeFn = Rc<dyn Fn(&[Value]) -> Value>;

/// A callable wrapped for storage inside a [`Value`].
///
/// Two `FuncValue`s are equal iff they wrap the same allocation. Anything a
/// callable needs (store handle, captured props) is closed over rather than
/// passed as a receiver.
#[derive(Clone)]
pub struct FuncValue(NativeFn);

impl FuncValue {
    pub fn new(f: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, args: &[Value]) -> Value {
        (self.0)(args)
    }
}

impl PartialEq for FuncValue {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for FuncValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[function]")
    }
}

/// A dynamic runtime value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
    Func(FuncValue),
}

impl Value {
    /// Build a function value from a closure.
    pub fn func(f: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Value::Func(FuncValue::new(f))
    }

    /// Build an empty object value.
    pub fn object() -> Self {
        Value::Object(IndexMap::new())
    }

    /// `true` for objects and arrays (the container kinds a watcher on a
    /// parent path observes).
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Array(_))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Func(_))
    }

    /// Source-language truthiness: `false`, `0`, `NaN`, the empty string,
    /// `null` and `undefined` are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Func(_) => true,
        }
    }

    /// Numeric view used by the loose-equality and arithmetic paths.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Str(s) => s.trim().parse::<f64>().ok(),
            Value::Null => Some(0.0),
            _ => None,
        }
    }

    /// Member lookup on objects; numeric-index lookup on arrays. Also
    /// exposes `length` on arrays and strings.
    pub fn get_key(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(key),
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    pub fn get_key_mut(&mut self, key: &str) -> Option<&mut Value> {
        match self {
            Value::Object(map) => map.get_mut(key),
            Value::Array(items) => key
                .parse::<usize>()
                .ok()
                .and_then(move |i| items.get_mut(i)),
            _ => None,
        }
    }

    /// Write `value` under `key`. Arrays grow with `Undefined` holes when
    /// the index lies past the end, matching the source runtime.
    pub fn set_key(&mut self, key: &str, value: Value) -> bool {
        match self {
            Value::Object(map) => {
                map.insert(key.to_string(), value);
                true
            }
            Value::Array(items) => match key.parse::<usize>() {
                Ok(i) => {
                    if i >= items.len() {
                        items.resize(i + 1, Value::Undefined);
                    }
                    items[i] = value;
                    true
                }
                Err(_) => false,
            },
            _ => false,
        }
    }

    /// Walk a path of segments down from this value.
    pub fn get_path(&self, segments: &[impl AsRef<str>]) -> Option<&Value> {
        let mut cur = self;
        for seg in segments {
            cur = cur.get_key(seg.as_ref())?;
        }
        Some(cur)
    }

    pub fn get_path_mut(&mut self, segments: &[impl AsRef<str>]) -> Option<&mut Value> {
        let mut cur = self;
        for seg in segments {
            cur = cur.get_key_mut(seg.as_ref())?;
        }
        Some(cur)
    }

    /// The textual form used when a value lands in rendered text or an
    /// attribute: containers serialize to JSON, scalars print the way the
    /// source runtime stringified them.
    pub fn render_text(&self) -> String {
        match self {
            Value::Object(_) | Value::Array(_) => {
                serde_json::to_string(self).unwrap_or_default()
            }
            Value::Str(s) => s.clone(),
            Value::Number(n) => format_number(*n),
            Value::Bool(b) => b.to_string(),
            Value::Null => "null".to_string(),
            Value::Undefined => "undefined".to_string(),
            Value::Func(_) => "[function]".to_string(),
        }
    }
}

/// Print a number without a trailing `.0` for integral values.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Undefined | Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            Value::Str(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    // Functions have no JSON form; arrays hold their place
                    match item {
                        Value::Func(_) | Value::Undefined => seq.serialize_element(&Value::Null)?,
                        other => seq.serialize_element(other)?,
                    }
                }
                seq.end()
            }
            Value::Object(map) => {
                let mut obj = serializer.serialize_map(None)?;
                for (key, val) in map {
                    // Undefined and function entries are omitted entirely
                    if matches!(val, Value::Undefined | Value::Func(_)) {
                        continue;
                    }
                    obj.serialize_entry(key, val)?;
                }
                obj.end()
            }
            Value::Func(_) => serializer.serialize_unit(),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness_matches_source_language() {
        assert!(!Value::Undefined.is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(Value::Str("0".into()).is_truthy());
        assert!(Value::Array(vec![]).is_truthy());
        assert!(Value::object().is_truthy());
    }

    #[test]
    fn functions_compare_by_identity() {
        let f = Value::func(|_| Value::Undefined);
        let g = Value::func(|_| Value::Undefined);
        assert_eq!(f, f.clone());
        assert_ne!(f, g);
    }

    #[test]
    fn render_text_serializes_containers() {
        let v: Value = serde_json::json!({"a": [1, 2], "b": "x"}).into();
        assert_eq!(v.render_text(), r#"{"a":[1,2],"b":"x"}"#);
        assert_eq!(Value::Number(3.0).render_text(), "3");
        assert_eq!(Value::Number(3.5).render_text(), "3.5");
        assert_eq!(Value::Undefined.render_text(), "undefined");
    }

    #[test]
    fn array_writes_grow_with_holes() {
        let mut v = Value::Array(vec![Value::Number(1.0)]);
        assert!(v.set_key("2", Value::Number(9.0)));
        assert_eq!(v.get_key("1"), Some(&Value::Undefined));
        assert_eq!(v.get_key("2"), Some(&Value::Number(9.0)));
    }

    #[test]
    fn object_entries_keep_insertion_order() {
        let mut v = Value::object();
        v.set_key("z", 1i64.into());
        v.set_key("a", 2i64.into());
        if let Value::Object(map) = &v {
            let keys: Vec<_> = map.keys().cloned().collect();
            assert_eq!(keys, vec!["z", "a"]);
        } else {
            unreachable!()
        }
    }
}
