//! Runtime values of the expression language.

use super::ExprError;
use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::{fmt, sync::Arc};

/// Host function callable from expressions.
pub type NativeFn = Arc<dyn Fn(&[Value]) -> Result<Value, ExprError> + Send + Sync>;

/// Ordered object storage (insertion order, like JS objects).
pub type Object = IndexMap<String, Value>;

/// A value flowing through expression evaluation.
///
/// Everything except [`Value::Function`] is plain data and survives
/// [`Value::detached`]; functions are host handles and are dropped there.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(Object),
    Function(NativeFn),
}

impl Value {
    /// Wrap a closure as a function value.
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, ExprError> + Send + Sync + 'static,
    {
        Self::Function(Arc::new(f))
    }

    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    #[inline]
    pub const fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Array(_) | Self::Object(_) | Self::Function(_) => true,
        }
    }

    /// Result of the `typeof` operator.
    pub const fn type_of(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null | Self::Array(_) | Self::Object(_) => "object",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Function(_) => "function",
        }
    }

    /// Numeric conversion (`Number(x)`).
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Undefined => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    0.0
                } else {
                    s.parse().unwrap_or(f64::NAN)
                }
            }
            Self::Array(items) if items.is_empty() => 0.0,
            Self::Array(items) if items.len() == 1 => items[0].to_number(),
            Self::Array(_) | Self::Object(_) | Self::Function(_) => f64::NAN,
        }
    }

    /// String conversion (`String(x)`).
    pub fn to_display(&self) -> String {
        match self {
            Self::Undefined => "undefined".into(),
            Self::Null => "null".into(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::String(s) => s.clone(),
            Self::Array(items) => items
                .iter()
                .map(|v| if v.is_nullish() { String::new() } else { v.to_display() })
                .collect::<Vec<_>>()
                .join(","),
            Self::Object(_) => "[object Object]".into(),
            Self::Function(_) => "function".into(),
        }
    }

    /// Text emitted into markup: nullish values render as nothing.
    pub fn to_output(&self) -> String {
        if self.is_nullish() {
            String::new()
        } else {
            self.to_display()
        }
    }

    /// Deep copy that keeps only serializable data.
    ///
    /// Function values are dropped: from objects the key disappears, from
    /// arrays the slot becomes `null` (what `JSON.stringify` would emit).
    /// Returns `None` when `self` is itself a function.
    pub fn detached(&self) -> Option<Self> {
        match self {
            Self::Function(_) => None,
            Self::Array(items) => Some(Self::Array(
                items
                    .iter()
                    .map(|v| v.detached().unwrap_or(Self::Null))
                    .collect(),
            )),
            Self::Object(map) => Some(Self::Object(
                map.iter()
                    .filter_map(|(k, v)| v.detached().map(|v| (k.clone(), v)))
                    .collect(),
            )),
            other => Some(other.clone()),
        }
    }

    /// `===` comparison. Containers compare structurally.
    pub fn strict_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.strict_equals(y))
            }
            (Self::Object(a), Self::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|w| v.strict_equals(w)))
            }
            (Self::Function(a), Self::Function(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// `==` comparison with the usual primitive coercions.
    pub fn loose_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
            (Self::Number(_) | Self::Bool(_), Self::String(_) | Self::Bool(_))
            | (Self::String(_) | Self::Bool(_), Self::Number(_) | Self::Bool(_)) => {
                self.to_number() == other.to_number()
            }
            _ => self.strict_equals(other),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Format a number the way JS prints it: integral values without a fraction,
/// exponent notation outside `[1e-6, 1e21)`.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".into()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".into() } else { "-Infinity".into() }
    } else if n == 0.0 {
        // also normalizes -0
        "0".into()
    } else if n.abs() >= 1e21 || n.abs() < 1e-6 {
        let formatted = format!("{n:e}");
        match formatted.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => formatted,
        }
    } else {
        // f64 Display never prints a fraction for integral values
        n.to_string()
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
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

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Self::Number(n as f64)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Self::String(s),
            Json::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Json::Object(map) => Self::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect()),
        }
    }
}

impl From<toml::Value> for Value {
    fn from(value: toml::Value) -> Self {
        use toml::Value as Toml;
        match value {
            Toml::String(s) => Self::String(s),
            Toml::Integer(i) => Self::Number(i as f64),
            Toml::Float(f) => Self::Number(f),
            Toml::Boolean(b) => Self::Bool(b),
            Toml::Datetime(d) => Self::String(d.to_string()),
            Toml::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Toml::Table(map) => Self::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect()),
        }
    }
}

// ============================================================================
// Trait impls
// ============================================================================

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Array(items) => f.debug_list().entries(items).finish(),
            Self::Object(map) => f.debug_map().entries(map).finish(),
            Self::Function(_) => f.write_str("[function]"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

/// JSON shape of a value; functions and `undefined` members are skipped.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Undefined | Self::Null | Self::Function(_) => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) if n.is_finite() && *n == n.trunc() && n.abs() < 9.0e15 => {
                serializer.serialize_i64(*n as i64)
            }
            Self::Number(n) if n.is_finite() => serializer.serialize_f64(*n),
            Self::Number(_) => serializer.serialize_unit(),
            Self::String(s) => serializer.serialize_str(s),
            Self::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Object(map) => {
                let kept = map
                    .iter()
                    .filter(|(_, v)| !matches!(v, Self::Undefined | Self::Function(_)));
                let mut out = serializer.serialize_map(None)?;
                for (k, v) in kept {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_format_large_and_tiny_numbers() {
        assert_eq!(format_number(1e20), "100000000000000000000");
        assert_eq!(format_number(2f64.powi(63)), "9223372036854775808");
        assert_eq!(format_number(-1e19), "-10000000000000000000");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(1.5e-7), "1.5e-7");
        assert_eq!(format_number(0.000001), "0.000001");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Undefined.is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(Value::Array(vec![]).is_truthy());
        assert!(Value::from("0").is_truthy());
    }

    #[test]
    fn test_detached_drops_functions() {
        let value = Value::object([
            ("name", Value::from("x")),
            ("call", Value::function(|_| Ok(Value::Null))),
            ("list", Value::Array(vec![Value::function(|_| Ok(Value::Null)), 1.0.into()])),
        ]);
        let detached = value.detached().unwrap();
        let Value::Object(map) = detached else {
            panic!("expected object");
        };
        assert!(map.get("call").is_none());
        assert_eq!(map["name"], Value::from("x"));
        assert_eq!(map["list"], Value::Array(vec![Value::Null, 1.0.into()]));

        assert!(Value::function(|_| Ok(Value::Null)).detached().is_none());
    }

    #[test]
    fn test_loose_equality() {
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(Value::from(1.0).loose_equals(&Value::from("1")));
        assert!(!Value::Null.loose_equals(&Value::from(0.0)));
        assert!(!Value::from(1.0).strict_equals(&Value::from("1")));
    }

    #[test]
    fn test_display() {
        let list = Value::Array(vec![1.0.into(), Value::Null, "a".into()]);
        assert_eq!(list.to_display(), "1,,a");
        assert_eq!(Value::Undefined.to_output(), "");
        assert_eq!(Value::object([("a", Value::Null)]).to_display(), "[object Object]");
    }

    #[test]
    fn test_serialize_json() {
        let value = Value::object([
            ("n", Value::from(2.0)),
            ("f", Value::function(|_| Ok(Value::Null))),
            ("u", Value::Undefined),
            ("s", Value::from("x")),
        ]);
        assert_eq!(serde_json::to_string(&value).unwrap(), r#"{"n":2,"s":"x"}"#);
    }

    #[test]
    fn test_from_toml() {
        let table: toml::Value = toml::from_str("a = 1\nb = [true, 'x']").unwrap();
        let value = Value::from(table);
        let Value::Object(map) = value else {
            panic!("expected object");
        };
        assert_eq!(map["a"], Value::from(1.0));
        assert_eq!(map["b"], Value::Array(vec![true.into(), "x".into()]));
    }
}
