//! Builtin globals and the string/array method table.
//!
//! This is the whole surface an expression can reach: there is no access to
//! the host process beyond what is registered here or put in the scope.

use super::{
    ExprError,
    value::{NativeFn, Value},
};
use rustc_hash::FxHashMap;
use std::sync::Arc;

static UNDEFINED: Value = Value::Undefined;

/// Longest string, in chars, that `repeat` and `padStart`/`padEnd` may build.
const MAX_STRING_LEN: usize = 1 << 24;

/// Argument `i`, or `undefined` when missing.
#[inline]
fn arg(args: &[Value], i: usize) -> &Value {
    args.get(i).unwrap_or(&UNDEFINED)
}

/// Immutable table of global names shared by a context and all its sandboxes.
#[derive(Clone, Default)]
pub struct Builtins {
    globals: FxHashMap<String, Value>,
}

impl Builtins {
    /// The standard library available to every page.
    pub fn standard() -> Self {
        Self::default()
            .with_fn("String", |args| Ok(arg(args, 0).to_display().into()))
            .with_fn("Number", |args| Ok(arg(args, 0).to_number().into()))
            .with_fn("Boolean", |args| Ok(arg(args, 0).is_truthy().into()))
            .with_fn("encodeURIComponent", |args| {
                Ok(urlencoding::encode(&arg(args, 0).to_display()).into_owned().into())
            })
            .with("JSON", namespace([("stringify", json_stringify as Builtin), ("parse", json_parse)]))
            .with(
                "Object",
                namespace([
                    ("keys", object_keys as Builtin),
                    ("values", object_values),
                    ("entries", object_entries),
                ]),
            )
            .with("Array", namespace([("isArray", array_is_array as Builtin)]))
            .with(
                "Math",
                namespace([
                    ("floor", math_floor as Builtin),
                    ("ceil", math_ceil),
                    ("round", math_round),
                    ("abs", math_abs),
                    ("min", math_min),
                    ("max", math_max),
                ]),
            )
    }

    /// Register a global value.
    pub fn with(mut self, name: &str, value: Value) -> Self {
        self.globals.insert(name.to_owned(), value);
        self
    }

    /// Register a global function.
    pub fn with_fn<F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, ExprError> + Send + Sync + 'static,
    {
        self.with(name, Value::function(f))
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.globals.contains_key(name)
    }
}

type Builtin = fn(&[Value]) -> Result<Value, ExprError>;

fn namespace<const N: usize>(entries: [(&str, Builtin); N]) -> Value {
    Value::object(
        entries
            .into_iter()
            .map(|(name, f)| (name, Value::Function(Arc::new(f) as NativeFn))),
    )
}

fn array_is_array(args: &[Value]) -> Result<Value, ExprError> {
    Ok(matches!(arg(args, 0), Value::Array(_)).into())
}

fn math_floor(args: &[Value]) -> Result<Value, ExprError> {
    Ok(arg(args, 0).to_number().floor().into())
}

fn math_ceil(args: &[Value]) -> Result<Value, ExprError> {
    Ok(arg(args, 0).to_number().ceil().into())
}

fn math_round(args: &[Value]) -> Result<Value, ExprError> {
    Ok((arg(args, 0).to_number() + 0.5).floor().into())
}

fn math_abs(args: &[Value]) -> Result<Value, ExprError> {
    Ok(arg(args, 0).to_number().abs().into())
}

fn math_min(args: &[Value]) -> Result<Value, ExprError> {
    Ok(fold_numbers(args, f64::INFINITY, f64::min).into())
}

fn math_max(args: &[Value]) -> Result<Value, ExprError> {
    Ok(fold_numbers(args, f64::NEG_INFINITY, f64::max).into())
}

fn fold_numbers(args: &[Value], init: f64, f: fn(f64, f64) -> f64) -> f64 {
    args.iter().fold(init, |acc, v| {
        let n = v.to_number();
        if acc.is_nan() || n.is_nan() { f64::NAN } else { f(acc, n) }
    })
}

fn json_stringify(args: &[Value]) -> Result<Value, ExprError> {
    match arg(args, 0) {
        Value::Undefined | Value::Function(_) => Ok(Value::Undefined),
        value => serde_json::to_string(value)
            .map(Value::String)
            .map_err(|err| ExprError::type_error(err.to_string())),
    }
}

fn json_parse(args: &[Value]) -> Result<Value, ExprError> {
    let text = arg(args, 0).to_display();
    serde_json::from_str::<serde_json::Value>(&text)
        .map(Value::from)
        .map_err(|err| ExprError::type_error(format!("JSON.parse: {err}")))
}

fn object_entries_of(value: &Value) -> Result<Vec<(String, Value)>, ExprError> {
    match value {
        Value::Undefined | Value::Null => Err(ExprError::type_error(
            "cannot convert undefined or null to object",
        )),
        Value::Object(map) => Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        Value::Array(items) => Ok(items
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v.clone()))
            .collect()),
        Value::String(s) => Ok(s
            .chars()
            .enumerate()
            .map(|(i, c)| (i.to_string(), c.to_string().into()))
            .collect()),
        _ => Ok(Vec::new()),
    }
}

fn object_keys(args: &[Value]) -> Result<Value, ExprError> {
    let entries = object_entries_of(arg(args, 0))?;
    Ok(Value::Array(entries.into_iter().map(|(k, _)| k.into()).collect()))
}

fn object_values(args: &[Value]) -> Result<Value, ExprError> {
    let entries = object_entries_of(arg(args, 0))?;
    Ok(Value::Array(entries.into_iter().map(|(_, v)| v).collect()))
}

fn object_entries(args: &[Value]) -> Result<Value, ExprError> {
    let entries = object_entries_of(arg(args, 0))?;
    Ok(Value::Array(
        entries
            .into_iter()
            .map(|(k, v)| Value::Array(vec![k.into(), v]))
            .collect(),
    ))
}

// ============================================================================
// Properties and methods of primitive receivers
// ============================================================================

/// Read a property of a non-object receiver (`"abc".length`, `list[0]`).
pub fn property(receiver: &Value, key: &str) -> Value {
    match receiver {
        Value::String(s) => match key {
            "length" => s.chars().count().into(),
            _ => key
                .parse::<usize>()
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map_or(Value::Undefined, |c| c.to_string().into()),
        },
        Value::Array(items) => match key {
            "length" => items.len().into(),
            _ => key
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or_default(),
        },
        _ => Value::Undefined,
    }
}

/// Clamp a JS-style relative index (negative counts from the end).
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if matches!(value, Value::Undefined) {
        return default;
    }
    let n = value.to_number();
    if n.is_nan() {
        0
    } else if n < 0.0 {
        len.saturating_sub((-n) as usize)
    } else {
        (n as usize).min(len)
    }
}

/// Call a builtin method on a string, array or number receiver.
///
/// Returns `None` when the receiver has no such method.
pub fn call_method(receiver: &Value, name: &str, args: &[Value]) -> Option<Result<Value, ExprError>> {
    match receiver {
        Value::String(s) => string_method(s, name, args),
        Value::Array(items) => array_method(items, name, args).map(Ok),
        Value::Number(n) => number_method(*n, name, args).map(Ok),
        _ => None,
    }
}

/// Validate a requested string length; `NaN` counts as zero.
fn string_length(requested: f64, what: &str) -> Result<usize, ExprError> {
    if requested.is_nan() {
        return Ok(0);
    }
    if requested < 0.0 || requested.is_infinite() {
        return Err(ExprError::range_error(format!("Invalid {what} value: {}", Value::Number(requested).to_display())));
    }
    let len = requested.trunc();
    if len > MAX_STRING_LEN as f64 {
        return Err(ExprError::range_error("Invalid string length"));
    }
    Ok(len as usize)
}

fn string_method(s: &str, name: &str, args: &[Value]) -> Option<Result<Value, ExprError>> {
    let text = |i| arg(args, i).to_display();
    let value = match name {
        "toString" => s.into(),
        "toUpperCase" => s.to_uppercase().into(),
        "toLowerCase" => s.to_lowercase().into(),
        "trim" => s.trim().into(),
        "trimStart" => s.trim_start().into(),
        "trimEnd" => s.trim_end().into(),
        "includes" => s.contains(text(0).as_str()).into(),
        "startsWith" => s.starts_with(text(0).as_str()).into(),
        "endsWith" => s.ends_with(text(0).as_str()).into(),
        "indexOf" => s
            .find(text(0).as_str())
            .map_or(-1.0, |byte| s[..byte].chars().count() as f64)
            .into(),
        "replace" => s.replacen(text(0).as_str(), &text(1), 1).into(),
        "replaceAll" => s.replace(text(0).as_str(), &text(1)).into(),
        "repeat" => {
            let count = match string_length(arg(args, 0).to_number(), "count") {
                Ok(count) => count,
                Err(err) => return Some(Err(err)),
            };
            if s.chars().count().saturating_mul(count) > MAX_STRING_LEN {
                return Some(Err(ExprError::range_error("Invalid string length")));
            }
            s.repeat(count).into()
        }
        "split" => match arg(args, 0) {
            Value::Undefined => Value::Array(vec![s.into()]),
            sep => {
                let sep = sep.to_display();
                if sep.is_empty() {
                    Value::Array(s.chars().map(|c| c.to_string().into()).collect())
                } else {
                    Value::Array(s.split(sep.as_str()).map(Value::from).collect())
                }
            }
        },
        "slice" => {
            let chars: Vec<char> = s.chars().collect();
            let start = relative_index(arg(args, 0), chars.len(), 0);
            let end = relative_index(arg(args, 1), chars.len(), chars.len());
            chars[start..end.max(start)].iter().collect::<String>().into()
        }
        "padStart" | "padEnd" => {
            let width = match arg(args, 0).to_number() {
                n if n <= 0.0 => 0,
                n => match string_length(n, "length") {
                    Ok(width) => width,
                    Err(err) => return Some(Err(err)),
                },
            };
            let fill = match arg(args, 1) {
                Value::Undefined => " ".to_owned(),
                v => v.to_display(),
            };
            let len = s.chars().count();
            if len >= width || fill.is_empty() {
                s.into()
            } else {
                let pad: String = fill.chars().cycle().take(width - len).collect();
                let padded = if name == "padStart" { pad + s } else { s.to_owned() + &pad };
                padded.into()
            }
        }
        _ => return None,
    };
    Some(Ok(value))
}

fn array_method(items: &[Value], name: &str, args: &[Value]) -> Option<Value> {
    let value = match name {
        "join" => {
            let sep = match arg(args, 0) {
                Value::Undefined => ",".to_owned(),
                v => v.to_display(),
            };
            items
                .iter()
                .map(Value::to_output)
                .collect::<Vec<_>>()
                .join(&sep)
                .into()
        }
        "includes" => items.iter().any(|v| v.strict_equals(arg(args, 0))).into(),
        "indexOf" => items
            .iter()
            .position(|v| v.strict_equals(arg(args, 0)))
            .map_or(-1.0, |i| i as f64)
            .into(),
        "slice" => {
            let start = relative_index(arg(args, 0), items.len(), 0);
            let end = relative_index(arg(args, 1), items.len(), items.len());
            Value::Array(items[start..end.max(start)].to_vec())
        }
        "concat" => {
            let mut out = items.to_vec();
            for extra in args {
                match extra {
                    Value::Array(more) => out.extend(more.iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            Value::Array(out)
        }
        // Returns a reversed copy; receivers are never mutated in place.
        "reverse" => Value::Array(items.iter().rev().cloned().collect()),
        "toString" => Value::Array(items.to_vec()).to_display().into(),
        _ => return None,
    };
    Some(value)
}

fn number_method(n: f64, name: &str, args: &[Value]) -> Option<Value> {
    let value = match name {
        "toFixed" => {
            let digits = arg(args, 0).to_number();
            let digits = if digits.is_nan() { 0 } else { digits.clamp(0.0, 20.0) as usize };
            format!("{n:.digits$}").into()
        }
        "toString" => Value::Number(n).to_display().into(),
        _ => return None,
    };
    Some(value)
}

// ============================================================================
// Tests
// ============================================================================
