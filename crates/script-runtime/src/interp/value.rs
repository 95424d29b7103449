//! Runtime values and their JavaScript-compatible conversions.

use crate::capability::Namespace;
use serde_json::Value as Json;
use std::collections::BTreeMap;

/// Builtin callables available to every script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    /// `Error`, `TypeError`, `RangeError`
    ErrorCtor(ErrorName),
    /// `String(x)`
    String,
    /// `Number(x)`
    Number,
    /// `Boolean(x)`
    Boolean,
}

impl Builtin {
    pub const fn name(self) -> &'static str {
        match self {
            Self::ErrorCtor(name) => name.as_str(),
            Self::String => "String",
            Self::Number => "Number",
            Self::Boolean => "Boolean",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorName {
    Error,
    TypeError,
    RangeError,
    ReferenceError,
    SyntaxError,
}

impl ErrorName {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::TypeError => "TypeError",
            Self::RangeError => "RangeError",
            Self::ReferenceError => "ReferenceError",
            Self::SyntaxError => "SyntaxError",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Callable {
    Capability(Namespace, String),
    Builtin(Builtin),
    /// A string or array method bound to its receiver.
    Method { receiver: Box<Value>, name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
    Error { name: String, message: String },
    Namespace(Namespace),
    Function(Callable),
}

impl Value {
    pub fn error(name: ErrorName, message: impl Into<String>) -> Self {
        Self::Error {
            name: name.as_str().to_string(),
            message: message.into(),
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub const fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::Function(_) => "function",
            Self::Null
            | Self::Array(_)
            | Self::Object(_)
            | Self::Error { .. }
            | Self::Namespace(_) => "object",
        }
    }

    /// `String(value)`
    pub fn to_js_string(&self) -> String {
        match self {
            Self::Undefined => "undefined".to_string(),
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => number_to_string(*n),
            Self::Str(s) => s.clone(),
            Self::Array(items) => items
                .iter()
                .map(|item| {
                    if item.is_nullish() {
                        String::new()
                    } else {
                        item.to_js_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(","),
            Self::Object(_) | Self::Namespace(_) => "[object Object]".to_string(),
            Self::Error { name, message } => {
                if message.is_empty() {
                    name.clone()
                } else {
                    format!("{name}: {message}")
                }
            }
            Self::Function(Callable::Builtin(builtin)) => {
                format!("function {}() {{ [native code] }}", builtin.name())
            }
            Self::Function(Callable::Capability(_, name) | Callable::Method { name, .. }) => {
                format!("function {name}() {{ [native code] }}")
            }
        }
    }

    /// `Number(value)`
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::Str(s) => string_to_number(s),
            Self::Array(_) => string_to_number(&self.to_js_string()),
            _ => f64::NAN,
        }
    }

    /// `a === b`. Arrays and objects compare structurally.
    pub fn strict_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a == b,
            _ => self == other,
        }
    }

    /// `a == b`
    pub fn loose_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Self::Number(_), Self::Str(_) | Self::Bool(_))
            | (Self::Str(_) | Self::Bool(_), Self::Number(_))
            | (Self::Bool(_), Self::Str(_) | Self::Bool(_))
            | (Self::Str(_), Self::Bool(_)) => self.to_number() == other.to_number(),
            _ => self.strict_equals(other),
        }
    }

    /// `SameValueZero`, used by `includes`.
    pub fn same_value_zero(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) if a.is_nan() && b.is_nan() => true,
            _ => self.strict_equals(other),
        }
    }

    /// Array/object nesting depth. Scalars are 0, `[]` is 1.
    pub fn depth(&self) -> usize {
        match self {
            Self::Array(items) => 1 + items.iter().map(Self::depth).max().unwrap_or(0),
            Self::Object(map) => 1 + map.values().map(Self::depth).max().unwrap_or(0),
            Self::Function(Callable::Method { receiver, .. }) => 1 + receiver.depth(),
            _ => 0,
        }
    }

    /// Converts host JSON, or `None` when it nests deeper than `max_depth`.
    pub fn from_json(json: &Json, max_depth: usize) -> Option<Self> {
        Some(match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(*b),
            Json::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Self::Str(s.clone()),
            Json::Array(items) => {
                let inner = max_depth.checked_sub(1)?;
                Self::Array(
                    items
                        .iter()
                        .map(|item| Self::from_json(item, inner))
                        .collect::<Option<_>>()?,
                )
            }
            Json::Object(map) => {
                let inner = max_depth.checked_sub(1)?;
                Self::Object(
                    map.iter()
                        .map(|(k, v)| Self::from_json(v, inner).map(|v| (k.clone(), v)))
                        .collect::<Option<_>>()?,
                )
            }
        })
    }

    /// Converts to JSON for a capability call. Capabilities and functions
    /// never cross as values; they become `null`.
    pub fn to_json(&self) -> Json {
        match self {
            Self::Undefined | Self::Null | Self::Namespace(_) | Self::Function(_) => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Number(n) => number_to_json(*n),
            Self::Str(s) => Json::String(s.clone()),
            Self::Array(items) => Json::Array(items.iter().map(Self::to_json).collect()),
            Self::Object(map) => Json::Object(
                map.iter()
                    .filter(|(_, v)| !matches!(v, Self::Undefined))
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Self::Error { name, message } => serde_json::json!({
                "name": name,
                "message": message,
            }),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn number_to_json(n: f64) -> Json {
    const MAX_SAFE: f64 = 9_007_199_254_740_991.0;
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE {
        Json::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(Json::Null, Json::Number)
    }
}

fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        #[allow(clippy::cast_precision_loss)]
        return u64::from_str_radix(hex, 16).map_or(f64::NAN, |v| v as f64);
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        // Rust accepts spellings like "inf" and "nan" that JavaScript rejects.
        other if other.chars().any(char::is_alphabetic) && !other.contains(['e', 'E']) => f64::NAN,
        other => other.parse().unwrap_or(f64::NAN),
    }
}

/// Renders a number the way JavaScript's `String(n)` does.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let abs = n.abs();
    if (1e-6..1e21).contains(&abs) {
        return format!("{n}");
    }
    let formatted = format!("{n:e}");
    match formatted.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
        _ => formatted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_number_rendering() {
        assert_eq!(number_to_string(1.0), "1");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(number_to_string(2.5), "2.5");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Str(String::new()).truthy());
        assert!(Value::Str("0".to_string()).truthy());
        assert!(!Value::Number(f64::NAN).truthy());
        assert!(Value::Array(vec![]).truthy());
        assert!(!Value::Undefined.truthy());
    }

    #[test]
    fn test_string_conversion() {
        assert_eq!(
            Value::error(ErrorName::Error, "boom").to_js_string(),
            "Error: boom"
        );
        assert_eq!(Value::error(ErrorName::Error, "").to_js_string(), "Error");
        assert_eq!(
            Value::Array(vec![Value::Number(1.0), Value::Null, Value::Str("a".into())])
                .to_js_string(),
            "1,,a"
        );
        assert_eq!(
            Value::Object(BTreeMap::new()).to_js_string(),
            "[object Object]"
        );
    }

    #[test]
    fn test_number_conversion() {
        assert_eq!(Value::Str(" 42 ".into()).to_number(), 42.0);
        assert_eq!(Value::Str(String::new()).to_number(), 0.0);
        assert!(Value::Str("inf".into()).to_number().is_nan());
        assert!(Value::Str("abc".into()).to_number().is_nan());
        assert_eq!(Value::Str("1e3".into()).to_number(), 1000.0);
        assert_eq!(Value::Bool(true).to_number(), 1.0);
        assert!(Value::Undefined.to_number().is_nan());
    }

    #[test]
    fn test_equality() {
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(!Value::Null.strict_equals(&Value::Undefined));
        assert!(Value::Number(1.0).loose_equals(&Value::Str("1".into())));
        assert!(!Value::Number(1.0).strict_equals(&Value::Str("1".into())));
        assert!(Value::Bool(true).loose_equals(&Value::Number(1.0)));
        assert!(!Value::Number(0.0).loose_equals(&Value::Null));
        assert!(!Value::Number(f64::NAN).strict_equals(&Value::Number(f64::NAN)));
        assert!(Value::Number(f64::NAN).same_value_zero(&Value::Number(f64::NAN)));
    }

    #[test]
    fn test_json_conversion_keeps_integers() {
        let value = Value::Object(BTreeMap::from([
            ("age".to_string(), Value::Number(30.0)),
            ("ratio".to_string(), Value::Number(0.5)),
            ("skip".to_string(), Value::Undefined),
            ("api".to_string(), Value::Namespace(Namespace::Ui)),
        ]));
        assert_eq!(
            value.to_json(),
            json!({"age": 30, "ratio": 0.5, "api": null})
        );
        assert_eq!(
            Value::from_json(&json!({"a": [1, "x", null]}), 64),
            Some(Value::Object(BTreeMap::from([(
                "a".to_string(),
                Value::Array(vec![Value::Number(1.0), Value::Str("x".into()), Value::Null])
            )])))
        );
    }

    #[test]
    fn test_json_conversion_is_depth_bounded() {
        let nested = json!({"a": [[1]]});
        assert_eq!(Value::from_json(&nested, 3).map(|v| v.depth()), Some(3));
        assert_eq!(Value::from_json(&nested, 2), None);
        assert_eq!(Value::from_json(&json!("flat"), 0), Some(Value::Str("flat".into())));
    }

    #[test]
    fn test_depth() {
        assert_eq!(Value::Number(1.0).depth(), 0);
        assert_eq!(Value::Array(vec![]).depth(), 1);
        let inner = Value::Array(vec![Value::Array(vec![])]);
        assert_eq!(inner.depth(), 2);
        let method = Value::Function(Callable::Method {
            receiver: Box::new(inner),
            name: "includes".to_string(),
        });
        assert_eq!(Value::Array(vec![method]).depth(), 4);
    }

    #[test]
    fn test_typeof() {
        assert_eq!(Value::Null.type_of(), "object");
        assert_eq!(
            Value::Function(Callable::Builtin(Builtin::String)).type_of(),
            "function"
        );
        assert_eq!(Value::Namespace(Namespace::Repo).type_of(), "object");
    }
}
