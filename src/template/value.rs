// ABOUTME: Dynamic value model shared by the compile-time evaluator and the program executor
// ABOUTME: Implements truthiness, loose comparison, numeric coercion, path access and output formatting

use indexmap::IndexMap;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use super::error::{RenderError, Result};

/// Host object exposed to templates through `->property` and `->method(...)` access
pub trait TemplateObject: fmt::Debug {
    fn type_name(&self) -> &str;

    fn property(&self, name: &str) -> Option<Value>;

    fn call(&self, method: &str, args: &[Value]) -> Result<Value>;

    /// Text printed when the object itself is output
    fn display(&self) -> String {
        self.type_name().to_string()
    }
}

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
    Object(Rc<dyn TemplateObject>),
}

/// Numeric view of a value after coercion
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Number::Int(i) => Value::Int(i),
            Number::Float(f) => Value::Float(f),
        }
    }
}

impl Value {
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Object(object) => object.type_name(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Value::List(_) | Value::Map(_))
    }

    /// Boolean interpretation used by conditions and logical operators
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !(s.is_empty() || s == "0"),
            Value::List(items) => !items.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
            Value::Object(_) => true,
        }
    }

    pub fn is_empty_value(&self) -> bool {
        !self.is_truthy()
    }

    /// Strict numeric view: numbers, booleans and numeric strings
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Int(i) => Some(Number::Int(*i)),
            Value::Float(f) => Some(Number::Float(*f)),
            Value::Bool(b) => Some(Number::Int(i64::from(*b))),
            Value::Str(s) => parse_number(s.trim()),
            _ => None,
        }
    }

    /// Lenient numeric coercion where anything non-numeric counts as zero
    pub fn to_number(&self) -> Number {
        match self {
            Value::Null => Number::Int(0),
            Value::Str(s) => parse_number(s.trim())
                .or_else(|| leading_number(s.trim()))
                .unwrap_or(Number::Int(0)),
            Value::List(items) => Number::Int(i64::from(!items.is_empty())),
            Value::Map(entries) => Number::Int(i64::from(!entries.is_empty())),
            Value::Object(_) => Number::Int(1),
            other => other.as_number().unwrap_or(Number::Int(0)),
        }
    }

    pub fn to_int(&self) -> i64 {
        match self.to_number() {
            Number::Int(i) => i,
            Number::Float(f) => f as i64,
        }
    }

    /// Text written when the value is printed
    pub fn to_output(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(true) => "1".to_string(),
            Value::Bool(false) => String::new(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Str(s) => s.clone(),
            Value::List(_) | Value::Map(_) => "Array".to_string(),
            Value::Object(object) => object.display(),
        }
    }

    /// Number of elements, as counted by `count`
    pub fn count(&self) -> usize {
        match self {
            Value::Null => 0,
            Value::List(items) => items.len(),
            Value::Map(entries) => entries.len(),
            _ => 1,
        }
    }

    /// Look up a key on a collection or a property on an object
    pub fn key(&self, key: &str) -> Value {
        match self {
            Value::Map(entries) => entries.get(key).cloned().unwrap_or_default(),
            Value::List(items) => key
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index).cloned())
                .unwrap_or_default(),
            Value::Object(object) => object.property(key).unwrap_or_default(),
            _ => Value::Null,
        }
    }

    /// Look up using another value as the key
    pub fn key_by(&self, key: &Value) -> Value {
        match (self, key) {
            (Value::List(items), Value::Int(index)) => usize::try_from(*index)
                .ok()
                .and_then(|index| items.get(index).cloned())
                .unwrap_or_default(),
            _ => self.key(&key.to_output()),
        }
    }

    pub fn property(&self, name: &str) -> Value {
        match self {
            Value::Object(object) => object.property(name).unwrap_or_default(),
            Value::Map(entries) => entries.get(name).cloned().unwrap_or_default(),
            _ => Value::Null,
        }
    }

    pub fn call_method(&self, method: &str, args: &[Value]) -> Result<Value> {
        match self {
            Value::Object(object) => object.call(method, args),
            other => Err(RenderError::NotAnObject {
                method: method.to_string(),
                type_name: other.type_name().to_string(),
            }),
        }
    }

    /// Equality used by `==` and `!=`: numeric when both sides are numeric, textual otherwise
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(_), _) | (_, Value::Bool(_)) | (Value::Null, _) | (_, Value::Null) => {
                self.is_truthy() == other.is_truthy()
            }
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|other| v.loose_eq(other)))
            }
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => a.as_f64() == b.as_f64(),
                _ => self.to_output() == other.to_output(),
            },
        }
    }

    /// Equality used by `===` and `!==`: same type and same value
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.strict_eq(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|((ka, va), (kb, vb))| ka == kb && va.strict_eq(vb))
            }
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Ordering used by `<`, `>`, `<=` and `>=`
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => match (self.as_number(), other.as_number()) {
                (Some(x), Some(y)) => x.as_f64().partial_cmp(&y.as_f64()),
                _ => Some(a.cmp(b)),
            },
            _ => self
                .to_number()
                .as_f64()
                .partial_cmp(&other.to_number().as_f64()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_eq(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_output())
    }
}

fn parse_number(text: &str) -> Option<Number> {
    if text.is_empty() {
        return None;
    }
    if let Ok(i) = text.parse::<i64>() {
        return Some(Number::Int(i));
    }
    text.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(Number::Float)
}

fn leading_number(text: &str) -> Option<Number> {
    let end = text
        .char_indices()
        .take_while(|(i, c)| c.is_ascii_digit() || *c == '.' || (*i == 0 && (*c == '-' || *c == '+')))
        .map(|(i, c)| i + c.len_utf8())
        .last()?;
    parse_number(&text[..end])
}

fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        format!("{}", f)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::List(values.into_iter().map(Into::into).collect())
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(entries: IndexMap<String, Value>) -> Self {
        Value::Map(entries)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(0.0)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Fruit;

    impl TemplateObject for Fruit {
        fn type_name(&self) -> &str {
            "Fruit"
        }

        fn property(&self, name: &str) -> Option<Value> {
            (name == "name").then(|| Value::from("apple"))
        }

        fn call(&self, method: &str, args: &[Value]) -> Result<Value> {
            match method {
                "slices" => Ok(Value::Int(args.first().map(Value::to_int).unwrap_or(1) * 2)),
                _ => Err(RenderError::MethodFailed {
                    method: method.to_string(),
                    reason: "no such method".to_string(),
                }),
            }
        }
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::from("0").is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::List(vec![]).is_truthy());
        assert!(Value::from("false").is_truthy());
        assert!(Value::Float(0.5).is_truthy());
    }

    #[test]
    fn test_output_formatting() {
        assert_eq!(Value::Bool(true).to_output(), "1");
        assert_eq!(Value::Bool(false).to_output(), "");
        assert_eq!(Value::Float(2.0).to_output(), "2");
        assert_eq!(Value::Float(1.5).to_output(), "1.5");
        assert_eq!(Value::from(vec![1, 2]).to_output(), "Array");
    }

    #[test]
    fn test_loose_and_strict_equality() {
        assert!(Value::from("5").loose_eq(&Value::Int(5)));
        assert!(!Value::from("5").strict_eq(&Value::Int(5)));
        assert!(Value::Null.loose_eq(&Value::Bool(false)));
        assert!(Value::from("abc").loose_eq(&Value::from("abc")));
    }

    #[test]
    fn test_compare_numeric_strings() {
        assert_eq!(Value::from("10").compare(&Value::from("9")), Some(Ordering::Greater));
        assert_eq!(Value::from("b").compare(&Value::from("a")), Some(Ordering::Greater));
        assert_eq!(Value::Int(3).compare(&Value::Float(3.0)), Some(Ordering::Equal));
    }

    #[test]
    fn test_key_access() {
        let list = Value::from(vec!["a", "b"]);
        assert_eq!(list.key("1"), Value::from("b"));
        assert_eq!(list.key_by(&Value::Int(0)), Value::from("a"));
        assert_eq!(list.key("7"), Value::Null);

        let mut entries = IndexMap::new();
        entries.insert("x".to_string(), Value::Int(1));
        assert_eq!(Value::Map(entries).key("x"), Value::Int(1));
    }

    #[test]
    fn test_object_access() {
        let fruit = Value::Object(Rc::new(Fruit));
        assert_eq!(fruit.property("name"), Value::from("apple"));
        assert_eq!(fruit.call_method("slices", &[Value::Int(4)]).unwrap(), Value::Int(8));
        assert!(Value::Int(1).call_method("slices", &[]).is_err());
    }

    #[test]
    fn test_from_json() {
        let value = Value::from(serde_json::json!({"list": [1, 2.5, "x"], "flag": true}));
        assert_eq!(value.key("flag"), Value::Bool(true));
        assert_eq!(value.key("list").count(), 3);
        assert_eq!(value.key("list").key("1"), Value::Float(2.5));
    }

    #[test]
    fn test_lenient_number_coercion() {
        assert_eq!(Value::from("12abc").to_number(), Number::Int(12));
        assert_eq!(Value::from("abc").to_number(), Number::Int(0));
        assert_eq!(Value::Null.to_int(), 0);
    }
}
