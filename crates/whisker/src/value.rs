//! Runtime values seen by templates.
//!
//! The [`Value`] enum is what every lookup produces and every helper
//! parameter evaluates to. Render data is converted into a `Value` once per
//! render call (usually through [`Value::from_serialize`]); collections are
//! reference counted so resolved values can be cloned freely while walking
//! the scope stack.
//!
//! # Truthiness
//!
//! | Value | Falsy when |
//! |-------|------------|
//! | `Null` | always |
//! | `Bool` | `false` |
//! | `Number` | zero |
//! | `String` | empty |
//! | `List` | empty |
//! | `Map`, `Function` | never |
//! | `Object` | [`Object::is_truthy`] returns false |

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::ResolveError;

/// Sentinel returned by an `apply` transform to drop an element from
/// iteration in the `each` helper.
pub const SKIP_RESULT: &str = "whisker.each.skipResult";

/// A template value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absent, null, or undefined.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Numeric value.
    Number(Number),
    /// String value.
    String(Arc<str>),
    /// Ordered sequence of values.
    List(Arc<Vec<Value>>),
    /// String-keyed mapping, ordered by key.
    Map(Arc<BTreeMap<String, Value>>),
    /// Single-argument transform.
    Function(Function),
    /// Opaque host object.
    Object(Arc<dyn Object>),
}

impl Value {
    /// Converts any serializable data into a template value.
    pub fn from_serialize<T: Serialize + ?Sized>(data: &T) -> Result<Value, serde_json::Error> {
        serde_json::to_value(data).map(Value::from)
    }

    /// Builds the `each` skip sentinel.
    pub fn skip() -> Value {
        Value::String(Arc::from(SKIP_RESULT))
    }

    /// Returns `true` if this is the `each` skip sentinel.
    pub fn is_skip(&self) -> bool {
        self.as_str() == Some(SKIP_RESULT)
    }

    /// Wraps a host object.
    pub fn object(object: impl Object + 'static) -> Value {
        Value::Object(Arc::new(object))
    }

    /// Wraps a transform function.
    pub fn function<F>(f: F) -> Value
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        Value::Function(Function::new(f))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => !n.is_zero(),
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(_) | Value::Function(_) => true,
            Value::Object(object) => object.is_truthy(),
        }
    }

    pub fn is_falsy(&self) -> bool {
        !self.is_truthy()
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(&**map),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Returns the elements of an iterable value.
    ///
    /// Lists yield their items; host objects yield [`Object::elements`].
    /// Every other value is not iterable.
    pub fn elements(&self) -> Option<Cow<'_, [Value]>> {
        match self {
            Value::List(items) => Some(Cow::Borrowed(items.as_slice())),
            Value::Object(object) => object.elements().map(Cow::Owned),
            _ => None,
        }
    }

    /// Name of the value's kind, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Function(_) => "function",
            Value::Object(_) => "object",
        }
    }

    /// Text form written by variable tags.
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            Value::Null | Value::Function(_) => Cow::Borrowed(""),
            Value::Bool(true) => Cow::Borrowed("true"),
            Value::Bool(false) => Cow::Borrowed("false"),
            Value::Number(n) => Cow::Owned(n.to_string()),
            Value::String(s) => Cow::Borrowed(&**s),
            Value::List(_) | Value::Map(_) => Cow::Owned(self.to_json().to_string()),
            Value::Object(object) => Cow::Owned(object.to_text()),
        }
    }

    /// Converts back into JSON; functions become `null`, objects their text.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null | Value::Function(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => n.to_json(),
            Value::String(s) => serde_json::Value::String(s.to_string()),
            Value::List(items) => items.iter().map(Value::to_json).collect(),
            Value::Map(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Object(object) => serde_json::Value::String(object.to_text()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// Numeric value.
///
/// Integers keep their signedness so large unsigned values survive the trip
/// through `serde_json`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    I64(i64),
    U64(u64),
    F64(f64),
}

impl Number {
    pub fn is_zero(self) -> bool {
        match self {
            Number::I64(n) => n == 0,
            Number::U64(n) => n == 0,
            Number::F64(n) => n == 0.0,
        }
    }

    /// Converts to `usize` when the number is a non-negative integer.
    pub fn as_usize(self) -> Option<usize> {
        match self {
            Number::I64(n) => usize::try_from(n).ok(),
            Number::U64(n) => usize::try_from(n).ok(),
            Number::F64(_) => None,
        }
    }

    pub fn to_f64(self) -> f64 {
        match self {
            Number::I64(n) => n as f64,
            Number::U64(n) => n as f64,
            Number::F64(n) => n,
        }
    }

    fn to_json(self) -> serde_json::Value {
        match self {
            Number::I64(n) => serde_json::Value::from(n),
            Number::U64(n) => serde_json::Value::from(n),
            Number::F64(n) => serde_json::Number::from_f64(n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::I64(n) => write!(f, "{}", n),
            Number::U64(n) => write!(f, "{}", n),
            Number::F64(n) => write!(f, "{}", n),
        }
    }
}

/// A single-argument transform callable from templates.
#[derive(Clone)]
pub struct Function(Arc<dyn Fn(&Value) -> Value + Send + Sync>);

impl Function {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn apply(&self, value: &Value) -> Value {
        (self.0)(value)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Function")
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// An opaque host object exposed to templates.
///
/// Members are looked up by name through the
/// [`ObjectResolver`](crate::resolver::ObjectResolver). A failing lookup is
/// reported as a [`ResolveError`] and downgraded to "not found".
///
/// # Example
///
/// ```rust
/// use whisker::{Object, ResolveError, Value};
///
/// #[derive(Debug)]
/// struct Clock { hour: u32 }
///
/// impl Object for Clock {
///     fn get(&self, name: &str) -> Result<Option<Value>, ResolveError> {
///         match name {
///             "hour" => Ok(Some(Value::from(self.hour))),
///             "secret" => Err(ResolveError::new("access denied")),
///             _ => Ok(None),
///         }
///     }
/// }
/// ```
pub trait Object: fmt::Debug + Send + Sync {
    /// Looks up a named member.
    fn get(&self, name: &str) -> Result<Option<Value>, ResolveError>;

    /// Text written when the object itself is rendered.
    fn to_text(&self) -> String {
        format!("{:?}", self)
    }

    fn is_truthy(&self) -> bool {
        true
    }

    /// Elements, for objects that behave like collections.
    fn elements(&self) -> Option<Vec<Value>> {
        None
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Number(Number::I64(i))
                } else if let Some(u) = n.as_u64() {
                    Value::Number(Number::U64(u))
                } else {
                    Value::Number(Number::F64(n.as_f64().unwrap_or(f64::NAN)))
                }
            }
            serde_json::Value::String(s) => Value::String(Arc::from(s)),
            serde_json::Value::Array(items) => {
                Value::List(Arc::new(items.into_iter().map(Value::from).collect()))
            }
            serde_json::Value::Object(map) => Value::Map(Arc::new(
                map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            )),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! value_from_int {
    ($variant:ident, $target:ty, $($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(n: $t) -> Self {
                    Value::Number(Number::$variant(n as $target))
                }
            }
        )*
    };
}

value_from_int!(I64, i64, i8, i16, i32, i64, isize);
value_from_int!(U64, u64, u8, u16, u32, u64, usize);

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(Number::F64(n))
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Number(Number::F64(n as f64))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(Arc::new(items.into_iter().map(Into::into).collect()))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<V: Into<Value>> From<BTreeMap<String, V>> for Value {
    fn from(map: BTreeMap<String, V>) -> Self {
        Value::Map(Arc::new(
            map.into_iter().map(|(k, v)| (k, v.into())).collect(),
        ))
    }
}

impl<V: Into<Value>> From<HashMap<String, V>> for Value {
    fn from(map: HashMap<String, V>) -> Self {
        Value::Map(Arc::new(
            map.into_iter().map(|(k, v)| (k, v.into())).collect(),
        ))
    }
}

impl<V: Into<Value>> FromIterator<V> for Value {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Value::List(Arc::new(iter.into_iter().map(Into::into).collect()))
    }
}
