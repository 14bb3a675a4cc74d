//! Values held by reactive objects.
//!
//! [`Value`] is the dynamically typed payload of a
//! [`ReactiveObject`](super::ReactiveObject). Comparison between values uses
//! same-value semantics: `NaN` equals `NaN`, `+0.0` and `-0.0` differ, and
//! objects compare by identity.

use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use super::object::ReactiveObject;
use super::runtime::TargetId;

/// A key inside a reactive object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A named field.
    Name(Rc<str>),
    /// An integer index.
    Index(usize),
    /// Reserved key tracked by key enumeration. Triggered whenever a key is
    /// added to or removed from an object.
    Iterate,
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => f.write_str(name),
            Key::Index(index) => write!(f, "[{index}]"),
            Key::Iterate => f.write_str("<iterate>"),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(Rc::from(name))
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(Rc::from(name))
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}

/// A value stored in a reactive object.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Object(ReactiveObject),
}

impl Value {
    /// Short name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ReactiveObject> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same_value(other)
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

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<ReactiveObject> for Value {
    fn from(object: ReactiveObject) -> Self {
        Value::Object(object)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Values a watcher can observe.
///
/// `same_value` decides whether a watcher callback is suppressed;
/// `traverse` is used by deep watchers to read (and therefore track) every
/// reactive slot reachable from the value.
pub trait WatchValue: Clone + 'static {
    /// Same-value comparison.
    fn same_value(&self, other: &Self) -> bool;

    /// Read every reactive slot reachable from `self`. `seen` guards against
    /// cycles between objects.
    fn traverse(&self, _seen: &mut HashSet<TargetId>) {}
}

macro_rules! impl_watch_value_eq {
    ($($ty:ty),* $(,)?) => {
        $(
            impl WatchValue for $ty {
                fn same_value(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

impl_watch_value_eq!(
    (), bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, String,
    &'static str, Rc<str>,
);

impl WatchValue for f64 {
    fn same_value(&self, other: &Self) -> bool {
        (self.is_nan() && other.is_nan()) || self.to_bits() == other.to_bits()
    }
}

impl WatchValue for f32 {
    fn same_value(&self, other: &Self) -> bool {
        (self.is_nan() && other.is_nan()) || self.to_bits() == other.to_bits()
    }
}

impl<T: WatchValue> WatchValue for Option<T> {
    fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.same_value(b),
            (None, None) => true,
            _ => false,
        }
    }

    fn traverse(&self, seen: &mut HashSet<TargetId>) {
        if let Some(value) = self {
            value.traverse(seen);
        }
    }
}

impl<T: WatchValue> WatchValue for Vec<T> {
    fn same_value(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a.same_value(b))
    }

    fn traverse(&self, seen: &mut HashSet<TargetId>) {
        for value in self {
            value.traverse(seen);
        }
    }
}

impl<A: WatchValue, B: WatchValue> WatchValue for (A, B) {
    fn same_value(&self, other: &Self) -> bool {
        self.0.same_value(&other.0) && self.1.same_value(&other.1)
    }

    fn traverse(&self, seen: &mut HashSet<TargetId>) {
        self.0.traverse(seen);
        self.1.traverse(seen);
    }
}

impl WatchValue for Value {
    fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a.same_value(b),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    fn traverse(&self, seen: &mut HashSet<TargetId>) {
        if let Value::Object(object) = self {
            object.traverse(seen);
        }
    }
}

impl WatchValue for ReactiveObject {
    fn same_value(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }

    fn traverse(&self, seen: &mut HashSet<TargetId>) {
        if !seen.insert(self.id()) {
            return;
        }
        for key in self.keys() {
            self.get(key).traverse(seen);
        }
    }
}
