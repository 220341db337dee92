use std::{fmt, sync::Arc};

use crate::{Members, ObjectRef};

/// A dynamic value as seen by a property read.
///
/// Receivers, roles and member names are all values. Only `Object` carries a
/// role list; `Foreign` wraps host objects that expose members through the
/// [`Members`] trait.
///
/// Objects are reference counted. A role cycle, such as an object playing
/// itself as a role, is never collected.
#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Str(Arc<str>),
    Object(ObjectRef),
    Foreign(Arc<dyn Members>),
}

impl Value {
    pub fn str(value: &str) -> Self {
        Value::Str(Arc::from(value))
    }

    pub fn foreign(host: impl Members + 'static) -> Self {
        Value::Foreign(Arc::new(host))
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Identity used by cache guards.
    ///
    /// Scalars and strings compare by value, objects and host objects by
    /// reference.
    pub fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => Arc::ptr_eq(a, b) || a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Foreign(a), Value::Foreign(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.is_identical(other)
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

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::str(value)
    }
}

impl From<ObjectRef> for Value {
    fn from(value: ObjectRef) -> Self {
        Value::Object(value)
    }
}

// objects may hold themselves as roles, so never recurse into them here
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Str(value) => write!(f, "{value:?}"),
            Value::Object(object) => write!(f, "Object@{:p}", Arc::as_ptr(object)),
            Value::Foreign(host) => write!(f, "Foreign({host:?})"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(value) => write!(f, "{value}"),
            Value::Object(_) => write!(f, "Object"),
            other => write!(f, "{other:?}"),
        }
    }
}
