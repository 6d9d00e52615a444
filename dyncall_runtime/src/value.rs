//! Dynamically typed values passed as receivers and arguments.
//!
//! Scalars are stored inline; heap values are reference counted so a
//! receiver can be shared across threads dispatching through the same
//! call site.

use crate::object::class::{Class, Instance};
use crate::object::foreign::ForeignObject;
use crate::object::type_id::TypeId;
use std::fmt;
use std::sync::Arc;

/// A runtime value.
#[derive(Clone, Default)]
pub enum Value {
    /// Absence of a value.
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    /// Immutable byte sequence (a foreign `byte[]`-like receiver).
    Bytes(Arc<[u8]>),
    /// Instance of a user class; knows its own dispatch table.
    Object(Arc<Instance>),
    /// Opaque host object described by a foreign type.
    Foreign(Arc<ForeignObject>),
    /// A class used as a receiver for static and constructor calls.
    Class(Arc<Class>),
}

impl Value {
    /// Create a string value.
    #[inline]
    pub fn str(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }

    /// Create a byte sequence value.
    #[inline]
    pub fn bytes(bytes: &[u8]) -> Self {
        Value::Bytes(Arc::from(bytes))
    }

    /// Runtime type of this value.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        match self {
            Value::None => TypeId::NONE,
            Value::Bool(_) => TypeId::BOOL,
            Value::Int(_) => TypeId::INT,
            Value::Float(_) => TypeId::FLOAT,
            Value::Str(_) => TypeId::STR,
            Value::Bytes(_) => TypeId::BYTES,
            Value::Object(instance) => instance.class().type_id(),
            Value::Foreign(object) => object.foreign_type().type_id(),
            Value::Class(_) => TypeId::CLASS,
        }
    }

    /// Human-readable type name for diagnostics.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Object(instance) => instance.class().name(),
            Value::Foreign(object) => object.foreign_type().name(),
            other => other.type_id().builtin_name().unwrap_or("object"),
        }
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[inline]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(&**s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(&**b),
            _ => None,
        }
    }

    #[inline]
    pub fn as_object(&self) -> Option<&Arc<Instance>> {
        match self {
            Value::Object(instance) => Some(instance),
            _ => None,
        }
    }

    #[inline]
    pub fn as_foreign(&self) -> Option<&Arc<ForeignObject>> {
        match self {
            Value::Foreign(object) => Some(object),
            _ => None,
        }
    }

    #[inline]
    pub fn as_class(&self) -> Option<&Arc<Class>> {
        match self {
            Value::Class(class) => Some(class),
            _ => None,
        }
    }
}

/// Scalars and strings compare by value; heap objects by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Foreign(a), Value::Foreign(b)) => Arc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => write!(f, "bytes{b:?}"),
            Value::Object(instance) => write!(f, "<{} object>", instance.class().name()),
            Value::Foreign(object) => write!(f, "<foreign {}>", object.foreign_type().name()),
            Value::Class(class) => write!(f, "<class {}>", class.name()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_type_ids() {
        assert_eq!(Value::None.type_id(), TypeId::NONE);
        assert_eq!(Value::Int(1).type_id(), TypeId::INT);
        assert_eq!(Value::str("a").type_id(), TypeId::STR);
        assert_eq!(Value::bytes(&[1, 2]).type_id(), TypeId::BYTES);
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Float(1.5).type_name(), "float");
        assert_eq!(Value::bytes(&[]).type_name(), "bytes");
    }

    #[test]
    fn test_value_equality() {
        assert_eq!(Value::Int(3), Value::Int(3));
        assert_ne!(Value::Int(3), Value::Float(3.0));
        assert_eq!(Value::bytes(&[1, 2]), Value::bytes(&[1, 2]));
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::from(7i64).as_int(), Some(7));
        assert_eq!(Value::from("hi").as_str(), Some("hi"));
        assert!(Value::Int(1).as_bytes().is_none());
        assert!(Value::default().is_none());
    }
}
