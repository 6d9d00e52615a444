//! Invocable methods and the immutable tables that hold them.
//!
//! A `MethodTable` is never mutated in place. Redefining a method builds a
//! new table and swaps it into the owning class, so a table's pointer
//! identity doubles as a cheap "nothing changed" witness for guards.

use crate::error::RuntimeResult;
use crate::object::type_id::TypeId;
use crate::value::Value;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

// =============================================================================
// Method Flags
// =============================================================================

bitflags::bitflags! {
    /// Flags describing how a method is bound.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MethodFlags: u8 {
        /// Class-level method; receiver is the class value.
        const STATIC = 1 << 0;
        /// Initializer run on a freshly allocated instance.
        const CONSTRUCTOR = 1 << 1;
    }
}

// =============================================================================
// Parameter Types
// =============================================================================

/// Declared type of a single method parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    /// Accepts any value.
    Any,
    /// Accepts values of exactly this type, or instances of subclasses
    /// when the type is a user class.
    Exact(TypeId),
}

impl ParamType {
    /// Score for an untyped parameter.
    pub const SCORE_ANY: u32 = 0;
    /// Score for a parameter satisfied through a superclass.
    pub const SCORE_WIDENED: u32 = 1;
    /// Score for an exact type match.
    pub const SCORE_EXACT: u32 = 2;

    /// How specifically this parameter accepts `arg`, or `None` if it
    /// does not accept it at all.
    pub fn score(self, arg: &Value) -> Option<u32> {
        match self {
            ParamType::Any => Some(Self::SCORE_ANY),
            ParamType::Exact(expected) if arg.type_id() == expected => Some(Self::SCORE_EXACT),
            ParamType::Exact(expected) => match arg {
                Value::Object(instance) if instance.class().is_subclass_of(expected) => {
                    Some(Self::SCORE_WIDENED)
                }
                _ => None,
            },
        }
    }
}

// =============================================================================
// Method
// =============================================================================

/// Native body of a method: `(receiver, arguments) -> result`.
pub type MethodBody = Arc<dyn Fn(&Value, &[Value]) -> RuntimeResult<Value> + Send + Sync>;

/// A concrete invocable method.
#[derive(Clone)]
pub struct Method {
    name: Arc<str>,
    params: SmallVec<[ParamType; 4]>,
    flags: MethodFlags,
    body: MethodBody,
}

impl Method {
    /// Create an instance method.
    pub fn new<F>(name: &str, params: impl IntoIterator<Item = ParamType>, body: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> RuntimeResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            params: params.into_iter().collect(),
            flags: MethodFlags::empty(),
            body: Arc::new(body),
        }
    }

    /// Replace the binding flags.
    pub fn with_flags(mut self, flags: MethodFlags) -> Self {
        self.flags = flags;
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn params(&self) -> &[ParamType] {
        &self.params
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    #[inline]
    pub fn flags(&self) -> MethodFlags {
        self.flags
    }

    /// Check whether both methods declare the same parameter list.
    #[inline]
    pub fn same_signature(&self, other: &Method) -> bool {
        self.params == other.params
    }

    /// Total match score for `args`, or `None` if the method cannot accept them.
    pub fn match_score(&self, args: &[Value]) -> Option<u32> {
        if args.len() != self.params.len() {
            return None;
        }
        self.params
            .iter()
            .zip(args)
            .try_fold(0u32, |total, (param, arg)| Some(total + param.score(arg)?))
    }

    /// Run the method body.
    #[inline]
    pub fn invoke(&self, receiver: &Value, args: &[Value]) -> RuntimeResult<Value> {
        (self.body)(receiver, args)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Method Table
// =============================================================================

/// Overloads registered under one name.
pub type Overloads = SmallVec<[Arc<Method>; 2]>;

/// Immutable name → overloads map.
#[derive(Debug, Clone, Default)]
pub struct MethodTable {
    methods: FxHashMap<Arc<str>, Overloads>,
}

impl MethodTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from a list of methods.
    pub fn from_methods(methods: impl IntoIterator<Item = Method>) -> Self {
        let mut table = Self::new();
        for method in methods {
            table.insert(Arc::new(method));
        }
        table
    }

    /// Insert in place; only used while a table is still private to its builder.
    fn insert(&mut self, method: Arc<Method>) {
        let overloads = self.methods.entry(Arc::from(method.name())).or_default();
        match overloads.iter_mut().find(|m| m.same_signature(&method)) {
            Some(existing) => *existing = method,
            None => overloads.push(method),
        }
    }

    /// Copy of this table with `method` added, replacing any overload with
    /// the same signature.
    pub fn with_method(&self, method: Method) -> Self {
        let mut table = self.clone();
        table.insert(Arc::new(method));
        table
    }

    /// Copy of this table without any overload named `name`.
    pub fn without(&self, name: &str) -> Self {
        let mut table = self.clone();
        table.methods.remove(name);
        table
    }

    /// All overloads registered under `name`.
    #[inline]
    pub fn lookup(&self, name: &str) -> &[Arc<Method>] {
        self.methods.get(name).map(|o| o.as_slice()).unwrap_or(&[])
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Check if `name` has more than one overload.
    #[inline]
    pub fn is_overloaded(&self, name: &str) -> bool {
        self.lookup(name).len() > 1
    }

    /// Number of distinct method names.
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}
