//! Call descriptors: the immutable description of one call expression.

use dyncall_runtime::{TypeId, Value};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Method name used for constructor descriptors.
pub const CONSTRUCTOR_NAME: &str = "<init>";

/// How a call expression dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// `receiver.name(args)`
    Instance,
    /// `Class.name(args)`
    Static,
    /// `new Class(args)`
    Constructor,
    /// `lhs <op> rhs`, dispatched as `lhs.name(rhs)`
    Operator,
}

impl CallKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            CallKind::Instance => "instance",
            CallKind::Static => "static",
            CallKind::Constructor => "constructor",
            CallKind::Operator => "operator",
        }
    }
}

/// Statically declared kind of one argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    /// Type unknown until run time.
    Dynamic,
    /// Declared with a concrete type.
    Typed(TypeId),
}

/// Immutable description of a call expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallDescriptor {
    name: Arc<str>,
    params: SmallVec<[ArgKind; 4]>,
    kind: CallKind,
}

impl CallDescriptor {
    /// Create a descriptor with no declared parameter shape.
    pub fn new(name: &str, kind: CallKind) -> Self {
        Self {
            name: Arc::from(name),
            params: SmallVec::new(),
            kind,
        }
    }

    /// `receiver.name(...)`
    pub fn instance(name: &str) -> Self {
        Self::new(name, CallKind::Instance)
    }

    /// `Class.name(...)`
    pub fn static_call(name: &str) -> Self {
        Self::new(name, CallKind::Static)
    }

    /// `new Class(...)`
    pub fn constructor() -> Self {
        Self::new(CONSTRUCTOR_NAME, CallKind::Constructor)
    }

    /// Binary operator dispatched through method `name` (`plus`, `minus`, ...).
    pub fn operator(name: &str) -> Self {
        Self::new(name, CallKind::Operator)
    }

    /// Declare the static argument shape.
    pub fn with_params(mut self, params: impl IntoIterator<Item = ArgKind>) -> Self {
        self.params = params.into_iter().collect();
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> CallKind {
        self.kind
    }

    #[inline]
    pub fn params(&self) -> &[ArgKind] {
        &self.params
    }

    /// Check live arguments against the declared shape.
    ///
    /// An empty shape admits anything; otherwise arity must match and every
    /// typed position must hold a value of exactly that type.
    pub fn admits(&self, args: &[Value]) -> bool {
        if self.params.is_empty() {
            return true;
        }
        self.params.len() == args.len()
            && self.params.iter().zip(args).all(|(kind, arg)| match kind {
                ArgKind::Dynamic => true,
                ArgKind::Typed(expected) => arg.type_id() == *expected,
            })
    }
}

impl fmt::Display for CallDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.kind.as_str())
    }
}
