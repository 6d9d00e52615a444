//! Resolved targets: immutable (guard, invocable) bindings cached by a site.
//!
//! Each target is produced by a slow-path resolution and never changes
//! afterwards. A call site replaces its target wholesale on a miss.
//!
//! # Site Variants
//!
//! ```text
//! SelfDescribingInstance  receiver.method()   guard: dispatch table identity + arg types
//! ForeignInstance         host.method()       guard: exact receiver/arg types
//! StaticTarget            Class.method()      guard: same class value + arg types
//! ConstructorTarget       new Class(args)     guard: same class + arg types
//! SpecializedAccessor     bytes[i], bytes.size()   guard: byte sequence (+ int)
//! Operator                a + b               guard: exact operand types
//! ```

use crate::guard::{Guard, TypeShape, shape_of};
use dyncall_runtime::{
    Class, Instance, Method, RuntimeError, RuntimeResult, TypeId, Value,
};
use std::fmt;
use std::sync::Arc;

// =============================================================================
// Site Variant
// =============================================================================

/// Dispatch strategy a resolved target specializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteVariant {
    SelfDescribingInstance,
    ForeignInstance,
    StaticTarget,
    ConstructorTarget,
    SpecializedAccessor,
    Operator,
}

impl SiteVariant {
    pub const fn as_str(self) -> &'static str {
        match self {
            SiteVariant::SelfDescribingInstance => "self-describing",
            SiteVariant::ForeignInstance => "foreign",
            SiteVariant::StaticTarget => "static",
            SiteVariant::ConstructorTarget => "constructor",
            SiteVariant::SpecializedAccessor => "accessor",
            SiteVariant::Operator => "operator",
        }
    }
}

impl fmt::Display for SiteVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Byte Sequence Accessors
// =============================================================================

/// Direct operations on byte sequences that bypass method tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessorOp {
    /// `bytes.size()` / `bytes.length()`
    Length,
    /// `bytes.getAt(index)`, negative indices count from the end.
    GetAt,
}

impl AccessorOp {
    /// Pick an accessor for a call on a byte sequence, if one applies.
    pub fn for_call(name: &str, args: &[Value]) -> Option<Self> {
        match (name, args) {
            ("size" | "length", []) => Some(AccessorOp::Length),
            ("getAt", [Value::Int(_)]) => Some(AccessorOp::GetAt),
            _ => None,
        }
    }

    fn apply(self, receiver: &Value, args: &[Value]) -> RuntimeResult<Value> {
        let bytes = receiver
            .as_bytes()
            .ok_or_else(|| RuntimeError::type_mismatch("bytes", receiver))?;
        match self {
            AccessorOp::Length => Ok(Value::Int(bytes.len() as i64)),
            AccessorOp::GetAt => {
                let index = match args {
                    [Value::Int(index)] => *index,
                    [other] => return Err(RuntimeError::type_mismatch("int", other)),
                    _ => return Err(RuntimeError::raised("getAt expects exactly one index")),
                };
                let slot = normalize_index(index, bytes.len())?;
                Ok(Value::Int(i64::from(bytes[slot])))
            }
        }
    }
}

/// Map a possibly negative index onto `0..len`.
///
/// `index < 0` counts from the end (`-1` is the last element). Anything
/// still outside the sequence afterwards is `IndexOutOfRange`; there is no
/// clamping.
pub fn normalize_index(index: i64, len: usize) -> RuntimeResult<usize> {
    let len_i = i64::try_from(len).unwrap_or(i64::MAX);
    let adjusted = if index < 0 { index + len_i } else { index };
    if (0..len_i).contains(&adjusted) {
        Ok(adjusted as usize)
    } else {
        Err(RuntimeError::IndexOutOfRange { index, len })
    }
}

// =============================================================================
// Binary Operators
// =============================================================================

/// Builtin arithmetic on numeric (and string) operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    /// Three-way comparison returning -1, 0 or 1.
    CompareTo,
}

impl BinaryOp {
    /// Map an operator method name to a builtin operation.
    pub fn from_method_name(name: &str) -> Option<Self> {
        match name {
            "plus" => Some(BinaryOp::Add),
            "minus" => Some(BinaryOp::Sub),
            "multiply" => Some(BinaryOp::Mul),
            "div" => Some(BinaryOp::Div),
            "compareTo" => Some(BinaryOp::CompareTo),
            _ => None,
        }
    }

    /// Check whether the builtin handles this operand type pair.
    pub fn supports(self, lhs: TypeId, rhs: TypeId) -> bool {
        let numeric = |t: TypeId| t == TypeId::INT || t == TypeId::FLOAT;
        match self {
            BinaryOp::Add | BinaryOp::CompareTo if lhs == TypeId::STR && rhs == TypeId::STR => true,
            _ => numeric(lhs) && numeric(rhs),
        }
    }

    fn apply(self, lhs: &Value, rhs: &Value) -> RuntimeResult<Value> {
        match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => self.apply_int(*a, *b),
            (Value::Int(a), Value::Float(b)) => self.apply_float(*a as f64, *b),
            (Value::Float(a), Value::Int(b)) => self.apply_float(*a, *b as f64),
            (Value::Float(a), Value::Float(b)) => self.apply_float(*a, *b),
            (Value::Str(a), Value::Str(b)) => match self {
                BinaryOp::Add => Ok(Value::str(&format!("{a}{b}"))),
                BinaryOp::CompareTo => Ok(Value::Int(a.cmp(b) as i64)),
                _ => Err(RuntimeError::type_mismatch("number", lhs)),
            },
            _ => Err(RuntimeError::type_mismatch("number", lhs)),
        }
    }

    fn apply_int(self, a: i64, b: i64) -> RuntimeResult<Value> {
        let overflow = || RuntimeError::raised("integer overflow");
        match self {
            BinaryOp::Add => a.checked_add(b).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Sub => a.checked_sub(b).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Mul => a.checked_mul(b).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Div if b == 0 => Err(RuntimeError::raised("division by zero")),
            BinaryOp::Div => a.checked_div(b).map(Value::Int).ok_or_else(overflow),
            BinaryOp::CompareTo => Ok(Value::Int(a.cmp(&b) as i64)),
        }
    }

    fn apply_float(self, a: f64, b: f64) -> RuntimeResult<Value> {
        match self {
            BinaryOp::Add => Ok(Value::Float(a + b)),
            BinaryOp::Sub => Ok(Value::Float(a - b)),
            BinaryOp::Mul => Ok(Value::Float(a * b)),
            BinaryOp::Div => Ok(Value::Float(a / b)),
            BinaryOp::CompareTo => a
                .partial_cmp(&b)
                .map(|o| Value::Int(o as i64))
                .ok_or_else(|| RuntimeError::raised("cannot compare NaN")),
        }
    }
}

// =============================================================================
// Invocable
// =============================================================================

/// What a target actually runs once its guard accepts.
#[derive(Debug, Clone)]
pub enum Invocable {
    /// A method from a class, foreign or builtin method table.
    Method(Arc<Method>),
    /// Allocate an instance of `class`, then run `init` on it.
    Constructor { class: Arc<Class>, init: Arc<Method> },
    Accessor(AccessorOp),
    Operator(BinaryOp),
}

// =============================================================================
// Resolved Target
// =============================================================================

/// Immutable result of a slow-path resolution.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    /// Runtime type of the receiver the target was resolved for.
    owner: TypeId,
    variant: SiteVariant,
    guard: Guard,
    invocable: Invocable,
    /// Argument types observed at resolution.
    param_types: TypeShape,
}

impl ResolvedTarget {
    /// Assemble a target from explicit parts.
    ///
    /// Resolvers normally use the variant-specific constructors below, which
    /// derive a guard consistent with the variant.
    pub fn from_parts(
        owner: TypeId,
        variant: SiteVariant,
        guard: Guard,
        invocable: Invocable,
        param_types: TypeShape,
    ) -> Self {
        Self {
            owner,
            variant,
            guard,
            invocable,
            param_types,
        }
    }

    /// Instance method on a self-describing object.
    pub fn self_describing(instance: &Instance, method: Arc<Method>, args: &[Value]) -> Self {
        let class = instance.class();
        let param_types = shape_of(args);
        Self {
            owner: class.type_id(),
            variant: SiteVariant::SelfDescribingInstance,
            guard: Guard::DispatchTable {
                table: class.dispatch_table(),
                arg_types: param_types.clone(),
            },
            invocable: Invocable::Method(method),
            param_types,
        }
    }

    /// Instance method on a foreign or builtin receiver.
    pub fn foreign(receiver: &Value, method: Arc<Method>, args: &[Value]) -> Self {
        let param_types = shape_of(args);
        Self {
            owner: receiver.type_id(),
            variant: SiteVariant::ForeignInstance,
            guard: Guard::ExactTypes {
                receiver: receiver.type_id(),
                arg_types: param_types.clone(),
            },
            invocable: Invocable::Method(method),
            param_types,
        }
    }

    /// Static method on a class receiver.
    pub fn static_method(class: &Arc<Class>, method: Arc<Method>, args: &[Value]) -> Self {
        let param_types = shape_of(args);
        Self {
            owner: TypeId::CLASS,
            variant: SiteVariant::StaticTarget,
            guard: Guard::SameClass {
                class: Arc::clone(class),
                arg_types: param_types.clone(),
            },
            invocable: Invocable::Method(method),
            param_types,
        }
    }

    /// Constructor on a class receiver.
    pub fn constructor(class: &Arc<Class>, init: Arc<Method>, args: &[Value]) -> Self {
        let param_types = shape_of(args);
        Self {
            owner: TypeId::CLASS,
            variant: SiteVariant::ConstructorTarget,
            guard: Guard::Constructor {
                class: Arc::clone(class),
                arg_types: param_types.clone(),
            },
            invocable: Invocable::Constructor {
                class: Arc::clone(class),
                init,
            },
            param_types,
        }
    }

    /// Direct byte-sequence accessor.
    pub fn accessor(op: AccessorOp) -> Self {
        let param_types = match op {
            AccessorOp::Length => TypeShape::new(),
            AccessorOp::GetAt => TypeShape::from_slice(&[TypeId::INT]),
        };
        Self {
            owner: TypeId::BYTES,
            variant: SiteVariant::SpecializedAccessor,
            guard: Guard::ByteSequence {
                index_arg: op == AccessorOp::GetAt,
            },
            invocable: Invocable::Accessor(op),
            param_types,
        }
    }

    /// Builtin binary operator on exact operand types.
    pub fn operator(op: BinaryOp, lhs: TypeId, rhs: TypeId) -> Self {
        Self {
            owner: lhs,
            variant: SiteVariant::Operator,
            guard: Guard::Operands { lhs, rhs },
            invocable: Invocable::Operator(op),
            param_types: TypeShape::from_slice(&[rhs]),
        }
    }

    #[inline]
    pub fn owner(&self) -> TypeId {
        self.owner
    }

    #[inline]
    pub fn variant(&self) -> SiteVariant {
        self.variant
    }

    #[inline]
    pub fn guard(&self) -> &Guard {
        &self.guard
    }

    #[inline]
    pub fn invocable(&self) -> &Invocable {
        &self.invocable
    }

    #[inline]
    pub fn param_types(&self) -> &[TypeId] {
        &self.param_types
    }

    /// Run the target without consulting its guard.
    pub fn invoke(&self, receiver: &Value, args: &[Value]) -> RuntimeResult<Value> {
        match &self.invocable {
            Invocable::Method(method) => method.invoke(receiver, args),
            Invocable::Constructor { class, init } => {
                let instance = Value::Object(Arc::new(Instance::new(Arc::clone(class))));
                init.invoke(&instance, args)?;
                Ok(instance)
            }
            Invocable::Accessor(op) => op.apply(receiver, args),
            Invocable::Operator(op) => match args {
                [rhs] => op.apply(receiver, rhs),
                _ => Err(RuntimeError::raised("binary operator expects one operand")),
            },
        }
    }
}
