//! Errors surfaced to the invoker of a dynamic call.
//!
//! Both dispatch failures (no method, ambiguous overloads, inconsistent
//! guards) and failures raised by method bodies travel through the same
//! `RuntimeError` so `invoke` has a single error type.

use crate::value::Value;
use thiserror::Error;

/// Result alias used by method bodies and dispatch.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Error raised while dispatching or executing a dynamic call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// The slow path found no method matching the name and argument shape.
    #[error("no method '{name}' on {receiver} for argument types ({args})")]
    MethodNotFound {
        name: String,
        receiver: String,
        args: String,
    },

    /// The slow path found several equally specific candidates.
    #[error("ambiguous call to '{name}' on {receiver}: {candidates} equally specific candidates")]
    AmbiguousMatch {
        name: String,
        receiver: String,
        candidates: usize,
    },

    /// A freshly installed target rejected the inputs it was resolved for.
    ///
    /// This indicates a defect in a resolver or guard and is never retried.
    #[error("internal error: target for '{name}' at call site {site} rejected its own inputs")]
    GuardInconsistency { site: usize, name: String },

    /// Indexed access outside the sequence after negative-index normalization.
    #[error("index {index} out of range for sequence of length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    /// A method was invoked on `None`.
    #[error("cannot invoke '{name}' on None")]
    NullReceiver { name: String },

    /// A value had a different type than the operation requires.
    #[error("expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// Error raised by a method body.
    #[error("{0}")]
    Raised(String),
}

impl RuntimeError {
    /// Build a `MethodNotFound` describing the live call shape.
    pub fn method_not_found(name: &str, receiver: &Value, args: &[Value]) -> Self {
        Self::MethodNotFound {
            name: name.to_owned(),
            receiver: receiver.type_name().to_owned(),
            args: describe_args(args),
        }
    }

    /// Build an `AmbiguousMatch` for the live receiver.
    pub fn ambiguous(name: &str, receiver: &Value, candidates: usize) -> Self {
        Self::AmbiguousMatch {
            name: name.to_owned(),
            receiver: receiver.type_name().to_owned(),
            candidates,
        }
    }

    /// Build a `TypeMismatch` for an unexpected value.
    pub fn type_mismatch(expected: &str, found: &Value) -> Self {
        Self::TypeMismatch {
            expected: expected.to_owned(),
            found: found.type_name().to_owned(),
        }
    }

    /// Build an error raised from a method body.
    pub fn raised(message: impl Into<String>) -> Self {
        Self::Raised(message.into())
    }

    /// Check if this error came from a defect rather than user input.
    #[inline]
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::GuardInconsistency { .. })
    }
}

/// Render argument types as `int, str, Widget`.
pub fn describe_args(args: &[Value]) -> String {
    args.iter()
        .map(Value::type_name)
        .collect::<Vec<_>>()
        .join(", ")
}
