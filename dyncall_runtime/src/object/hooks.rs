//! Notifications for runtime type redefinition.
//!
//! The registry reports every method-table mutation to its listeners.
//! Dispatch caches subscribe here and drop whatever they cached; guards
//! themselves never consult this state.

use crate::object::type_id::TypeId;
use std::sync::Arc;

/// What changed on a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// An instance method was added or replaced.
    MethodDefined,
    /// A static method was added or replaced.
    StaticDefined,
    /// An instance method was removed.
    MethodRemoved,
}

/// A single redefinition event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMutation {
    pub type_id: TypeId,
    pub name: Arc<str>,
    pub kind: MutationKind,
}

impl TypeMutation {
    pub fn new(type_id: TypeId, name: &str, kind: MutationKind) -> Self {
        Self {
            type_id,
            name: Arc::from(name),
            kind,
        }
    }
}

/// Receives type redefinition events.
///
/// Called synchronously on the thread that performed the redefinition,
/// after the new method table has been published.
pub trait TypeMutationListener: Send + Sync {
    fn on_type_mutated(&self, mutation: &TypeMutation);
}
