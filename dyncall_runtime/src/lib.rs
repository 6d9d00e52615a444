//! Runtime object model for call-site cached dynamic dispatch.
//!
//! This crate provides:
//! - Dynamically typed values (`Value`) and runtime type ids
//! - User classes with swappable method tables and self-describing instances
//! - Foreign (host) types and objects
//! - A type registry that allocates ids and broadcasts redefinitions
//! - The error type shared by method bodies and dispatch

pub mod error;
pub mod object;
pub mod value;

// Re-export commonly used items
pub use error::{RuntimeError, RuntimeResult, describe_args};
pub use object::class::{Class, ClassBuilder, Instance};
pub use object::foreign::{ForeignObject, ForeignType};
pub use object::hooks::{MutationKind, TypeMutation, TypeMutationListener};
pub use object::method::{Method, MethodBody, MethodFlags, MethodTable, Overloads, ParamType};
pub use object::registry::TypeRegistry;
pub use object::type_id::TypeId;
pub use value::Value;
