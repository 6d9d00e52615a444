//! Type registry mapping `TypeId` to classes and foreign types.
//!
//! Provides O(1) lookup of types by id, allocates ids for user types, and
//! is the single entry point for runtime redefinition so every mutation
//! reaches the registered `TypeMutationListener`s.

use crate::error::{RuntimeError, RuntimeResult};
use crate::object::class::{Class, ClassBuilder};
use crate::object::foreign::ForeignType;
use crate::object::hooks::{MutationKind, TypeMutation, TypeMutationListener};
use crate::object::method::{Method, ParamType};
use crate::object::type_id::TypeId;
use crate::value::Value;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::debug;

/// Registry of every class and foreign type known to a runtime.
pub struct TypeRegistry {
    /// User classes by id.
    classes: RwLock<FxHashMap<TypeId, Arc<Class>>>,
    /// Foreign and builtin value types by id.
    foreign: RwLock<FxHashMap<TypeId, Arc<ForeignType>>>,
    /// Redefinition subscribers.
    listeners: RwLock<Vec<Arc<dyn TypeMutationListener>>>,
    /// Counter for generating new TypeIds.
    next_id: AtomicU32,
}

impl TypeRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            classes: RwLock::new(FxHashMap::default()),
            foreign: RwLock::new(FxHashMap::default()),
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU32::new(TypeId::FIRST_USER_TYPE),
        }
    }

    /// Create a registry with method tables for the builtin value kinds.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        for ty in builtin_types() {
            registry.register_foreign(Arc::new(ty));
        }
        registry
    }

    /// Allocate a new TypeId for a user-defined type.
    pub fn allocate_type_id(&self) -> TypeId {
        TypeId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Allocate an id for `builder`, build the class and register it.
    pub fn define_class(&self, builder: ClassBuilder) -> Arc<Class> {
        let class = builder.build(self.allocate_type_id());
        self.classes
            .write()
            .insert(class.type_id(), Arc::clone(&class));
        debug!(class = class.name(), type_id = %class.type_id(), "class defined");
        class
    }

    /// Allocate an id and register a new foreign type.
    pub fn define_foreign_type(
        &self,
        name: &str,
        methods: impl IntoIterator<Item = Method>,
    ) -> Arc<ForeignType> {
        let ty = Arc::new(ForeignType::new(self.allocate_type_id(), name, methods));
        self.register_foreign(Arc::clone(&ty));
        ty
    }

    /// Register a foreign type under its own id, replacing any previous one.
    pub fn register_foreign(&self, ty: Arc<ForeignType>) {
        self.foreign.write().insert(ty.type_id(), ty);
    }

    /// Look up a class by id.
    #[inline]
    pub fn class(&self, type_id: TypeId) -> Option<Arc<Class>> {
        self.classes.read().get(&type_id).cloned()
    }

    /// Look up a foreign or builtin type by id.
    #[inline]
    pub fn foreign_type(&self, type_id: TypeId) -> Option<Arc<ForeignType>> {
        self.foreign.read().get(&type_id).cloned()
    }

    /// Check if a type is registered.
    #[inline]
    pub fn contains(&self, type_id: TypeId) -> bool {
        self.classes.read().contains_key(&type_id) || self.foreign.read().contains_key(&type_id)
    }

    /// Get the number of registered types.
    pub fn len(&self) -> usize {
        self.classes.read().len() + self.foreign.read().len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // =========================================================================
    // Redefinition
    // =========================================================================

    /// Subscribe to redefinition events.
    pub fn add_listener(&self, listener: Arc<dyn TypeMutationListener>) {
        self.listeners.write().push(listener);
    }

    /// Add or replace an instance method on `class` and notify listeners.
    pub fn redefine_method(&self, class: &Class, method: Method) {
        let mutation = TypeMutation::new(class.type_id(), method.name(), MutationKind::MethodDefined);
        class.define_method(method);
        self.notify(&mutation);
    }

    /// Add or replace a static method on `class` and notify listeners.
    pub fn redefine_static(&self, class: &Class, method: Method) {
        let mutation = TypeMutation::new(class.type_id(), method.name(), MutationKind::StaticDefined);
        class.define_static(method);
        self.notify(&mutation);
    }

    /// Remove an instance method from `class` and notify listeners.
    ///
    /// Returns false, without notifying, if the method did not exist.
    pub fn remove_method(&self, class: &Class, name: &str) -> bool {
        if !class.remove_method(name) {
            return false;
        }
        self.notify(&TypeMutation::new(class.type_id(), name, MutationKind::MethodRemoved));
        true
    }

    /// Add or replace a method on a foreign type and notify listeners.
    pub fn redefine_foreign_method(&self, ty: &ForeignType, method: Method) {
        let mutation = TypeMutation::new(ty.type_id(), method.name(), MutationKind::MethodDefined);
        ty.define_method(method);
        self.notify(&mutation);
    }

    fn notify(&self, mutation: &TypeMutation) {
        // Snapshot so listeners may register further listeners.
        let listeners = self.listeners.read().clone();
        debug!(
            type_id = %mutation.type_id,
            name = %mutation.name,
            kind = ?mutation.kind,
            listeners = listeners.len(),
            "type redefined"
        );
        for listener in listeners {
            listener.on_type_mutated(mutation);
        }
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Builtin Types
// =============================================================================

fn expect_str<'a>(receiver: &'a Value) -> RuntimeResult<&'a str> {
    receiver
        .as_str()
        .ok_or_else(|| RuntimeError::type_mismatch("str", receiver))
}

fn expect_int(value: &Value) -> RuntimeResult<i64> {
    value
        .as_int()
        .ok_or_else(|| RuntimeError::type_mismatch("int", value))
}

fn expect_float(value: &Value) -> RuntimeResult<f64> {
    value
        .as_float()
        .ok_or_else(|| RuntimeError::type_mismatch("float", value))
}

/// Method tables for the builtin value kinds.
fn builtin_types() -> Vec<ForeignType> {
    let str_param = [ParamType::Exact(TypeId::STR)];
    vec![
        ForeignType::new(
            TypeId::STR,
            "str",
            [
                Method::new("length", [], |receiver, _| {
                    Ok(Value::Int(expect_str(receiver)?.chars().count() as i64))
                }),
                Method::new("toUpperCase", [], |receiver, _| {
                    Ok(Value::str(&expect_str(receiver)?.to_uppercase()))
                }),
                Method::new("concat", str_param, |receiver, args| {
                    let mut joined = expect_str(receiver)?.to_owned();
                    joined.push_str(expect_str(&args[0])?);
                    Ok(Value::str(&joined))
                }),
                Method::new("contains", str_param, |receiver, args| {
                    Ok(Value::Bool(expect_str(receiver)?.contains(expect_str(&args[0])?)))
                }),
            ],
        ),
        ForeignType::new(
            TypeId::INT,
            "int",
            [
                Method::new("abs", [], |receiver, _| {
                    expect_int(receiver)?
                        .checked_abs()
                        .map(Value::Int)
                        .ok_or_else(|| RuntimeError::raised("integer overflow in abs"))
                }),
                Method::new("toString", [], |receiver, _| {
                    Ok(Value::str(&expect_int(receiver)?.to_string()))
                }),
                Method::new("max", [ParamType::Exact(TypeId::INT)], |receiver, args| {
                    Ok(Value::Int(expect_int(receiver)?.max(expect_int(&args[0])?)))
                }),
            ],
        ),
        ForeignType::new(
            TypeId::FLOAT,
            "float",
            [
                Method::new("abs", [], |receiver, _| {
                    Ok(Value::Float(expect_float(receiver)?.abs()))
                }),
                Method::new("floor", [], |receiver, _| {
                    Ok(Value::Float(expect_float(receiver)?.floor()))
                }),
            ],
        ),
        ForeignType::new(
            TypeId::BOOL,
            "bool",
            [Method::new("negate", [], |receiver, _| {
                receiver
                    .as_bool()
                    .map(|b| Value::Bool(!b))
                    .ok_or_else(|| RuntimeError::type_mismatch("bool", receiver))
            })],
        ),
        ForeignType::new(
            TypeId::BYTES,
            "bytes",
            [Method::new("isEmpty", [], |receiver, _| {
                receiver
                    .as_bytes()
                    .map(|b| Value::Bool(b.is_empty()))
                    .ok_or_else(|| RuntimeError::type_mismatch("bytes", receiver))
            })],
        ),
    ]
}
