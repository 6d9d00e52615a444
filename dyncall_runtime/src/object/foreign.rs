//! Foreign (host) types and objects.
//!
//! Foreign objects do not carry a dispatch table of their own the way
//! class instances do; guards can only see their runtime type. Their
//! method table can still be redefined, which is why redefinitions must
//! be broadcast to call sites instead of being detected by guards.

use crate::object::method::{Method, MethodTable};
use crate::object::type_id::TypeId;
use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Description of a host type: name, id and method table.
pub struct ForeignType {
    name: Arc<str>,
    type_id: TypeId,
    methods: RwLock<Arc<MethodTable>>,
}

impl ForeignType {
    /// Create a foreign type with an initial set of methods.
    pub fn new(type_id: TypeId, name: &str, methods: impl IntoIterator<Item = Method>) -> Self {
        Self {
            name: Arc::from(name),
            type_id,
            methods: RwLock::new(Arc::new(MethodTable::from_methods(methods))),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Snapshot of the current method table.
    #[inline]
    pub fn dispatch_table(&self) -> Arc<MethodTable> {
        self.methods.read().clone()
    }

    /// Add or replace a method.
    ///
    /// Existing call sites keep dispatching to the old method until they
    /// are invalidated.
    pub fn define_method(&self, method: Method) {
        let mut table = self.methods.write();
        *table = Arc::new(table.with_method(method));
    }
}

impl fmt::Debug for ForeignType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignType")
            .field("name", &self.name)
            .field("type_id", &self.type_id)
            .field("methods", &self.methods.read().len())
            .finish()
    }
}

/// An opaque host value.
pub struct ForeignObject {
    ty: Arc<ForeignType>,
    payload: Box<dyn Any + Send + Sync>,
}

impl ForeignObject {
    pub fn new<T: Any + Send + Sync>(ty: Arc<ForeignType>, payload: T) -> Self {
        Self {
            ty,
            payload: Box::new(payload),
        }
    }

    #[inline]
    pub fn foreign_type(&self) -> &Arc<ForeignType> {
        &self.ty
    }

    /// Borrow the payload as `T`, if that is its concrete type.
    #[inline]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }
}

impl fmt::Debug for ForeignObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignObject")
            .field("type", &self.ty.name())
            .finish_non_exhaustive()
    }
}
