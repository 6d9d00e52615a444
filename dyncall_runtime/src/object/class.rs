//! User-defined classes and their instances.
//!
//! Instances are self-describing: each one reaches its dispatch table
//! through its class. The table is held behind a lock only so it can be
//! swapped on redefinition; readers clone the `Arc` and never hold the
//! lock while searching.
//!
//! # Architecture
//!
//! ```text
//! Class
//! ├── name / type_id
//! ├── superclass: Option<Arc<Class>>
//! ├── instance_methods: RwLock<Arc<MethodTable>>   (swapped on redefinition)
//! ├── static_methods:   RwLock<Arc<MethodTable>>   (swapped on redefinition)
//! ├── constructors:     Box<[Arc<Method>]>         (fixed)
//! └── version: AtomicU64                           (bumped per redefinition)
//! ```

use crate::object::method::{Method, MethodFlags, MethodTable, Overloads};
use crate::object::type_id::TypeId;
use crate::value::Value;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

// =============================================================================
// Class
// =============================================================================

/// A user-defined class.
pub struct Class {
    name: Arc<str>,
    type_id: TypeId,
    superclass: Option<Arc<Class>>,
    instance_methods: RwLock<Arc<MethodTable>>,
    static_methods: RwLock<Arc<MethodTable>>,
    constructors: Box<[Arc<Method>]>,
    version: AtomicU64,
}

impl Class {
    /// Start describing a class named `name`.
    pub fn builder(name: &str) -> ClassBuilder {
        ClassBuilder::new(name)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    #[inline]
    pub fn superclass(&self) -> Option<&Arc<Class>> {
        self.superclass.as_ref()
    }

    /// Number of redefinitions applied to this class.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Snapshot of the current instance dispatch table.
    #[inline]
    pub fn dispatch_table(&self) -> Arc<MethodTable> {
        self.instance_methods.read().clone()
    }

    /// Check whether `table` is still the current instance dispatch table.
    ///
    /// Pointer identity only; no method search.
    #[inline]
    pub fn has_dispatch_table(&self, table: &Arc<MethodTable>) -> bool {
        Arc::ptr_eq(&*self.instance_methods.read(), table)
    }

    /// Snapshot of the current static method table.
    #[inline]
    pub fn static_table(&self) -> Arc<MethodTable> {
        self.static_methods.read().clone()
    }

    #[inline]
    pub fn constructors(&self) -> &[Arc<Method>] {
        &self.constructors
    }

    /// Iterate this class followed by its superclasses.
    pub fn ancestors(&self) -> impl Iterator<Item = &Class> {
        std::iter::successors(Some(self), |class| class.superclass.as_deref())
    }

    /// Check whether this class is `type_id` or inherits from it.
    pub fn is_subclass_of(&self, type_id: TypeId) -> bool {
        self.ancestors().any(|class| class.type_id == type_id)
    }

    /// Instance methods named `name`, taken from the nearest class in the
    /// hierarchy that defines any.
    pub fn find_methods(&self, name: &str) -> Overloads {
        self.ancestors()
            .map(|class| class.dispatch_table())
            .find(|table| table.contains(name))
            .map(|table| table.lookup(name).iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Static methods named `name`, searched the same way as instance methods.
    pub fn find_static(&self, name: &str) -> Overloads {
        self.ancestors()
            .map(|class| class.static_table())
            .find(|table| table.contains(name))
            .map(|table| table.lookup(name).iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Add or replace an instance method, publishing a new dispatch table.
    pub fn define_method(&self, method: Method) {
        let name = Arc::<str>::from(method.name());
        {
            let mut table = self.instance_methods.write();
            *table = Arc::new(table.with_method(method));
        }
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(class = %self.name, method = %name, version, "instance method redefined");
    }

    /// Add or replace a static method.
    pub fn define_static(&self, method: Method) {
        let name = Arc::<str>::from(method.name());
        {
            let mut table = self.static_methods.write();
            *table = Arc::new(table.with_method(method.with_flags(MethodFlags::STATIC)));
        }
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(class = %self.name, method = %name, version, "static method redefined");
    }

    /// Remove every instance overload named `name`.
    ///
    /// Returns false if the class did not define it.
    pub fn remove_method(&self, name: &str) -> bool {
        {
            let mut table = self.instance_methods.write();
            if !table.contains(name) {
                return false;
            }
            *table = Arc::new(table.without(name));
        }
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(class = %self.name, method = name, version, "instance method removed");
        true
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("type_id", &self.type_id)
            .field("superclass", &self.superclass.as_ref().map(|c| c.name()))
            .field("version", &self.version())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Class Builder
// =============================================================================

/// Collects the definition of a class before it receives a type id.
#[derive(Debug)]
pub struct ClassBuilder {
    name: Arc<str>,
    superclass: Option<Arc<Class>>,
    methods: Vec<Method>,
    statics: Vec<Method>,
    constructors: Vec<Method>,
}

impl ClassBuilder {
    fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            superclass: None,
            methods: Vec::new(),
            statics: Vec::new(),
            constructors: Vec::new(),
        }
    }

    pub fn extends(mut self, superclass: Arc<Class>) -> Self {
        self.superclass = Some(superclass);
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.methods.push(method);
        self
    }

    pub fn static_method(mut self, method: Method) -> Self {
        self.statics.push(method.with_flags(MethodFlags::STATIC));
        self
    }

    /// Add an initializer; its receiver is the freshly allocated instance.
    pub fn constructor(mut self, method: Method) -> Self {
        self.constructors
            .push(method.with_flags(MethodFlags::CONSTRUCTOR));
        self
    }

    /// Finish the class under `type_id`.
    ///
    /// Normally called through `TypeRegistry::define_class`, which
    /// allocates the id and registers the result.
    pub fn build(self, type_id: TypeId) -> Arc<Class> {
        Arc::new(Class {
            name: self.name,
            type_id,
            superclass: self.superclass,
            instance_methods: RwLock::new(Arc::new(MethodTable::from_methods(self.methods))),
            static_methods: RwLock::new(Arc::new(MethodTable::from_methods(self.statics))),
            constructors: self.constructors.into_iter().map(Arc::new).collect(),
            version: AtomicU64::new(0),
        })
    }
}

// =============================================================================
// Instance
// =============================================================================

/// An instance of a user class.
pub struct Instance {
    class: Arc<Class>,
    fields: RwLock<FxHashMap<Arc<str>, Value>>,
}

impl Instance {
    /// Allocate an instance with no fields set.
    pub fn new(class: Arc<Class>) -> Self {
        Self {
            class,
            fields: RwLock::new(FxHashMap::default()),
        }
    }

    #[inline]
    pub fn class(&self) -> &Arc<Class> {
        &self.class
    }

    pub fn get_field(&self, name: &str) -> Option<Value> {
        self.fields.read().get(name).cloned()
    }

    pub fn set_field(&self, name: &str, value: Value) {
        self.fields.write().insert(Arc::from(name), value);
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.class.name())
            .field("fields", &self.fields.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::method::ParamType;

    fn returning(name: &str, result: i64) -> Method {
        Method::new(name, [], move |_, _| Ok(Value::Int(result)))
    }

    fn shape_class() -> Arc<Class> {
        Class::builder("Shape")
            .method(returning("area", 0))
            .method(returning("sides", 0))
            .build(TypeId::from_raw(300))
    }

    #[test]
    fn test_define_method_swaps_table() {
        let class = shape_class();
        let before = class.dispatch_table();
        assert!(class.has_dispatch_table(&before));

        class.define_method(returning("area", 42));

        assert!(!class.has_dispatch_table(&before));
        assert_eq!(class.version(), 1);
        let area = &class.find_methods("area")[0];
        assert_eq!(area.invoke(&Value::None, &[]), Ok(Value::Int(42)));
    }

    #[test]
    fn test_find_methods_walks_superclass() {
        let base = shape_class();
        let square = Class::builder("Square")
            .extends(Arc::clone(&base))
            .method(returning("sides", 4))
            .build(TypeId::from_raw(301));

        let sides = square.find_methods("sides");
        assert_eq!(sides[0].invoke(&Value::None, &[]), Ok(Value::Int(4)));
        let area = square.find_methods("area");
        assert_eq!(area[0].invoke(&Value::None, &[]), Ok(Value::Int(0)));
        assert!(square.find_methods("perimeter").is_empty());
    }

    #[test]
    fn test_subclass_relation() {
        let base = shape_class();
        let square = Class::builder("Square")
            .extends(Arc::clone(&base))
            .build(TypeId::from_raw(301));

        assert!(square.is_subclass_of(TypeId::from_raw(300)));
        assert!(square.is_subclass_of(TypeId::from_raw(301)));
        assert!(!base.is_subclass_of(TypeId::from_raw(301)));
    }

    #[test]
    fn test_static_methods_are_flagged() {
        let class = Class::builder("Factory")
            .static_method(Method::new("make", [ParamType::Any], |_, args| {
                Ok(args[0].clone())
            }))
            .build(TypeId::from_raw(302));

        let make = class.find_static("make");
        assert!(make[0].flags().contains(MethodFlags::STATIC));
        assert!(class.find_methods("make").is_empty());
    }

    #[test]
    fn test_remove_method() {
        let class = shape_class();
        assert!(class.remove_method("area"));
        assert!(!class.remove_method("area"));
        assert!(class.find_methods("area").is_empty());
        assert_eq!(class.version(), 1);
    }

    #[test]
    fn test_instance_fields() {
        let instance = Instance::new(shape_class());
        assert!(instance.get_field("w").is_none());
        instance.set_field("w", Value::Int(3));
        assert_eq!(instance.get_field("w"), Some(Value::Int(3)));
    }
}
