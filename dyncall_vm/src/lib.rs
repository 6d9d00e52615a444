//! Per-call-site inline caching for dynamic method dispatch.
//!
//! Every dynamic call expression in a compiled unit owns a `CallSite` with a
//! single cache slot. The first invocation resolves the target through a
//! `SlowPathResolver`; later invocations reuse it while its `Guard` accepts
//! the live receiver and arguments.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐   get(i)   ┌──────────┐  miss   ┌──────────────────┐
//! │ CallSiteArray   │ ─────────► │ CallSite │ ──────► │ SlowPathResolver │
//! │ (one per unit)  │            │  slot    │ ◄────── │  (full search)   │
//! └─────────────────┘            └──────────┘  target └──────────────────┘
//!          ▲                          │ hit
//!          │ reset_all                ▼
//! ┌─────────────────┐        ResolvedTarget::invoke
//! │ InvalidationHub │ ◄── TypeRegistry redefinitions
//! └─────────────────┘
//! ```

pub mod array;
pub mod config;
pub mod descriptor;
pub mod guard;
pub mod invalidation;
pub mod resolver;
pub mod site;
pub mod stats;
pub mod target;

pub use array::CallSiteArray;
pub use config::DispatchConfig;
pub use descriptor::{ArgKind, CallDescriptor, CallKind};
pub use guard::{Guard, TypeShape};
pub use invalidation::{InvalidationHub, invalidate};
pub use resolver::{MethodTableResolver, ResolutionFailure, SlowPathResolver};
pub use site::{CallSite, SiteState};
pub use stats::{ArrayStats, SiteStats, SiteStatsSnapshot};
pub use target::{
    AccessorOp, BinaryOp, Invocable, ResolvedTarget, SiteVariant, normalize_index,
};

#[cfg(test)]
pub(crate) mod test_support {
    use crate::descriptor::CallDescriptor;
    use crate::resolver::{MethodTableResolver, ResolutionFailure, SlowPathResolver};
    use crate::target::ResolvedTarget;
    use dyncall_runtime::{Class, Method, TypeRegistry, Value};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Method-table resolver that counts how often it is consulted.
    pub struct CountingResolver {
        inner: MethodTableResolver,
        calls: AtomicUsize,
    }

    impl CountingResolver {
        pub fn new(registry: Arc<TypeRegistry>) -> Self {
            Self {
                inner: MethodTableResolver::new(registry),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl SlowPathResolver for CountingResolver {
        fn resolve(
            &self,
            receiver: &Value,
            descriptor: &CallDescriptor,
            args: &[Value],
        ) -> Result<ResolvedTarget, ResolutionFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.resolve(receiver, descriptor, args)
        }
    }

    /// Builtin registry plus a `Widget` class whose `size()` returns 3.
    pub fn widget_registry() -> (Arc<TypeRegistry>, Arc<Class>) {
        let registry = Arc::new(TypeRegistry::with_builtins());
        let widget = registry.define_class(
            Class::builder("Widget").method(Method::new("size", [], |_, _| Ok(Value::Int(3)))),
        );
        (registry, widget)
    }
}
