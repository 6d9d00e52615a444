//! Call sites: one single-target inline cache per call expression.
//!
//! # Dispatch
//!
//! ```text
//! invoke(receiver, args)
//!   │
//!   ├─ slot Cached(target) and target.guard accepts ──► target.invoke   (hit)
//!   │
//!   └─ otherwise ──► resolver.resolve ──► publish ──► guard re-check ──► invoke
//!                          │                               │
//!                          └─ failure: slot = Failed       └─ reject: GuardInconsistency
//! ```
//!
//! The slot lock is only held to clone or swap an `Arc<ResolvedTarget>`.
//! Guard evaluation, resolution and invocation all run unlocked, so a
//! concurrent miss on another thread simply overwrites the slot
//! (last writer wins) and readers always see a complete target.
//!
//! Every `reset` bumps the site's epoch under the slot lock. A resolution
//! that started before a reset is still invoked once but never cached, so
//! no target resolved against pre-invalidation tables survives the reset.

use crate::config::DispatchConfig;
use crate::descriptor::CallDescriptor;
use crate::resolver::SlowPathResolver;
use crate::stats::{SiteStats, SiteStatsSnapshot};
use crate::target::{ResolvedTarget, SiteVariant};
use dyncall_runtime::{RuntimeError, RuntimeResult, Value};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, error, trace, warn};

// =============================================================================
// Slot
// =============================================================================

/// Contents of a call site's cache slot.
#[derive(Debug, Clone, Default)]
enum Slot {
    #[default]
    Empty,
    Cached(Arc<ResolvedTarget>),
    /// Last resolution failed; the next invoke resolves again.
    Failed,
}

/// Observable state of a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteState {
    /// Never resolved, or reset.
    Empty,
    /// Holding a target of this variant.
    Cached(SiteVariant),
    /// Last resolution failed.
    Failed,
}

// =============================================================================
// Call Site
// =============================================================================

/// A single dynamic call expression with its inline cache.
pub struct CallSite {
    /// Position within the owning array.
    index: usize,
    descriptor: CallDescriptor,
    slot: RwLock<Slot>,
    resolver: Arc<dyn SlowPathResolver>,
    stats: SiteStats,
    config: DispatchConfig,
    /// Set once the thrash warning has been emitted.
    thrash_reported: AtomicBool,
    /// Bumped by every `reset`, always while the slot is write-locked.
    epoch: AtomicU64,
}

impl CallSite {
    /// Create an empty call site.
    pub fn new(
        index: usize,
        descriptor: CallDescriptor,
        resolver: Arc<dyn SlowPathResolver>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            index,
            descriptor,
            slot: RwLock::new(Slot::Empty),
            resolver,
            stats: SiteStats::new(),
            config,
            thrash_reported: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn descriptor(&self) -> &CallDescriptor {
        &self.descriptor
    }

    /// Invoke the call expression on `receiver` with `args`.
    ///
    /// Uses the cached target when its guard accepts; otherwise resolves
    /// exactly once, publishes the new target and invokes it.
    #[inline]
    pub fn invoke(&self, receiver: &Value, args: &[Value]) -> RuntimeResult<Value> {
        if let Some(target) = self.current_target() {
            if target.guard().accept(receiver, args) {
                self.stats.record_hit();
                if self.config.trace_hits {
                    trace!(site = self.index, call = %self.descriptor, "guard hit");
                }
                return target.invoke(receiver, args);
            }
        }
        self.invoke_slow(receiver, args)
    }

    /// Null-safe invoke: a `None` receiver yields `None` without resolving.
    #[inline]
    pub fn invoke_safe(&self, receiver: &Value, args: &[Value]) -> RuntimeResult<Value> {
        if receiver.is_none() {
            return Ok(Value::None);
        }
        self.invoke(receiver, args)
    }

    #[cold]
    #[inline(never)]
    fn invoke_slow(&self, receiver: &Value, args: &[Value]) -> RuntimeResult<Value> {
        self.stats.record_miss();
        debug!(
            site = self.index,
            call = %self.descriptor,
            receiver = receiver.type_name(),
            "call site miss"
        );

        let epoch = self.epoch.load(Ordering::Acquire);
        let target = match self.resolver.resolve(receiver, &self.descriptor, args) {
            Ok(target) => Arc::new(target),
            Err(failure) => {
                self.stats.record_failure();
                self.install(epoch, Slot::Failed);
                debug!(site = self.index, call = %self.descriptor, %failure, "resolution failed");
                return Err(failure.into_runtime_error(&self.descriptor, receiver, args));
            }
        };

        self.publish(epoch, Arc::clone(&target));

        if !target.guard().accept(receiver, args) {
            self.install(epoch, Slot::Failed);
            error!(
                site = self.index,
                call = %self.descriptor,
                receiver = receiver.type_name(),
                variant = %target.variant(),
                "freshly resolved target rejected its own inputs"
            );
            return Err(RuntimeError::GuardInconsistency {
                site: self.index,
                name: self.descriptor.name().to_string(),
            });
        }

        target.invoke(receiver, args)
    }

    /// Store `slot` unless the site was reset since `epoch` was read.
    fn install(&self, epoch: u64, slot: Slot) -> bool {
        let mut current = self.slot.write();
        if self.epoch.load(Ordering::Acquire) != epoch {
            return false;
        }
        *current = slot;
        true
    }

    /// Cache `target` if no reset raced with its resolution.
    fn publish(&self, epoch: u64, target: Arc<ResolvedTarget>) {
        let variant = target.variant();
        let resolutions = self.stats.record_resolution();

        if !self.install(epoch, Slot::Cached(target)) {
            debug!(
                site = self.index,
                call = %self.descriptor,
                %variant,
                "site reset during resolution, target not cached"
            );
            return;
        }
        debug!(site = self.index, call = %self.descriptor, %variant, resolutions, "target published");

        if resolutions > self.config.thrash_threshold
            && !self.thrash_reported.swap(true, Ordering::Relaxed)
        {
            warn!(
                site = self.index,
                call = %self.descriptor,
                resolutions,
                threshold = self.config.thrash_threshold,
                "call site is thrashing between receiver shapes"
            );
        }
    }

    /// Drop the cached target; the next invoke resolves again.
    pub fn reset(&self) {
        {
            let mut slot = self.slot.write();
            self.epoch.fetch_add(1, Ordering::Release);
            *slot = Slot::Empty;
        }
        self.stats.record_invalidation();
    }

    /// Currently cached target, if any.
    #[inline]
    pub fn current_target(&self) -> Option<Arc<ResolvedTarget>> {
        match &*self.slot.read() {
            Slot::Cached(target) => Some(Arc::clone(target)),
            Slot::Empty | Slot::Failed => None,
        }
    }

    /// Current slot state.
    pub fn state(&self) -> SiteState {
        match &*self.slot.read() {
            Slot::Empty => SiteState::Empty,
            Slot::Cached(target) => SiteState::Cached(target.variant()),
            Slot::Failed => SiteState::Failed,
        }
    }

    /// Snapshot of this site's counters.
    pub fn stats(&self) -> SiteStatsSnapshot {
        self.stats.snapshot()
    }

    /// Check whether the site has re-resolved more often than the threshold.
    pub fn is_thrashing(&self) -> bool {
        self.stats.snapshot().resolutions > self.config.thrash_threshold
    }
}

impl fmt::Debug for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallSite")
            .field("index", &self.index)
            .field("descriptor", &self.descriptor)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::CallDescriptor;
    use crate::guard::Guard;
    use crate::resolver::ResolutionFailure;
    use crate::target::Invocable;
    use crate::test_support::{CountingResolver, widget_registry};
    use dyncall_runtime::{Instance, TypeId, TypeRegistry};
    use smallvec::SmallVec;

    fn site(name: &str, resolver: &Arc<CountingResolver>) -> CallSite {
        CallSite::new(
            0,
            CallDescriptor::instance(name),
            Arc::clone(resolver) as Arc<dyn SlowPathResolver>,
            DispatchConfig::default(),
        )
    }

    #[test]
    fn test_hit_after_first_resolution() {
        let (registry, widget) = widget_registry();
        let resolver = Arc::new(CountingResolver::new(registry));
        let site = site("size", &resolver);
        let receiver = Value::Object(Arc::new(Instance::new(widget)));

        assert_eq!(site.state(), SiteState::Empty);
        assert_eq!(site.invoke(&receiver, &[]), Ok(Value::Int(3)));
        assert_eq!(site.invoke(&receiver, &[]), Ok(Value::Int(3)));

        assert_eq!(resolver.calls(), 1);
        assert_eq!(site.state(), SiteState::Cached(SiteVariant::SelfDescribingInstance));
        let stats = site.stats();
        assert_eq!((stats.hits, stats.misses, stats.resolutions), (1, 1, 1));
    }

    #[test]
    fn test_failure_marks_slot_and_retries() {
        let resolver = Arc::new(CountingResolver::new(Arc::new(TypeRegistry::with_builtins())));
        let site = site("nope", &resolver);

        let err = site.invoke(&Value::Int(1), &[]).unwrap_err();
        assert!(matches!(err, RuntimeError::MethodNotFound { .. }));
        assert_eq!(site.state(), SiteState::Failed);

        // A failed site resolves again on its next invoke.
        assert!(site.invoke(&Value::Int(1), &[]).is_err());
        assert_eq!(resolver.calls(), 2);
        assert_eq!(site.stats().failures, 2);
    }

    #[test]
    fn test_invoke_safe_skips_none() {
        let resolver = Arc::new(CountingResolver::new(Arc::new(TypeRegistry::with_builtins())));
        let site = site("length", &resolver);

        assert_eq!(site.invoke_safe(&Value::None, &[]), Ok(Value::None));
        assert_eq!(resolver.calls(), 0);
        assert_eq!(site.invoke_safe(&Value::str("abc"), &[]), Ok(Value::Int(3)));

        let err = site.invoke(&Value::None, &[]).unwrap_err();
        assert!(matches!(err, RuntimeError::NullReceiver { .. }));
    }

    #[test]
    fn test_reset_forces_resolution() {
        let resolver = Arc::new(CountingResolver::new(Arc::new(TypeRegistry::with_builtins())));
        let site = site("length", &resolver);

        site.invoke(&Value::str("ab"), &[]).unwrap();
        site.reset();
        assert_eq!(site.state(), SiteState::Empty);
        site.invoke(&Value::str("ab"), &[]).unwrap();

        assert_eq!(resolver.calls(), 2);
        assert_eq!(site.stats().invalidations, 1);
    }

    #[test]
    fn test_thrash_threshold() {
        let resolver = Arc::new(CountingResolver::new(Arc::new(TypeRegistry::with_builtins())));
        let site = CallSite::new(
            0,
            CallDescriptor::instance("abs"),
            resolver as Arc<dyn SlowPathResolver>,
            DispatchConfig::default().with_thrash_threshold(2),
        );

        for _ in 0..2 {
            site.invoke(&Value::Int(-1), &[]).unwrap();
            site.invoke(&Value::Float(-1.0), &[]).unwrap();
        }
        assert!(site.is_thrashing());
        assert_eq!(site.stats().resolutions, 4);
    }

    /// Resets its own site once, between resolving and returning.
    struct ResettingResolver {
        inner: CountingResolver,
        site: parking_lot::Mutex<std::sync::Weak<CallSite>>,
        fired: AtomicBool,
    }

    impl SlowPathResolver for ResettingResolver {
        fn resolve(
            &self,
            receiver: &Value,
            descriptor: &CallDescriptor,
            args: &[Value],
        ) -> Result<ResolvedTarget, ResolutionFailure> {
            let target = self.inner.resolve(receiver, descriptor, args)?;
            if !self.fired.swap(true, Ordering::SeqCst) {
                if let Some(site) = self.site.lock().upgrade() {
                    site.reset();
                }
            }
            Ok(target)
        }
    }

    #[test]
    fn test_reset_during_resolution_is_not_cached() {
        let resolver = Arc::new(ResettingResolver {
            inner: CountingResolver::new(Arc::new(TypeRegistry::with_builtins())),
            site: parking_lot::Mutex::new(std::sync::Weak::new()),
            fired: AtomicBool::new(false),
        });
        let site = Arc::new(CallSite::new(
            0,
            CallDescriptor::instance("length"),
            Arc::clone(&resolver) as Arc<dyn SlowPathResolver>,
            DispatchConfig::default(),
        ));
        *resolver.site.lock() = Arc::downgrade(&site);

        // The in-flight target still answers this call but is not kept.
        assert_eq!(site.invoke(&Value::str("abc"), &[]), Ok(Value::Int(3)));
        assert_eq!(site.state(), SiteState::Empty);

        assert_eq!(site.invoke(&Value::str("abc"), &[]), Ok(Value::Int(3)));
        assert_eq!(resolver.inner.calls(), 2);
        assert_eq!(site.state(), SiteState::Cached(SiteVariant::ForeignInstance));
        assert_eq!(site.invoke(&Value::str("abc"), &[]), Ok(Value::Int(3)));
        assert_eq!(resolver.inner.calls(), 2);
    }

    struct InconsistentResolver;

    impl SlowPathResolver for InconsistentResolver {
        fn resolve(
            &self,
            _receiver: &Value,
            _descriptor: &CallDescriptor,
            _args: &[Value],
        ) -> Result<ResolvedTarget, ResolutionFailure> {
            let guard = Guard::Operands {
                lhs: TypeId::NONE,
                rhs: TypeId::NONE,
            };
            Ok(ResolvedTarget::from_parts(
                TypeId::INT,
                SiteVariant::Operator,
                guard,
                Invocable::Operator(crate::target::BinaryOp::Add),
                SmallVec::new(),
            ))
        }
    }

    #[test]
    fn test_guard_inconsistency_is_fatal() {
        let site = CallSite::new(
            4,
            CallDescriptor::operator("plus"),
            Arc::new(InconsistentResolver),
            DispatchConfig::default(),
        );
        let err = site.invoke(&Value::Int(1), &[Value::Int(2)]).unwrap_err();
        assert_eq!(
            err,
            RuntimeError::GuardInconsistency {
                site: 4,
                name: "plus".to_string()
            }
        );
        assert!(err.is_internal());
        assert_eq!(site.state(), SiteState::Failed);
    }
}
