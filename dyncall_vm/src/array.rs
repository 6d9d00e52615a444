//! Call site arrays: every call site of one compiled unit.
//!
//! The array is built once from the unit's ordered call descriptors and
//! never grows. Sites are addressed by index; `reset_all` clears each slot
//! independently, so it is safe while other threads are mid-dispatch.

use crate::config::DispatchConfig;
use crate::descriptor::CallDescriptor;
use crate::resolver::SlowPathResolver;
use crate::site::{CallSite, SiteState};
use crate::stats::ArrayStats;
use dyncall_runtime::{RuntimeError, RuntimeResult, Value};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Fixed-size array of call sites for one compiled unit.
pub struct CallSiteArray {
    /// Name of the owning unit, used in diagnostics.
    unit: Arc<str>,
    sites: Box<[CallSite]>,
    config: DispatchConfig,
    /// Incremented on every `reset_all`.
    generation: AtomicU64,
}

impl CallSiteArray {
    /// Build an array with the default configuration.
    pub fn new(
        unit: &str,
        descriptors: impl IntoIterator<Item = CallDescriptor>,
        resolver: Arc<dyn SlowPathResolver>,
    ) -> Self {
        Self::with_config(unit, descriptors, resolver, DispatchConfig::default())
    }

    /// Build an array whose sites share `config`.
    pub fn with_config(
        unit: &str,
        descriptors: impl IntoIterator<Item = CallDescriptor>,
        resolver: Arc<dyn SlowPathResolver>,
        config: DispatchConfig,
    ) -> Self {
        let sites: Box<[CallSite]> = descriptors
            .into_iter()
            .enumerate()
            .map(|(index, descriptor)| {
                CallSite::new(index, descriptor, Arc::clone(&resolver), config)
            })
            .collect();
        debug!(unit, sites = sites.len(), "call site array created");
        Self {
            unit: Arc::from(unit),
            sites,
            config,
            generation: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn unit(&self) -> &str {
        &self.unit
    }

    #[inline]
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Get the call site at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&CallSite> {
        self.sites.get(index)
    }

    /// Invoke through the site at `index`.
    pub fn invoke(&self, index: usize, receiver: &Value, args: &[Value]) -> RuntimeResult<Value> {
        self.site(index)?.invoke(receiver, args)
    }

    /// Null-safe invoke through the site at `index`.
    pub fn invoke_safe(
        &self,
        index: usize,
        receiver: &Value,
        args: &[Value],
    ) -> RuntimeResult<Value> {
        self.site(index)?.invoke_safe(receiver, args)
    }

    fn site(&self, index: usize) -> RuntimeResult<&CallSite> {
        self.sites.get(index).ok_or(RuntimeError::IndexOutOfRange {
            index: i64::try_from(index).unwrap_or(i64::MAX),
            len: self.sites.len(),
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CallSite> {
        self.sites.iter()
    }

    /// Drop every cached target.
    pub fn reset_all(&self) {
        for site in self.sites.iter() {
            site.reset();
        }
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(unit = %self.unit, generation, "call site array reset");
    }

    /// Number of `reset_all` calls so far.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }

    /// Classify every site and sum their counters.
    pub fn stats(&self) -> ArrayStats {
        let mut stats = ArrayStats::default();
        for site in self.sites.iter() {
            match site.state() {
                SiteState::Empty => stats.empty += 1,
                SiteState::Cached(_) => stats.cached += 1,
                SiteState::Failed => stats.failed += 1,
            }
            let snapshot = site.stats();
            if snapshot.resolutions > self.config.thrash_threshold {
                stats.thrashing += 1;
            }
            stats.absorb(&snapshot);
        }
        stats
    }
}

impl fmt::Debug for CallSiteArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallSiteArray")
            .field("unit", &self.unit)
            .field("sites", &self.sites.len())
            .field("generation", &self.generation())
            .finish()
    }
}
