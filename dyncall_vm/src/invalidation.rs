//! Invalidation of cached targets after type redefinition.
//!
//! Guards never consult ambient state to notice a redefinition. Instead the
//! runtime's `TypeRegistry` notifies an `InvalidationHub`, which resets every
//! live call site array registered with it.

use crate::array::CallSiteArray;
use dyncall_runtime::{TypeMutation, TypeMutationListener};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::debug;

/// Drop every cached target in `array`.
#[inline]
pub fn invalidate(array: &CallSiteArray) {
    array.reset_all();
}

/// Broadcasts type mutations to registered call site arrays.
///
/// Arrays are held weakly; dropping an array unregisters it.
#[derive(Debug, Default)]
pub struct InvalidationHub {
    arrays: Mutex<Vec<Weak<CallSiteArray>>>,
}

impl InvalidationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `array` for future invalidations.
    pub fn register(&self, array: &Arc<CallSiteArray>) {
        self.arrays.lock().push(Arc::downgrade(array));
    }

    /// Number of registered arrays still alive.
    pub fn live_count(&self) -> usize {
        let mut arrays = self.arrays.lock();
        arrays.retain(|array| array.strong_count() > 0);
        arrays.len()
    }

    /// Invalidate every live array, returning how many were reset.
    pub fn invalidate_all(&self) -> usize {
        // Upgrade under the lock, reset outside it.
        let live: Vec<Arc<CallSiteArray>> = {
            let mut arrays = self.arrays.lock();
            arrays.retain(|array| array.strong_count() > 0);
            arrays.iter().filter_map(Weak::upgrade).collect()
        };
        for array in &live {
            invalidate(array);
        }
        live.len()
    }
}

impl TypeMutationListener for InvalidationHub {
    fn on_type_mutated(&self, mutation: &TypeMutation) {
        let reset = self.invalidate_all();
        debug!(
            type_id = %mutation.type_id,
            name = %mutation.name,
            arrays = reset,
            "invalidated call sites"
        );
    }
}
