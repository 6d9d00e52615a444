//! Slow-path resolution.
//!
//! A call site consults its resolver only on a miss: empty slot, failed slot,
//! or a guard that rejected the live inputs. The resolver performs the full
//! method-table search and returns a fresh `ResolvedTarget`, which the site
//! publishes verbatim.

mod method_table;

pub use method_table::MethodTableResolver;

use crate::descriptor::CallDescriptor;
use crate::target::ResolvedTarget;
use dyncall_runtime::{RuntimeError, Value};
use thiserror::Error;

/// Why a slow-path resolution produced no target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionFailure {
    /// No candidate accepts the receiver and arguments.
    #[error("no method matches the call")]
    MethodNotFound,

    /// More than one candidate matches equally well.
    #[error("{candidates} equally specific methods match the call")]
    AmbiguousMatch { candidates: usize },

    /// The receiver is `None`.
    #[error("receiver is none")]
    NullReceiver,
}

impl ResolutionFailure {
    /// Attach call context to produce the error raised from `invoke`.
    pub fn into_runtime_error(
        self,
        descriptor: &CallDescriptor,
        receiver: &Value,
        args: &[Value],
    ) -> RuntimeError {
        match self {
            ResolutionFailure::MethodNotFound => {
                RuntimeError::method_not_found(descriptor.name(), receiver, args)
            }
            ResolutionFailure::AmbiguousMatch { candidates } => {
                RuntimeError::ambiguous(descriptor.name(), receiver, candidates)
            }
            ResolutionFailure::NullReceiver => RuntimeError::NullReceiver {
                name: descriptor.name().to_string(),
            },
        }
    }
}

/// Full, uncached method search.
///
/// Implementations must be callable from several threads at once; a call
/// site never holds a lock while resolving.
pub trait SlowPathResolver: Send + Sync {
    /// Resolve `descriptor` for this receiver and these arguments.
    fn resolve(
        &self,
        receiver: &Value,
        descriptor: &CallDescriptor,
        args: &[Value],
    ) -> Result<ResolvedTarget, ResolutionFailure>;
}
