//! Reference resolver backed by the runtime's method tables.
//!
//! # Search Order
//!
//! ```text
//! None receiver                    -> NullReceiver
//! Constructor   on class value     -> class constructors
//! Static        on class value     -> static tables along the superclass chain
//! Operator      numeric / string   -> builtin operator, else instance search
//! Instance      bytes              -> direct accessor, else bytes method table
//!               self-describing    -> instance tables along the superclass chain
//!               foreign / builtin  -> the foreign type's method table
//! ```
//!
//! Among candidates with the right name, every one whose arity and parameter
//! types accept the arguments is scored; the single best score wins and a
//! tie at the top is `AmbiguousMatch`.

use super::{ResolutionFailure, SlowPathResolver};
use crate::descriptor::{CallDescriptor, CallKind};
use crate::target::{AccessorOp, BinaryOp, ResolvedTarget};
use dyncall_runtime::{Class, Method, TypeRegistry, Value};
use std::sync::Arc;
use tracing::trace;

/// Resolver performing the full search against a `TypeRegistry`.
#[derive(Clone)]
pub struct MethodTableResolver {
    registry: Arc<TypeRegistry>,
}

impl MethodTableResolver {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self { registry }
    }

    #[inline]
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    fn resolve_constructor(
        &self,
        receiver: &Value,
        args: &[Value],
    ) -> Result<ResolvedTarget, ResolutionFailure> {
        let class = receiver.as_class().ok_or(ResolutionFailure::MethodNotFound)?;
        let init = select_most_specific(class.constructors(), args)?;
        Ok(ResolvedTarget::constructor(class, init, args))
    }

    fn resolve_static(
        &self,
        class: &Arc<Class>,
        descriptor: &CallDescriptor,
        args: &[Value],
    ) -> Result<ResolvedTarget, ResolutionFailure> {
        let candidates = class.find_static(descriptor.name());
        let method = select_most_specific(&candidates, args)?;
        Ok(ResolvedTarget::static_method(class, method, args))
    }

    fn resolve_operator(
        &self,
        receiver: &Value,
        descriptor: &CallDescriptor,
        args: &[Value],
    ) -> Result<ResolvedTarget, ResolutionFailure> {
        if let [rhs] = args {
            let builtin = BinaryOp::from_method_name(descriptor.name())
                .filter(|op| op.supports(receiver.type_id(), rhs.type_id()));
            if let Some(op) = builtin {
                return Ok(ResolvedTarget::operator(op, receiver.type_id(), rhs.type_id()));
            }
        }
        self.resolve_instance(receiver, descriptor, args)
    }

    fn resolve_instance(
        &self,
        receiver: &Value,
        descriptor: &CallDescriptor,
        args: &[Value],
    ) -> Result<ResolvedTarget, ResolutionFailure> {
        let name = descriptor.name();
        match receiver {
            Value::None => Err(ResolutionFailure::NullReceiver),
            Value::Object(instance) => {
                let candidates = instance.class().find_methods(name);
                let method = select_most_specific(&candidates, args)?;
                Ok(ResolvedTarget::self_describing(instance, method, args))
            }
            Value::Class(class) => self.resolve_static(class, descriptor, args),
            Value::Foreign(object) => {
                let table = object.foreign_type().dispatch_table();
                let method = select_most_specific(table.lookup(name), args)?;
                Ok(ResolvedTarget::foreign(receiver, method, args))
            }
            Value::Bytes(_) => match AccessorOp::for_call(name, args) {
                Some(op) => Ok(ResolvedTarget::accessor(op)),
                None => self.resolve_builtin(receiver, name, args),
            },
            _ => self.resolve_builtin(receiver, name, args),
        }
    }

    fn resolve_builtin(
        &self,
        receiver: &Value,
        name: &str,
        args: &[Value],
    ) -> Result<ResolvedTarget, ResolutionFailure> {
        let ty = self
            .registry
            .foreign_type(receiver.type_id())
            .ok_or(ResolutionFailure::MethodNotFound)?;
        let table = ty.dispatch_table();
        let method = select_most_specific(table.lookup(name), args)?;
        Ok(ResolvedTarget::foreign(receiver, method, args))
    }
}

impl SlowPathResolver for MethodTableResolver {
    fn resolve(
        &self,
        receiver: &Value,
        descriptor: &CallDescriptor,
        args: &[Value],
    ) -> Result<ResolvedTarget, ResolutionFailure> {
        if receiver.is_none() {
            return Err(ResolutionFailure::NullReceiver);
        }
        if !descriptor.admits(args) {
            return Err(ResolutionFailure::MethodNotFound);
        }

        let target = match descriptor.kind() {
            CallKind::Constructor => self.resolve_constructor(receiver, args),
            CallKind::Static => match receiver.as_class() {
                Some(class) => self.resolve_static(class, descriptor, args),
                None => Err(ResolutionFailure::MethodNotFound),
            },
            CallKind::Operator => self.resolve_operator(receiver, descriptor, args),
            CallKind::Instance => self.resolve_instance(receiver, descriptor, args),
        }?;

        trace!(
            call = %descriptor,
            receiver = receiver.type_name(),
            variant = %target.variant(),
            "resolved"
        );
        Ok(target)
    }
}

/// Pick the single best-scoring candidate for `args`.
pub(crate) fn select_most_specific(
    candidates: &[Arc<Method>],
    args: &[Value],
) -> Result<Arc<Method>, ResolutionFailure> {
    let mut best: Option<(u32, &Arc<Method>)> = None;
    let mut tied = 0usize;

    for method in candidates {
        let Some(score) = method.match_score(args) else {
            continue;
        };
        match best {
            Some((top, _)) if score < top => {}
            Some((top, _)) if score == top => tied += 1,
            _ => {
                best = Some((score, method));
                tied = 1;
            }
        }
    }

    match best {
        None => Err(ResolutionFailure::MethodNotFound),
        Some((_, method)) if tied == 1 => Ok(Arc::clone(method)),
        Some(_) => Err(ResolutionFailure::AmbiguousMatch { candidates: tied }),
    }
}
