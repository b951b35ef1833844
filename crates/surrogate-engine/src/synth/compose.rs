//! Invoker composition
//!
//! Folds a member's hooks and its external handler into one callable:
//!
//! ```text
//! type hook 0 ─▶ type hook 1 ─▶ method hook 0 ─▶ ... ─▶ handler (or base access)
//! ```
//!
//! The fold happens once per member when the type is synthesized (once per
//! closed instantiation for generic methods); a call only walks the
//! prebuilt closures.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use surrogate_sdk::{ArgumentEnvelope, FromValue, ProxyResult, Value};
use tracing::trace;

use super::base_access::BaseAccessSlot;
use super::classify::MemberSlot;
use super::hooks::Hook;
use crate::metadata::{AccessorKind, MethodSignature, ReturnKind, TypeInfo};
use crate::object::Instance;

/// The externally supplied innermost link of an invocation chain
pub trait InvocationHandler: Send + Sync {
    /// Handle one intercepted call
    fn invoke(&self, call: &mut Invocation<'_>) -> ProxyResult<Value>;
}

impl<F> InvocationHandler for F
where
    F: Fn(&mut Invocation<'_>) -> ProxyResult<Value> + Send + Sync,
{
    fn invoke(&self, call: &mut Invocation<'_>) -> ProxyResult<Value> {
        self(call)
    }
}

/// Box a closure as a shareable handler
pub fn handler_fn<F>(f: F) -> Arc<dyn InvocationHandler>
where
    F: Fn(&mut Invocation<'_>) -> ProxyResult<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Describes the member a call was made on
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDescriptor {
    /// Member name
    pub name: String,
    /// Type that declared the member
    pub declaring_type: String,
    /// Overload identity
    pub signature: MethodSignature,
    /// Return kind, closed over `type_arguments`
    pub returns: ReturnKind,
    /// Closed generic arguments (empty for non-generic members)
    pub type_arguments: Vec<TypeInfo>,
    /// Property / indexer / event the member belongs to
    pub accessor: Option<AccessorKind>,
    /// No original implementation exists
    pub is_abstract: bool,
}

impl MethodDescriptor {
    pub(crate) fn for_member(slot: &MemberSlot, type_args: &[TypeInfo]) -> Self {
        let method = &slot.method;
        Self {
            name: method.name.clone(),
            declaring_type: slot.declaring_type.clone(),
            signature: method.signature(),
            returns: method.returns.substitute(&method.generic_params, type_args),
            type_arguments: type_args.to_vec(),
            accessor: method.accessor.clone(),
            is_abstract: method.modifiers.is_abstract,
        }
    }

    /// Property / event accessor
    pub fn is_special_name(&self) -> bool {
        self.accessor.is_some()
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.declaring_type, self.name)?;
        if !self.type_arguments.is_empty() {
            let args: Vec<String> = self.type_arguments.iter().map(ToString::to_string).collect();
            write!(f, "<{}>", args.join(", "))?;
        }
        Ok(())
    }
}

/// One intercepted call travelling down the chain
pub struct Invocation<'a> {
    target: &'a Arc<Instance>,
    method: &'a MethodDescriptor,
    args: &'a mut ArgumentEnvelope,
    base: &'a BaseAccessSlot,
}

impl<'a> Invocation<'a> {
    pub(crate) fn new(
        target: &'a Arc<Instance>,
        method: &'a MethodDescriptor,
        args: &'a mut ArgumentEnvelope,
        base: &'a BaseAccessSlot,
    ) -> Self {
        Self {
            target,
            method,
            args,
            base,
        }
    }

    /// The instance the member was called on
    pub fn target(&self) -> &Arc<Instance> {
        self.target
    }

    /// The member being invoked
    pub fn method(&self) -> &MethodDescriptor {
        self.method
    }

    /// The argument envelope
    pub fn args(&self) -> &ArgumentEnvelope {
        &*self.args
    }

    /// The argument envelope, for rewriting arguments
    pub fn args_mut(&mut self) -> &mut ArgumentEnvelope {
        &mut *self.args
    }

    /// Read and unbox an argument
    pub fn arg<T: FromValue>(&self, index: usize) -> ProxyResult<T> {
        self.args.arg(index)
    }

    /// Replace an argument; by-ref positions are written through
    pub fn set_arg(&mut self, index: usize, value: impl Into<Value>) -> ProxyResult<()> {
        self.args.set(index, value)
    }

    /// Whether `proceed_base` has original logic to run
    pub fn has_base(&self) -> bool {
        self.base.has_implementation()
    }

    /// Run the original, un-intercepted implementation with the current arguments
    pub fn proceed_base(&mut self) -> ProxyResult<Value> {
        self.base
            .call(self.target, &mut *self.args, &self.method.type_arguments)
    }
}

/// A composed chain link
pub type InvokerFn = Arc<dyn Fn(&mut Invocation<'_>) -> ProxyResult<Value> + Send + Sync>;

fn invoker<F>(f: F) -> InvokerFn
where
    F: Fn(&mut Invocation<'_>) -> ProxyResult<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// The rest of the chain after the current hook
#[derive(Clone, Copy)]
pub struct Next<'a> {
    inner: &'a InvokerFn,
}

impl Next<'_> {
    /// Pass the call on to the next link
    pub fn proceed(self, call: &mut Invocation<'_>) -> ProxyResult<Value> {
        (self.inner)(call)
    }
}

/// The composed entry point for one member (or one closed instantiation)
pub struct ComposedInvoker {
    descriptor: MethodDescriptor,
    entry: InvokerFn,
    depth: usize,
}

impl ComposedInvoker {
    /// The member this invoker serves
    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.descriptor
    }

    /// Number of links: hooks plus the innermost handler or base call
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn invoke(
        &self,
        target: &Arc<Instance>,
        args: &mut ArgumentEnvelope,
        base: &BaseAccessSlot,
    ) -> ProxyResult<Value> {
        let mut call = Invocation::new(target, &self.descriptor, args, base);
        (self.entry)(&mut call)
    }
}

impl fmt::Debug for ComposedInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposedInvoker")
            .field("method", &self.descriptor.to_string())
            .field("depth", &self.depth)
            .finish()
    }
}

/// Fold hooks (outer to inner) around the handler. Without a handler the
/// innermost link calls the base implementation.
pub(crate) fn compose(
    descriptor: MethodDescriptor,
    type_hooks: &[Arc<dyn Hook>],
    method_hooks: &[Arc<dyn Hook>],
    handler: Option<Arc<dyn InvocationHandler>>,
) -> ComposedInvoker {
    let innermost = match handler {
        Some(handler) => invoker(move |call| handler.invoke(call)),
        None => invoker(|call| call.proceed_base()),
    };

    let entry = type_hooks
        .iter()
        .chain(method_hooks)
        .rev()
        .fold(innermost, |inner, hook| {
            let hook = hook.clone();
            invoker(move |call| hook.intercept(call, Next { inner: &inner }))
        });

    ComposedInvoker {
        descriptor,
        entry,
        depth: type_hooks.len() + method_hooks.len() + 1,
    }
}

/// Per-closed-instantiation invokers of one generic member
pub(crate) struct GenericInvokers {
    member: MemberSlot,
    type_hooks: Vec<Arc<dyn Hook>>,
    method_hooks: Vec<Arc<dyn Hook>>,
    handler: Option<Arc<dyn InvocationHandler>>,
    closed: RwLock<FxHashMap<Vec<TypeInfo>, Arc<ComposedInvoker>>>,
}

impl GenericInvokers {
    pub(crate) fn new(
        member: MemberSlot,
        type_hooks: Vec<Arc<dyn Hook>>,
        method_hooks: Vec<Arc<dyn Hook>>,
        handler: Option<Arc<dyn InvocationHandler>>,
    ) -> Self {
        Self {
            member,
            type_hooks,
            method_hooks,
            handler,
            closed: RwLock::new(FxHashMap::default()),
        }
    }

    /// Invoker for the closed instantiation `type_args`, composed on first use
    pub(crate) fn resolve(&self, type_args: &[TypeInfo]) -> Arc<ComposedInvoker> {
        if let Some(found) = self.closed.read().get(type_args) {
            return found.clone();
        }

        let mut closed = self.closed.write();
        closed
            .entry(type_args.to_vec())
            .or_insert_with(|| {
                let descriptor = MethodDescriptor::for_member(&self.member, type_args);
                trace!(method = %descriptor, "composing closed generic invoker");
                Arc::new(compose(
                    descriptor,
                    &self.type_hooks,
                    &self.method_hooks,
                    self.handler.clone(),
                ))
            })
            .clone()
    }

    /// Closed instantiations composed so far
    pub(crate) fn instantiations(&self) -> usize {
        self.closed.read().len()
    }
}
