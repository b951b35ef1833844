//! Proxy type synthesis
//!
//! Each stage of the build lives in its own module:
//!
//! - [`classify`]: validates the prototype and sorts its members
//! - [`hooks`]: collects hook attributes into per-type storage
//! - [`compose`]: folds hooks and the handler into one invoker per member
//! - [`base_access`]: lets handlers reach the original implementation
//! - [`constructors`]: forwards every inheritable constructor
//! - [`overrides`]: the dispatch table of the synthesized type
//!
//! The orchestrator runs them in order and assembles a [`ProxyType`].

pub mod base_access;
pub mod classify;
pub mod compose;
pub mod constructors;
pub mod hooks;
pub(crate) mod orchestrator;
pub mod overrides;
pub mod proxy_type;

pub use base_access::BaseAccessSlot;
pub use classify::{Classification, MemberSlot};
pub use compose::{
    handler_fn, ComposedInvoker, Invocation, InvocationHandler, InvokerFn, MethodDescriptor, Next,
};
pub use constructors::ForwardingConstructor;
pub use hooks::{hook_fn, Hook, HookAttribute, HookDescriptor, HookFactory, HookScope, HookStorage};
pub use overrides::OverrideMethod;
pub use proxy_type::{ProxyFamily, ProxyType};
