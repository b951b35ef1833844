//! Surrogate Engine
//!
//! Runtime synthesis of derived types from prototype metadata:
//! - **Interception proxies**: every overridable member routed through a
//!   chain of hooks and an external invocation handler (`synth` module)
//! - **Change-notification wrappers**: property setters raise a callback
//!   when the stored value changes
//! - **Registry**: one synthesized type per prototype and family, built on
//!   first request (`registry` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use surrogate_engine::{MethodDef, Prototype, TypeInfo, Value};
//!
//! let greeter = Prototype::interface("IGreeter")
//!     .method(MethodDef::new("Greet").param("name", TypeInfo::string()).returns(TypeInfo::string()))
//!     .handler(|call| {
//!         let name: String = call.arg(0)?;
//!         Ok(Value::from(format!("hello {}", name)))
//!     })
//!     .build();
//!
//! let ty = surrogate_engine::proxy_type(&greeter)?;
//! let obj = ty.instantiate(&mut [])?;
//! assert_eq!(obj.call::<String>("Greet", &mut [Value::from("ada")])?, "hello ada");
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

use std::sync::Arc;

/// Synthesis options and their TOML form
pub mod config;

/// Prototype metadata: types, members and prototypes
pub mod metadata;

/// Instances of synthesized types
pub mod object;

/// Process-wide cache of synthesized types
pub mod registry;

/// Synthesis stages and the synthesized type
pub mod synth;

mod notify;

pub use config::SynthesisOptions;
pub use metadata::{
    AccessorKind, ConstructorDef, EventDef, GenericConstraint, GenericParam, HandlerBinding,
    IndexerDef, MethodDef, MethodSignature, ParamDef, PassingMode, PropertyDef, Prototype,
    PrototypeBuilder, PrototypeId, PrototypeKind, ReturnKind, TypeInfo, TypeKind, Visibility,
};
pub use object::{Frame, Instance, PropertyChangedListener};
pub use registry::ProxyRegistry;
pub use synth::{
    handler_fn, hook_fn, ComposedInvoker, Hook, HookAttribute, HookFactory, Invocation,
    InvocationHandler, MethodDescriptor, Next, ProxyFamily, ProxyType,
};

pub use surrogate_sdk::{
    ArgumentEnvelope, FromValue, IntoValue, ObjectRef, ProxyError, ProxyResult, RefSlot, Value,
};

/// Interception proxy type for `prototype`, from the global registry
pub fn proxy_type(prototype: &Prototype) -> ProxyResult<Arc<ProxyType>> {
    ProxyRegistry::global().get_or_build(prototype)
}

/// Change-notification wrapper type for `prototype`, from the global registry
pub fn notifier_type(prototype: &Prototype) -> ProxyResult<Arc<ProxyType>> {
    ProxyRegistry::global().get_or_build_notifier(prototype)
}
