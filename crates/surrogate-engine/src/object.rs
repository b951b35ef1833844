//! Instances of synthesized types and the call frame handed to member bodies
//!
//! An [`Instance`] owns one [`RefSlot`] per field so ref-returning members
//! can hand out aliases to its storage. Every call made through an instance
//! goes through its type's dispatch table, including calls prototype bodies
//! make on `this`, so those are intercepted too.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use surrogate_sdk::{ArgumentEnvelope, FromValue, ProxyError, ProxyResult, RefSlot, Value};

use crate::metadata::{Prototype, TypeInfo};
use crate::synth::proxy_type::CallSite;
use crate::synth::ProxyType;

/// Listener notified after a change-notification wrapper raised a change
pub type PropertyChangedListener = Arc<dyn Fn(&Arc<Instance>, &str) + Send + Sync>;

/// An object of a synthesized type
pub struct Instance {
    ty: Arc<ProxyType>,
    fields: FxHashMap<String, RefSlot>,
    listeners: Mutex<Vec<PropertyChangedListener>>,
}

impl Instance {
    /// Allocate an instance with every field at its initial value
    pub(crate) fn allocate(ty: &Arc<ProxyType>) -> Arc<Self> {
        let fields = ty
            .field_layout()
            .iter()
            .map(|(name, initial)| (name.clone(), RefSlot::new(initial.clone())))
            .collect();
        Arc::new(Self {
            ty: ty.clone(),
            fields,
            listeners: Mutex::new(Vec::new()),
        })
    }

    /// The synthesized type of this instance
    pub fn proxy_type(&self) -> &Arc<ProxyType> {
        &self.ty
    }

    /// Whether the instance satisfies `prototype` (is, derives from or implements it)
    pub fn is_instance_of(&self, prototype: &Prototype) -> bool {
        self.ty.prototype().is_assignable_to(prototype)
    }

    /// Call a public member by name. By-ref arguments are written back into `args`.
    pub fn invoke(self: &Arc<Self>, name: &str, args: &mut [Value]) -> ProxyResult<Value> {
        self.ty.dispatch(self, name, &[], args, CallSite::Outside)
    }

    /// Call a generic method with explicit type arguments
    pub fn invoke_generic(
        self: &Arc<Self>,
        name: &str,
        type_args: &[TypeInfo],
        args: &mut [Value],
    ) -> ProxyResult<Value> {
        self.ty.dispatch(self, name, type_args, args, CallSite::Outside)
    }

    /// Call any member, non-public ones included, from code of the type itself
    pub(crate) fn invoke_inside(
        self: &Arc<Self>,
        name: &str,
        type_args: &[TypeInfo],
        args: &mut [Value],
    ) -> ProxyResult<Value> {
        self.ty.dispatch(self, name, type_args, args, CallSite::Inside)
    }

    /// Call a member and unbox its result
    pub fn call<R: FromValue>(self: &Arc<Self>, name: &str, args: &mut [Value]) -> ProxyResult<R> {
        R::from_value(self.invoke(name, args)?)
    }

    /// Read a property
    pub fn get(self: &Arc<Self>, property: &str) -> ProxyResult<Value> {
        self.invoke(&format!("get_{}", property), &mut [])
    }

    /// Write a property
    pub fn set(self: &Arc<Self>, property: &str, value: impl Into<Value>) -> ProxyResult<()> {
        self.invoke(&format!("set_{}", property), &mut [value.into()])
            .map(|_| ())
    }

    /// Read through the indexer
    pub fn index_get(self: &Arc<Self>, index: &[Value]) -> ProxyResult<Value> {
        let mut args = index.to_vec();
        self.invoke("get_Item", &mut args)
    }

    /// Write through the indexer
    pub fn index_set(self: &Arc<Self>, index: &[Value], value: impl Into<Value>) -> ProxyResult<()> {
        let mut args = index.to_vec();
        args.push(value.into());
        self.invoke("set_Item", &mut args).map(|_| ())
    }

    /// Subscribe to an event
    pub fn subscribe(self: &Arc<Self>, event: &str, handler: Value) -> ProxyResult<()> {
        self.invoke(&format!("add_{}", event), &mut [handler]).map(|_| ())
    }

    /// Unsubscribe from an event
    pub fn unsubscribe(self: &Arc<Self>, event: &str, handler: Value) -> ProxyResult<()> {
        self.invoke(&format!("remove_{}", event), &mut [handler])
            .map(|_| ())
    }

    /// Storage slot of a field
    pub fn field(&self, name: &str) -> ProxyResult<RefSlot> {
        self.fields
            .get(name)
            .cloned()
            .ok_or_else(|| ProxyError::MemberNotFound(format!("{}.{}", self.ty.name(), name)))
    }

    /// Register a property-changed listener
    pub fn on_property_changed(&self, listener: impl Fn(&Arc<Instance>, &str) + Send + Sync + 'static) {
        self.listeners.lock().push(Arc::new(listener));
    }

    pub(crate) fn notify_listeners(self: &Arc<Self>, property: &str) {
        // Snapshot so listeners may register further listeners
        let listeners = self.listeners.lock().clone();
        for listener in listeners {
            listener(self, property);
        }
    }

    /// Box the instance as an object value
    pub fn to_value(self: &Arc<Self>) -> Value {
        Value::object(self.clone())
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.ty.name())
            .field("fields", &self.fields)
            .finish()
    }
}

/// What a member body sees while it runs
pub struct Frame<'a> {
    this: &'a Arc<Instance>,
    /// Arguments of the call; by-ref positions write through to the caller
    pub args: &'a mut ArgumentEnvelope,
    type_args: &'a [TypeInfo],
}

impl<'a> Frame<'a> {
    pub(crate) fn new(
        this: &'a Arc<Instance>,
        args: &'a mut ArgumentEnvelope,
        type_args: &'a [TypeInfo],
    ) -> Self {
        Self { this, args, type_args }
    }

    /// The target instance
    pub fn this(&self) -> &Arc<Instance> {
        self.this
    }

    /// Read and unbox an argument
    pub fn arg<T: FromValue>(&self, index: usize) -> ProxyResult<T> {
        self.args.arg(index)
    }

    /// Replace an argument (written through for by-ref positions)
    pub fn set_arg(&mut self, index: usize, value: impl Into<Value>) -> ProxyResult<()> {
        self.args.set(index, value)
    }

    /// Call a member on the target, non-public ones included
    pub fn invoke(&self, name: &str, args: &mut [Value]) -> ProxyResult<Value> {
        self.this.invoke_inside(name, &[], args)
    }

    /// Call a generic member on the target with explicit type arguments
    pub fn invoke_generic(&self, name: &str, type_args: &[TypeInfo], args: &mut [Value]) -> ProxyResult<Value> {
        self.this.invoke_inside(name, type_args, args)
    }

    /// Call a member on the target and unbox its result
    pub fn call<R: FromValue>(&self, name: &str, args: &mut [Value]) -> ProxyResult<R> {
        R::from_value(self.invoke(name, args)?)
    }

    /// Storage slot of a field of the target
    pub fn field(&self, name: &str) -> ProxyResult<RefSlot> {
        self.this.field(name)
    }

    /// Closed generic arguments of the running method
    pub fn type_args(&self) -> &[TypeInfo] {
        self.type_args
    }

    /// One closed generic argument
    pub fn type_arg(&self, index: usize) -> ProxyResult<&TypeInfo> {
        self.type_args.get(index).ok_or_else(|| {
            ProxyError::ArgumentError(format!("type argument {} was not supplied", index))
        })
    }
}
