//! Prototype descriptors
//!
//! A prototype is the interface or class whose shape a synthesized type has
//! to satisfy. Prototypes are described explicitly through
//! [`PrototypeBuilder`] and are immutable once built; their identity (the key
//! the registry caches on) is a process-unique [`PrototypeId`].
//!
//! ```ignore
//! let greeter = Prototype::interface("IGreeter")
//!     .method(MethodDef::new("Greet").param("name", TypeInfo::string()).returns(TypeInfo::string()))
//!     .handler(|_call| Ok(Value::from("hello")))
//!     .build();
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use surrogate_sdk::{ProxyResult, Value};

use super::member::{ConstructorDef, EventDef, IndexerDef, MethodDef, PropertyDef};
use super::types::{GenericParam, TypeInfo, Visibility};
use crate::synth::compose::{Invocation, InvocationHandler};
use crate::synth::hooks::HookAttribute;

/// Global counter for prototype IDs
static NEXT_PROTOTYPE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a prototype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrototypeId(u64);

impl PrototypeId {
    fn next() -> Self {
        PrototypeId(NEXT_PROTOTYPE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw ID
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Interface or class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrototypeKind {
    /// Pure contract; the synthesized type derives from `object`
    Interface,
    /// Class; the synthesized type derives from it
    Class,
}

/// Complete, immutable description of a prototype
pub struct PrototypeDef {
    id: PrototypeId,
    /// Type name
    pub name: String,
    /// Interface or class
    pub kind: PrototypeKind,
    /// Accessibility of the type itself
    pub visibility: Visibility,
    /// Sealed classes cannot be derived from
    pub is_sealed: bool,
    /// Generic parameters of the type definition
    pub generic_params: Vec<GenericParam>,
    /// Generic arguments closing the definition
    pub type_arguments: Vec<TypeInfo>,
    /// Base class
    pub parent: Option<Prototype>,
    /// Implemented (or, for interfaces, inherited) interfaces
    pub interfaces: Vec<Prototype>,
    /// Instance fields declared on this type, with initial values
    pub fields: Vec<(String, Value)>,
    /// Declared constructors
    pub constructors: Vec<ConstructorDef>,
    /// Declared methods, including desugared accessors
    pub methods: Vec<MethodDef>,
    /// Type-scoped hook descriptors, in declaration order
    pub hooks: Vec<Arc<dyn HookAttribute>>,
    /// External handler used by members without their own binding
    pub handler: Option<Arc<dyn InvocationHandler>>,
    /// Notification callback override for change-notification wrappers
    pub notify_callback: Option<String>,
}

impl PrototypeDef {
    /// Identity
    pub fn id(&self) -> PrototypeId {
        self.id
    }

    /// Interface prototype
    pub fn is_interface(&self) -> bool {
        self.kind == PrototypeKind::Interface
    }

    /// Still has unresolved generic parameters
    pub fn is_open_generic(&self) -> bool {
        (!self.generic_params.is_empty() && self.type_arguments.len() != self.generic_params.len())
            || self.type_arguments.iter().any(TypeInfo::is_open)
    }

    /// Name including generic arguments, e.g. `Repository<User>`
    pub fn display_name(&self) -> String {
        self.type_info().to_string()
    }

    /// The prototype as a type reference
    pub fn type_info(&self) -> TypeInfo {
        let info = match self.kind {
            PrototypeKind::Interface => TypeInfo::interface(&self.name),
            PrototypeKind::Class => TypeInfo::class(&self.name),
        };
        if self.type_arguments.is_empty() {
            info.with_arguments(self.generic_params.iter().map(|p| TypeInfo::generic(&p.name)).collect())
        } else {
            info.with_arguments(self.type_arguments.clone())
        }
    }

    /// Base classes, nearest first
    pub fn ancestors(&self) -> impl Iterator<Item = &Prototype> {
        std::iter::successors(self.parent.as_ref(), |p| p.parent.as_ref())
    }

    /// Declared methods named `name`
    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MethodDef> + 'a {
        self.methods.iter().filter(move |m| m.name == name)
    }
}

impl fmt::Debug for PrototypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrototypeDef")
            .field("id", &self.id)
            .field("name", &self.display_name())
            .field("kind", &self.kind)
            .field("visibility", &self.visibility)
            .field("is_sealed", &self.is_sealed)
            .field("parent", &self.parent.as_ref().map(|p| p.name.clone()))
            .field("methods", &self.methods.len())
            .field("constructors", &self.constructors.len())
            .field("hooks", &self.hooks.len())
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

/// Shared handle to an immutable prototype; equality and hashing are by identity
#[derive(Clone)]
pub struct Prototype(Arc<PrototypeDef>);

impl Prototype {
    /// Start describing an interface prototype
    pub fn interface(name: &str) -> PrototypeBuilder {
        PrototypeBuilder::new(name, PrototypeKind::Interface)
    }

    /// Start describing a class prototype
    pub fn class(name: &str) -> PrototypeBuilder {
        PrototypeBuilder::new(name, PrototypeKind::Class)
    }

    /// Same prototype
    pub fn ptr_eq(&self, other: &Prototype) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Whether `self` is `other` or derives from / implements it
    pub fn is_assignable_to(&self, other: &Prototype) -> bool {
        if self.id() == other.id() {
            return true;
        }
        self.parent.iter().chain(self.interfaces.iter()).any(|p| p.is_assignable_to(other))
    }
}

impl Deref for Prototype {
    type Target = PrototypeDef;

    fn deref(&self) -> &PrototypeDef {
        &self.0
    }
}

impl PartialEq for Prototype {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Prototype {}

impl Hash for Prototype {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for Prototype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Builder for prototype descriptors
pub struct PrototypeBuilder {
    def: PrototypeDef,
}

impl PrototypeBuilder {
    fn new(name: &str, kind: PrototypeKind) -> Self {
        Self {
            def: PrototypeDef {
                id: PrototypeId::next(),
                name: name.to_string(),
                kind,
                visibility: Visibility::Public,
                is_sealed: false,
                generic_params: Vec::new(),
                type_arguments: Vec::new(),
                parent: None,
                interfaces: Vec::new(),
                fields: Vec::new(),
                constructors: Vec::new(),
                methods: Vec::new(),
                hooks: Vec::new(),
                handler: None,
                notify_callback: None,
            },
        }
    }

    /// Set accessibility of the type
    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.def.visibility = visibility;
        self
    }

    /// Mark the class sealed
    pub fn sealed(mut self) -> Self {
        self.def.is_sealed = true;
        self
    }

    /// Declare a generic parameter of the type definition
    pub fn type_parameter(mut self, param: GenericParam) -> Self {
        self.def.generic_params.push(param);
        self
    }

    /// Close the generic definition with concrete arguments
    pub fn type_arguments(mut self, args: Vec<TypeInfo>) -> Self {
        self.def.type_arguments = args;
        self
    }

    /// Set the base class
    pub fn extends(mut self, parent: &Prototype) -> Self {
        self.def.parent = Some(parent.clone());
        self
    }

    /// Implement (or, for interfaces, inherit) an interface
    pub fn implements(mut self, interface: &Prototype) -> Self {
        self.def.interfaces.push(interface.clone());
        self
    }

    /// Declare an instance field with its initial value
    pub fn field(mut self, name: &str, initial: impl Into<Value>) -> Self {
        self.def.fields.push((name.to_string(), initial.into()));
        self
    }

    /// Declare a constructor
    pub fn constructor(mut self, ctor: ConstructorDef) -> Self {
        self.def.constructors.push(ctor);
        self
    }

    /// Declare a method
    pub fn method(mut self, method: MethodDef) -> Self {
        self.def.methods.push(method);
        self
    }

    /// Declare a property
    pub fn property(mut self, property: PropertyDef) -> Self {
        let (methods, field) = property.into_members();
        self.def.methods.extend(methods);
        self.def.fields.extend(field);
        self
    }

    /// Declare an indexer
    pub fn indexer(mut self, indexer: IndexerDef) -> Self {
        self.def.methods.extend(indexer.into_members());
        self
    }

    /// Declare an event
    pub fn event(mut self, event: EventDef) -> Self {
        self.def.methods.extend(event.into_members());
        self
    }

    /// Attach a type-scoped hook descriptor
    pub fn hook(mut self, hook: impl HookAttribute + 'static) -> Self {
        self.def.hooks.push(Arc::new(hook));
        self
    }

    /// Attach a type-scoped hook descriptor shared with other declarations
    pub fn shared_hook(mut self, hook: Arc<dyn HookAttribute>) -> Self {
        self.def.hooks.push(hook);
        self
    }

    /// Set the external handler for every member without its own binding
    pub fn handler(
        mut self,
        handler: impl Fn(&mut Invocation<'_>) -> ProxyResult<Value> + Send + Sync + 'static,
    ) -> Self {
        self.def.handler = Some(Arc::new(handler));
        self
    }

    /// Set the external handler from a shared instance
    pub fn shared_handler(mut self, handler: Arc<dyn InvocationHandler>) -> Self {
        self.def.handler = Some(handler);
        self
    }

    /// Name of the method change-notification wrappers call on every change
    pub fn notify_callback(mut self, name: &str) -> Self {
        self.def.notify_callback = Some(name.to_string());
        self
    }

    /// Finish the descriptor.
    ///
    /// Interface members are implicitly virtual instance members; those
    /// without a body are abstract.
    pub fn build(mut self) -> Prototype {
        if self.def.kind == PrototypeKind::Interface {
            for method in self.def.methods.iter_mut().filter(|m| !m.modifiers.is_static) {
                method.modifiers.is_virtual = true;
                method.modifiers.is_final = false;
                method.modifiers.is_abstract = method.body.is_none();
            }
        }
        Prototype(Arc::new(self.def))
    }
}
