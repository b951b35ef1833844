//! Member definitions: methods, constructors, properties, indexers, events
//!
//! Properties, indexers and events are sugar: each one desugars into
//! special-name accessor methods (`get_Name`, `set_Name`, `get_Item`,
//! `set_Item`, `add_Name`, `remove_Name`) which the classifier and the
//! override emitter then treat like any other method.

use std::fmt;
use std::sync::Arc;

use surrogate_sdk::{ProxyResult, Value};

use super::types::{GenericParam, Modifiers, TypeInfo, Visibility};
use crate::object::Frame;
use crate::synth::compose::{Invocation, InvocationHandler};
use crate::synth::hooks::HookAttribute;

/// Implementation of a method: receives the call frame, returns the boxed result
pub type MethodBody = Arc<dyn Fn(&mut Frame<'_>) -> ProxyResult<Value> + Send + Sync>;

/// Implementation of a constructor
pub type ConstructorBody = Arc<dyn Fn(&mut Frame<'_>) -> ProxyResult<()> + Send + Sync>;

/// How an argument is passed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassingMode {
    /// By value (boxed into the envelope)
    Value,
    /// By reference, read and write
    Ref,
    /// By reference, write only
    Out,
}

impl PassingMode {
    /// Travels as a `RefSlot` box
    pub fn is_by_ref(self) -> bool {
        !matches!(self, PassingMode::Value)
    }
}

/// Parameter definition for method and constructor signatures
#[derive(Debug, Clone)]
pub struct ParamDef {
    /// Parameter name
    pub name: String,
    /// Parameter type
    pub ty: TypeInfo,
    /// Passing mode
    pub mode: PassingMode,
    /// Declared default, making the parameter optional at call sites
    pub default: Option<Value>,
}

impl ParamDef {
    /// By-value parameter
    pub fn new(name: &str, ty: TypeInfo) -> Self {
        Self {
            name: name.to_string(),
            ty,
            mode: PassingMode::Value,
            default: None,
        }
    }

    /// Set the passing mode
    pub fn passed(mut self, mode: PassingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Declare a default value
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Whether the parameter may be elided
    pub fn is_optional(&self) -> bool {
        self.default.is_some()
    }
}

/// What a method hands back
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReturnKind {
    /// No value
    Void,
    /// A value of the given type
    Value(TypeInfo),
    /// A reference (`RefSlot`) to storage of the given type
    Ref(TypeInfo),
}

impl ReturnKind {
    /// Substitute generic parameters in the returned type
    pub fn substitute(&self, params: &[GenericParam], args: &[TypeInfo]) -> ReturnKind {
        match self {
            ReturnKind::Void => ReturnKind::Void,
            ReturnKind::Value(t) => ReturnKind::Value(t.substitute(params, args)),
            ReturnKind::Ref(t) => ReturnKind::Ref(t.substitute(params, args)),
        }
    }
}

impl fmt::Display for ReturnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnKind::Void => write!(f, "void"),
            ReturnKind::Value(t) => write!(f, "{}", t),
            ReturnKind::Ref(t) => write!(f, "ref {}", t),
        }
    }
}

/// Which property / indexer / event a special-name method implements
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AccessorKind {
    /// Property getter
    Getter(String),
    /// Property setter
    Setter(String),
    /// Indexer getter
    IndexGetter,
    /// Indexer setter
    IndexSetter,
    /// Event subscription
    EventAdd(String),
    /// Event unsubscription
    EventRemove(String),
}

/// Which external handler a member is bound to
#[derive(Clone, Default)]
pub enum HandlerBinding {
    /// Use the prototype-wide handler, if any
    #[default]
    Inherit,
    /// Use this member-specific handler
    Custom(Arc<dyn InvocationHandler>),
    /// No handler: the member calls straight through to its base implementation
    Passthrough,
}

/// Overload identity of a method
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    /// Method name
    pub name: String,
    /// Number of generic parameters
    pub generic_arity: usize,
    /// Parameter types and passing modes
    pub params: Vec<(TypeInfo, PassingMode)>,
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if self.generic_arity > 0 {
            write!(f, "`{}", self.generic_arity)?;
        }
        write!(f, "(")?;
        for (i, (ty, mode)) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match mode {
                PassingMode::Value => write!(f, "{}", ty)?,
                PassingMode::Ref => write!(f, "ref {}", ty)?,
                PassingMode::Out => write!(f, "out {}", ty)?,
            }
        }
        write!(f, ")")
    }
}

/// Definition of a method on a prototype
#[derive(Clone)]
pub struct MethodDef {
    /// Method name
    pub name: String,
    /// Parameters in order
    pub params: Vec<ParamDef>,
    /// Return kind
    pub returns: ReturnKind,
    /// Generic parameters (empty for non-generic methods)
    pub generic_params: Vec<GenericParam>,
    /// Accessibility
    pub visibility: Visibility,
    /// Modifier flags
    pub modifiers: Modifiers,
    /// Property / indexer / event this accessor belongs to
    pub accessor: Option<AccessorKind>,
    /// Implementation (None for abstract members)
    pub body: Option<MethodBody>,
    /// Method-scoped hook descriptors, in declaration order
    pub hooks: Vec<Arc<dyn HookAttribute>>,
    /// External handler binding
    pub handler: HandlerBinding,
}

impl MethodDef {
    /// Create a public, non-virtual, parameterless method returning nothing
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            params: Vec::new(),
            returns: ReturnKind::Void,
            generic_params: Vec::new(),
            visibility: Visibility::Public,
            modifiers: Modifiers::default(),
            accessor: None,
            body: None,
            hooks: Vec::new(),
            handler: HandlerBinding::Inherit,
        }
    }

    /// Add a by-value parameter
    pub fn param(mut self, name: &str, ty: TypeInfo) -> Self {
        self.params.push(ParamDef::new(name, ty));
        self
    }

    /// Add a `ref` parameter
    pub fn ref_param(mut self, name: &str, ty: TypeInfo) -> Self {
        self.params.push(ParamDef::new(name, ty).passed(PassingMode::Ref));
        self
    }

    /// Add an `out` parameter
    pub fn out_param(mut self, name: &str, ty: TypeInfo) -> Self {
        self.params.push(ParamDef::new(name, ty).passed(PassingMode::Out));
        self
    }

    /// Add a by-value parameter with a declared default
    pub fn optional_param(mut self, name: &str, ty: TypeInfo, default: impl Into<Value>) -> Self {
        self.params.push(ParamDef::new(name, ty).with_default(default));
        self
    }

    /// Add a fully specified parameter
    pub fn with_param(mut self, param: ParamDef) -> Self {
        self.params.push(param);
        self
    }

    /// Set the return type
    pub fn returns(mut self, ty: TypeInfo) -> Self {
        self.returns = ReturnKind::Value(ty);
        self
    }

    /// Return a reference to storage of the given type
    pub fn returns_ref(mut self, ty: TypeInfo) -> Self {
        self.returns = ReturnKind::Ref(ty);
        self
    }

    /// Add a generic parameter
    pub fn type_parameter(mut self, param: GenericParam) -> Self {
        self.generic_params.push(param);
        self
    }

    /// Set accessibility
    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Mark as virtual
    pub fn virtual_(mut self) -> Self {
        self.modifiers.is_virtual = true;
        self
    }

    /// Mark as abstract (implies virtual, drops any body)
    pub fn abstract_(mut self) -> Self {
        self.modifiers.is_abstract = true;
        self.modifiers.is_virtual = true;
        self.body = None;
        self
    }

    /// Mark as final (sealed override)
    pub fn final_(mut self) -> Self {
        self.modifiers.is_final = true;
        self
    }

    /// Mark as static
    pub fn static_(mut self) -> Self {
        self.modifiers.is_static = true;
        self
    }

    /// Provide the implementation
    pub fn body(
        mut self,
        body: impl Fn(&mut Frame<'_>) -> ProxyResult<Value> + Send + Sync + 'static,
    ) -> Self {
        self.body = Some(Arc::new(body));
        self
    }

    /// Attach a method-scoped hook descriptor
    pub fn hook(mut self, hook: impl HookAttribute + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Attach a hook descriptor shared with other declarations
    pub fn shared_hook(mut self, hook: Arc<dyn HookAttribute>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Bind a member-specific external handler
    pub fn handler(
        mut self,
        handler: impl Fn(&mut Invocation<'_>) -> ProxyResult<Value> + Send + Sync + 'static,
    ) -> Self {
        self.handler = HandlerBinding::Custom(Arc::new(handler));
        self
    }

    /// Bind a member-specific handler shared with other declarations
    pub fn shared_handler(mut self, handler: Arc<dyn InvocationHandler>) -> Self {
        self.handler = HandlerBinding::Custom(handler);
        self
    }

    /// Opt this member out of the external handler
    pub fn passthrough(mut self) -> Self {
        self.handler = HandlerBinding::Passthrough;
        self
    }

    /// Mark as an accessor of a property, indexer or event
    pub fn accessor_of(mut self, kind: AccessorKind) -> Self {
        self.accessor = Some(kind);
        self
    }

    /// Overload identity
    pub fn signature(&self) -> MethodSignature {
        MethodSignature {
            name: self.name.clone(),
            generic_arity: self.generic_params.len(),
            params: self.params.iter().map(|p| (p.ty.clone(), p.mode)).collect(),
        }
    }

    /// Property / event accessor (special name)
    pub fn is_special_name(&self) -> bool {
        self.accessor.is_some()
    }

    /// Generic method
    pub fn is_generic(&self) -> bool {
        !self.generic_params.is_empty()
    }

    /// Parameters that must be supplied at every call site
    pub fn required_params(&self) -> usize {
        self.params.iter().filter(|p| !p.is_optional()).count()
    }
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef")
            .field("signature", &self.signature().to_string())
            .field("returns", &self.returns)
            .field("visibility", &self.visibility)
            .field("modifiers", &self.modifiers)
            .field("accessor", &self.accessor)
            .field("has_body", &self.body.is_some())
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

/// Definition of a constructor
#[derive(Clone)]
pub struct ConstructorDef {
    /// Parameters in order
    pub params: Vec<ParamDef>,
    /// Accessibility
    pub visibility: Visibility,
    /// Constructor logic run after fields are initialised
    pub body: Option<ConstructorBody>,
}

impl ConstructorDef {
    /// Public parameterless constructor with no logic
    pub fn new() -> Self {
        Self {
            params: Vec::new(),
            visibility: Visibility::Public,
            body: None,
        }
    }

    /// Add a by-value parameter
    pub fn param(mut self, name: &str, ty: TypeInfo) -> Self {
        self.params.push(ParamDef::new(name, ty));
        self
    }

    /// Add a by-value parameter with a default
    pub fn optional_param(mut self, name: &str, ty: TypeInfo, default: impl Into<Value>) -> Self {
        self.params.push(ParamDef::new(name, ty).with_default(default));
        self
    }

    /// Add a fully specified parameter
    pub fn with_param(mut self, param: ParamDef) -> Self {
        self.params.push(param);
        self
    }

    /// Set accessibility
    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Provide the constructor logic
    pub fn body(mut self, body: impl Fn(&mut Frame<'_>) -> ProxyResult<()> + Send + Sync + 'static) -> Self {
        self.body = Some(Arc::new(body));
        self
    }

    /// Parameters that must be supplied
    pub fn required_params(&self) -> usize {
        self.params.iter().filter(|p| !p.is_optional()).count()
    }
}

impl Default for ConstructorDef {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConstructorDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorDef")
            .field("params", &self.params)
            .field("visibility", &self.visibility)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// Zero value of a type, used for auto-property backing fields and `out` slots
pub fn default_value(ty: &TypeInfo) -> Value {
    match ty.name.as_str() {
        "bool" if ty.is_value_type() => Value::Bool(false),
        "i32" if ty.is_value_type() => Value::I32(0),
        "i64" if ty.is_value_type() => Value::I64(0),
        "f64" if ty.is_value_type() => Value::F64(0.0),
        _ => Value::Null,
    }
}

/// Name of the field backing an auto-implemented property
pub fn backing_field_name(property: &str) -> String {
    format!("<{}>k__BackingField", property)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AccessorShape {
    Abstract,
    Virtual,
}

/// Property declaration; desugars into `get_Name` / `set_Name`
#[derive(Debug, Clone)]
pub struct PropertyDef {
    /// Property name
    pub name: String,
    /// Property type
    pub ty: TypeInfo,
    getter: Option<MethodDef>,
    setter: Option<MethodDef>,
    backing_field: bool,
}

impl PropertyDef {
    /// Property with no accessors yet; add them with `get` / `set`
    pub fn new(name: &str, ty: TypeInfo) -> Self {
        Self {
            name: name.to_string(),
            ty,
            getter: None,
            setter: None,
            backing_field: false,
        }
    }

    /// Virtual auto-property backed by a generated field
    pub fn auto(name: &str, ty: TypeInfo) -> Self {
        let field = backing_field_name(name);
        let get_field = field.clone();
        let set_field = field;
        Self::new(name, ty)
            .get(move |frame| Ok(frame.field(&get_field)?.get()))
            .set(move |frame| {
                let value = frame.args.get(0)?;
                frame.field(&set_field)?.set(value);
                Ok(Value::Null)
            })
            .with_backing_field()
    }

    /// Abstract read/write property (interfaces, abstract classes)
    pub fn abstract_(name: &str, ty: TypeInfo) -> Self {
        let mut prop = Self::new(name, ty);
        prop.getter = Some(prop.getter_def(AccessorShape::Abstract));
        prop.setter = Some(prop.setter_def(AccessorShape::Abstract));
        prop
    }

    /// Virtual getter
    pub fn get(mut self, body: impl Fn(&mut Frame<'_>) -> ProxyResult<Value> + Send + Sync + 'static) -> Self {
        self.getter = Some(self.getter_def(AccessorShape::Virtual).body(body));
        self
    }

    /// Virtual setter; the new value is argument 0
    pub fn set(mut self, body: impl Fn(&mut Frame<'_>) -> ProxyResult<Value> + Send + Sync + 'static) -> Self {
        self.setter = Some(self.setter_def(AccessorShape::Virtual).body(body));
        self
    }

    /// Drop the setter
    pub fn read_only(mut self) -> Self {
        self.setter = None;
        self
    }

    /// Make both accessors non-overridable
    pub fn sealed(mut self) -> Self {
        for accessor in [self.getter.as_mut(), self.setter.as_mut()].into_iter().flatten() {
            accessor.modifiers.is_virtual = false;
            accessor.modifiers.is_abstract = false;
        }
        self
    }

    /// Attach a hook to both accessors
    pub fn hook(mut self, hook: impl HookAttribute + 'static) -> Self {
        let hook: Arc<dyn HookAttribute> = Arc::new(hook);
        for accessor in [self.getter.as_mut(), self.setter.as_mut()].into_iter().flatten() {
            accessor.hooks.push(hook.clone());
        }
        self
    }

    fn with_backing_field(mut self) -> Self {
        self.backing_field = true;
        self
    }

    fn getter_def(&self, shape: AccessorShape) -> MethodDef {
        let def = MethodDef::new(&format!("get_{}", self.name))
            .returns(self.ty.clone())
            .accessor_of(AccessorKind::Getter(self.name.clone()));
        apply_shape(def, shape)
    }

    fn setter_def(&self, shape: AccessorShape) -> MethodDef {
        let def = MethodDef::new(&format!("set_{}", self.name))
            .param("value", self.ty.clone())
            .accessor_of(AccessorKind::Setter(self.name.clone()));
        apply_shape(def, shape)
    }

    /// Accessor methods plus the backing field (name, initial value) if any
    pub fn into_members(self) -> (Vec<MethodDef>, Option<(String, Value)>) {
        let field = self
            .backing_field
            .then(|| (backing_field_name(&self.name), default_value(&self.ty)));
        let methods = self.getter.into_iter().chain(self.setter).collect();
        (methods, field)
    }
}

fn apply_shape(def: MethodDef, shape: AccessorShape) -> MethodDef {
    match shape {
        AccessorShape::Abstract => def.abstract_(),
        AccessorShape::Virtual => def.virtual_(),
    }
}

/// Indexer declaration; desugars into `get_Item` / `set_Item`
#[derive(Debug, Clone)]
pub struct IndexerDef {
    /// Element type
    pub ty: TypeInfo,
    /// Index parameters
    pub index: Vec<ParamDef>,
    getter: Option<MethodDef>,
    setter: Option<MethodDef>,
}

impl IndexerDef {
    /// Indexer with the given element type and one index parameter
    pub fn new(ty: TypeInfo, index_name: &str, index_ty: TypeInfo) -> Self {
        Self {
            ty,
            index: vec![ParamDef::new(index_name, index_ty)],
            getter: None,
            setter: None,
        }
    }

    /// Additional index parameter
    pub fn index_param(mut self, name: &str, ty: TypeInfo) -> Self {
        self.index.push(ParamDef::new(name, ty));
        self
    }

    /// Abstract getter and setter
    pub fn abstract_(mut self) -> Self {
        self.getter = Some(self.getter_def(AccessorShape::Abstract));
        self.setter = Some(self.setter_def(AccessorShape::Abstract));
        self
    }

    /// Virtual getter
    pub fn get(mut self, body: impl Fn(&mut Frame<'_>) -> ProxyResult<Value> + Send + Sync + 'static) -> Self {
        self.getter = Some(self.getter_def(AccessorShape::Virtual).body(body));
        self
    }

    /// Virtual setter; the value follows the index arguments
    pub fn set(mut self, body: impl Fn(&mut Frame<'_>) -> ProxyResult<Value> + Send + Sync + 'static) -> Self {
        self.setter = Some(self.setter_def(AccessorShape::Virtual).body(body));
        self
    }

    fn getter_def(&self, shape: AccessorShape) -> MethodDef {
        let mut def = MethodDef::new("get_Item")
            .returns(self.ty.clone())
            .accessor_of(AccessorKind::IndexGetter);
        def.params = self.index.clone();
        apply_shape(def, shape)
    }

    fn setter_def(&self, shape: AccessorShape) -> MethodDef {
        let mut def = MethodDef::new("set_Item").accessor_of(AccessorKind::IndexSetter);
        def.params = self.index.clone();
        apply_shape(def.param("value", self.ty.clone()), shape)
    }

    /// Accessor methods
    pub fn into_members(self) -> Vec<MethodDef> {
        self.getter.into_iter().chain(self.setter).collect()
    }
}

/// Event declaration; desugars into `add_Name` / `remove_Name`
#[derive(Debug, Clone)]
pub struct EventDef {
    /// Event name
    pub name: String,
    adder: MethodDef,
    remover: MethodDef,
}

impl EventDef {
    /// Abstract event
    pub fn abstract_(name: &str) -> Self {
        Self {
            name: name.to_string(),
            adder: Self::accessor("add_", name, AccessorKind::EventAdd(name.to_string())).abstract_(),
            remover: Self::accessor("remove_", name, AccessorKind::EventRemove(name.to_string()))
                .abstract_(),
        }
    }

    /// Virtual event with explicit subscribe / unsubscribe logic
    pub fn new(
        name: &str,
        add: impl Fn(&mut Frame<'_>) -> ProxyResult<Value> + Send + Sync + 'static,
        remove: impl Fn(&mut Frame<'_>) -> ProxyResult<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            adder: Self::accessor("add_", name, AccessorKind::EventAdd(name.to_string()))
                .virtual_()
                .body(add),
            remover: Self::accessor("remove_", name, AccessorKind::EventRemove(name.to_string()))
                .virtual_()
                .body(remove),
        }
    }

    fn accessor(prefix: &str, name: &str, kind: AccessorKind) -> MethodDef {
        MethodDef::new(&format!("{}{}", prefix, name))
            .param("handler", TypeInfo::object())
            .accessor_of(kind)
    }

    /// Accessor methods
    pub fn into_members(self) -> Vec<MethodDef> {
        vec![self.adder, self.remover]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_definition() {
        let method = MethodDef::new("Increase")
            .ref_param("x", TypeInfo::i32())
            .optional_param("step", TypeInfo::i32(), 1)
            .virtual_();

        assert_eq!(method.name, "Increase");
        assert_eq!(method.required_params(), 1);
        assert!(method.modifiers.is_virtual);
        assert!(!method.modifiers.is_abstract);
        assert_eq!(method.signature().to_string(), "Increase(ref i32, i32)");
    }

    #[test]
    fn test_abstract_drops_body() {
        let method = MethodDef::new("Run").body(|_| Ok(Value::Null)).abstract_();
        assert!(method.body.is_none());
        assert!(method.modifiers.is_virtual);
    }

    #[test]
    fn test_generic_signature() {
        let method = MethodDef::new("Create")
            .type_parameter(GenericParam::new("T"))
            .returns(TypeInfo::generic("T"));
        assert!(method.is_generic());
        assert_eq!(method.signature().to_string(), "Create`1()");
    }

    #[test]
    fn test_auto_property_desugars() {
        let (methods, field) = PropertyDef::auto("Name", TypeInfo::string()).into_members();
        let names: Vec<_> = methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["get_Name", "set_Name"]);
        assert!(methods.iter().all(|m| m.modifiers.is_virtual && m.body.is_some()));
        assert_eq!(field, Some(("<Name>k__BackingField".to_string(), Value::Null)));
    }

    #[test]
    fn test_read_only_sealed_property() {
        let (methods, field) = PropertyDef::auto("Id", TypeInfo::i32())
            .read_only()
            .sealed()
            .into_members();
        assert_eq!(methods.len(), 1);
        assert!(!methods[0].modifiers.is_virtual);
        assert_eq!(field.map(|(_, v)| v), Some(Value::I32(0)));
    }

    #[test]
    fn test_indexer_desugars() {
        let methods = IndexerDef::new(TypeInfo::string(), "index", TypeInfo::i32())
            .abstract_()
            .into_members();
        assert_eq!(methods[0].signature().to_string(), "get_Item(i32)");
        assert_eq!(methods[1].signature().to_string(), "set_Item(i32, string)");
        assert!(methods.iter().all(|m| m.modifiers.is_abstract));
    }

    #[test]
    fn test_event_desugars() {
        let methods = EventDef::abstract_("Changed").into_members();
        assert_eq!(methods[0].name, "add_Changed");
        assert_eq!(methods[1].accessor, Some(AccessorKind::EventRemove("Changed".to_string())));
    }
}
