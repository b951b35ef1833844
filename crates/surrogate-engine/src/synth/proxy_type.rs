//! The finished synthesized type

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use surrogate_sdk::{ProxyError, ProxyResult, Value};
use tracing::trace;

use super::base_access::BaseAccessSlot;
use super::classify::MemberSlot;
use super::constructors::ForwardingConstructor;
use super::hooks::HookStorage;
use super::overrides::OverrideMethod;
use crate::metadata::{GenericParam, ParamDef, PassingMode, Prototype, TypeInfo, TypeKind};
use crate::object::Instance;

/// Which family of derived type was synthesized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyFamily {
    /// Every overridable member routed through hooks and the external handler
    Interception,
    /// Property setters raise change notifications
    ChangeNotification,
}

/// Where a call into a synthesized type comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallSite {
    /// Outside code; only public members resolve
    Outside,
    /// A member body or generated body of the type itself
    Inside,
}

/// Pieces produced by the synthesis stages, assembled into a `ProxyType`
pub(crate) struct TypeParts {
    pub members: Vec<MemberSlot>,
    pub base_slots: Vec<Arc<BaseAccessSlot>>,
    pub hooks: HookStorage,
    pub constructors: Vec<ForwardingConstructor>,
    pub overrides: Vec<OverrideMethod>,
    pub fields: Vec<(String, Value)>,
}

/// A type synthesized from a prototype
pub struct ProxyType {
    name: String,
    family: ProxyFamily,
    prototype: Prototype,
    members: Vec<MemberSlot>,
    base_slots: Vec<Arc<BaseAccessSlot>>,
    hooks: HookStorage,
    constructors: Vec<ForwardingConstructor>,
    overrides: Vec<OverrideMethod>,
    by_name: FxHashMap<String, Vec<usize>>,
    fields: Vec<(String, Value)>,
    enforce_constraints: bool,
}

impl ProxyType {
    pub(crate) fn assemble(
        name: String,
        family: ProxyFamily,
        prototype: Prototype,
        parts: TypeParts,
        enforce_constraints: bool,
    ) -> Self {
        let mut by_name: FxHashMap<String, Vec<usize>> = FxHashMap::default();
        for (index, method) in parts.overrides.iter().enumerate() {
            by_name.entry(method.name().to_string()).or_default().push(index);
        }
        Self {
            name,
            family,
            prototype,
            members: parts.members,
            base_slots: parts.base_slots,
            hooks: parts.hooks,
            constructors: parts.constructors,
            overrides: parts.overrides,
            by_name,
            fields: parts.fields,
            enforce_constraints,
        }
    }

    /// Unique type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Family of the type
    pub fn family(&self) -> ProxyFamily {
        self.family
    }

    /// The prototype the type derives from
    pub fn prototype(&self) -> &Prototype {
        &self.prototype
    }

    /// Classified members, aligned with `base_slots` and `overrides`
    pub fn members(&self) -> &[MemberSlot] {
        &self.members
    }

    /// Members the type overrides
    pub fn overridable_members(&self) -> impl Iterator<Item = &MemberSlot> {
        self.members.iter().filter(|m| m.overridable)
    }

    /// Base-access slots, one per member
    pub fn base_slots(&self) -> &[Arc<BaseAccessSlot>] {
        &self.base_slots
    }

    /// Hook storage fields
    pub fn hooks(&self) -> &HookStorage {
        &self.hooks
    }

    /// Forwarding constructors
    pub fn constructors(&self) -> &[ForwardingConstructor] {
        &self.constructors
    }

    /// Dispatch table
    pub fn overrides(&self) -> &[OverrideMethod] {
        &self.overrides
    }

    /// Dispatch entries named `name`
    pub fn methods_named<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a OverrideMethod> + 'a {
        self.by_name
            .get(name)
            .into_iter()
            .flatten()
            .map(move |&index| &self.overrides[index])
    }

    /// Instance fields with initial values
    pub fn field_layout(&self) -> &[(String, Value)] {
        &self.fields
    }

    /// Create an instance through the best-matching forwarding constructor
    pub fn instantiate(self: &Arc<Self>, args: &mut [Value]) -> ProxyResult<Arc<Instance>> {
        let what = format!("{}..ctor", self.name);
        let ctor = select(
            &what,
            self.constructors.iter().map(|c| (c, c.params(), &[][..])),
            &[],
            args,
        )?;
        let instance = Instance::allocate(self);
        ctor.construct(&instance, args)?;
        trace!(ty = %self.name, "instantiated");
        Ok(instance)
    }

    pub(crate) fn dispatch(
        &self,
        this: &Arc<Instance>,
        name: &str,
        type_args: &[TypeInfo],
        args: &mut [Value],
        site: CallSite,
    ) -> ProxyResult<Value> {
        let method = self.resolve(name, type_args, args, site)?;
        trace!(ty = %self.name, method = %method.signature(), "dispatch");
        method.call(this, type_args, args, self.enforce_constraints)
    }

    fn resolve(
        &self,
        name: &str,
        type_args: &[TypeInfo],
        args: &[Value],
        site: CallSite,
    ) -> ProxyResult<&OverrideMethod> {
        let what = format!("{}.{}", self.name, name);
        let candidates: Vec<&OverrideMethod> = self
            .by_name
            .get(name)
            .into_iter()
            .flatten()
            .map(|&i| &self.overrides[i])
            .filter(|m| site == CallSite::Inside || m.method().visibility.is_externally_visible())
            .collect();
        if candidates.is_empty() {
            return Err(ProxyError::MemberNotFound(what));
        }
        select(
            &what,
            candidates.into_iter().map(|m| (m, m.params(), m.generic_params())),
            type_args,
            args,
        )
    }
}

impl fmt::Debug for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyType")
            .field("name", &self.name)
            .field("family", &self.family)
            .field("prototype", &self.prototype.display_name())
            .field("constructors", &self.constructors.len())
            .field("overrides", &self.overrides)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

/// How well a candidate fits a call; ordered so the best fit is the maximum
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
struct Fit {
    specificity: usize,
    exact_arity: bool,
}

fn fit(params: &[ParamDef], generics: &[GenericParam], type_args: &[TypeInfo], args: &[Value]) -> Option<Fit> {
    if generics.len() != type_args.len() {
        return None;
    }
    let required = params.iter().filter(|p| !p.is_optional()).count();
    if args.len() < required || args.len() > params.len() {
        return None;
    }

    let mut specificity = 0;
    for (param, arg) in params.iter().zip(args) {
        let ty = param.ty.substitute(generics, type_args);
        let accepted = if param.mode.is_by_ref() {
            matches!(arg, Value::Ref(_)) || param.mode == PassingMode::Out || ty.accepts(arg)
        } else {
            ty.accepts(&arg.deref_value())
        };
        if !accepted {
            return None;
        }
        if ty.kind != TypeKind::GenericParameter && ty.name != "object" {
            specificity += 1;
        }
    }
    Some(Fit {
        specificity,
        exact_arity: args.len() == params.len(),
    })
}

/// Overload resolution over `candidates`
fn select<'a, T>(
    what: &str,
    candidates: impl Iterator<Item = (&'a T, &'a [ParamDef], &'a [GenericParam])>,
    type_args: &[TypeInfo],
    args: &[Value],
) -> ProxyResult<&'a T> {
    let mut fitting: Vec<(&'a T, Fit)> = candidates
        .filter_map(|(candidate, params, generics)| {
            fit(params, generics, type_args, args).map(|f| (candidate, f))
        })
        .collect();

    let best = fitting.iter().map(|(_, f)| *f).max().unwrap_or_default();
    fitting.retain(|(_, f)| *f == best);

    match fitting.as_slice() {
        [] => Err(ProxyError::ArgumentError(format!(
            "no overload of {} accepts ({})",
            what,
            args.iter().map(Value::type_name).collect::<Vec<_>>().join(", ")
        ))),
        [(only, _)] => Ok(*only),
        many => Err(ProxyError::ArgumentError(format!(
            "call to {} is ambiguous between {} overloads",
            what,
            many.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{GenericConstraint, MethodDef};
    use crate::registry::ProxyRegistry;

    fn overloaded() -> Prototype {
        Prototype::class("Printer")
            .method(
                MethodDef::new("Print")
                    .param("v", TypeInfo::i32())
                    .returns(TypeInfo::string())
                    .virtual_()
                    .body(|_| Ok(Value::from("i32"))),
            )
            .method(
                MethodDef::new("Print")
                    .param("v", TypeInfo::object())
                    .returns(TypeInfo::string())
                    .virtual_()
                    .body(|_| Ok(Value::from("object"))),
            )
            .method(
                MethodDef::new("Print")
                    .param("v", TypeInfo::string())
                    .optional_param("times", TypeInfo::i32(), 1)
                    .returns(TypeInfo::string())
                    .virtual_()
                    .body(|_| Ok(Value::from("string"))),
            )
            .method(
                MethodDef::new("Default")
                    .type_parameter(GenericParam::new("T").constrained(GenericConstraint::ValueType))
                    .returns(TypeInfo::object())
                    .virtual_()
                    .body(|frame| Ok(crate::metadata::default_value(frame.type_arg(0)?))),
            )
            .build()
    }

    #[test]
    fn test_overload_resolution() {
        let ty = ProxyRegistry::new().get_or_build(&overloaded()).unwrap();
        let obj = ty.instantiate(&mut []).unwrap();

        assert_eq!(obj.call::<String>("Print", &mut [Value::I32(1)]).unwrap(), "i32");
        assert_eq!(obj.call::<String>("Print", &mut [Value::F64(1.0)]).unwrap(), "object");
        assert_eq!(obj.call::<String>("Print", &mut [Value::from("s")]).unwrap(), "string");
        assert_eq!(
            obj.call::<String>("Print", &mut [Value::from("s"), Value::I32(2)]).unwrap(),
            "string"
        );
        assert!(matches!(
            obj.invoke("Print", &mut []),
            Err(ProxyError::ArgumentError(_))
        ));
        assert!(matches!(
            obj.invoke("Missing", &mut []),
            Err(ProxyError::MemberNotFound(_))
        ));
    }

    #[test]
    fn test_generic_arity_and_constraints() {
        let ty = ProxyRegistry::new().get_or_build(&overloaded()).unwrap();
        let obj = ty.instantiate(&mut []).unwrap();

        assert_eq!(
            obj.invoke_generic("Default", &[TypeInfo::i64()], &mut []).unwrap(),
            Value::I64(0)
        );
        assert!(matches!(
            obj.invoke("Default", &mut []),
            Err(ProxyError::ArgumentError(_))
        ));
        assert!(matches!(
            obj.invoke_generic("Default", &[TypeInfo::string()], &mut []),
            Err(ProxyError::ConstraintViolation(_))
        ));
    }

    #[test]
    fn test_non_public_members_hidden_from_outside() {
        let proto = Prototype::class("Vault")
            .method(
                MethodDef::new("Secret")
                    .returns(TypeInfo::string())
                    .virtual_()
                    .visibility(crate::metadata::Visibility::Protected)
                    .body(|_| Ok(Value::from("protected-data"))),
            )
            .method(
                MethodDef::new("Helper")
                    .returns(TypeInfo::string())
                    .visibility(crate::metadata::Visibility::Private)
                    .body(|_| Ok(Value::from("private-data"))),
            )
            .method(
                MethodDef::new("Inner")
                    .returns(TypeInfo::string())
                    .visibility(crate::metadata::Visibility::Internal)
                    .body(|_| Ok(Value::from("internal-data"))),
            )
            .method(
                MethodDef::new("Open")
                    .returns(TypeInfo::string())
                    .body(|frame| {
                        let secret: String = frame.call("Secret", &mut [])?;
                        let helper: String = frame.call("Helper", &mut [])?;
                        Ok(Value::from(format!("{}+{}", secret, helper)))
                    }),
            )
            .build();
        let obj = ProxyRegistry::new().get_or_build(&proto).unwrap().instantiate(&mut []).unwrap();

        for hidden in ["Secret", "Helper", "Inner"] {
            assert!(matches!(
                obj.invoke(hidden, &mut []),
                Err(ProxyError::MemberNotFound(_))
            ));
        }
        assert_eq!(
            obj.call::<String>("Open", &mut []).unwrap(),
            "protected-data+private-data"
        );
    }

    #[test]
    fn test_names_are_unique() {
        let registry = ProxyRegistry::new();
        let a = registry.get_or_build(&overloaded()).unwrap();
        let b = registry.get_or_build(&overloaded()).unwrap();
        assert_ne!(a.name(), b.name());
        assert!(a.name().starts_with("Printer$Proxy"));
        assert_eq!(a.methods_named("Print").count(), 3);
    }
}
