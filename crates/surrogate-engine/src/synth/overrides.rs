//! Override emission and the per-call forwarding body
//!
//! Every override runs the same body:
//!
//! 1. check the closed generic arguments against the re-declared constraints
//! 2. pack the arguments into an envelope (defaults filled in, value
//!    arguments type-checked, by-ref positions boxed into `RefSlot`s)
//! 3. dispatch to the composed invoker, the base-access shortcut or a
//!    generated body
//! 4. copy by-ref boxes back into the caller's slice
//! 5. check the result against the declared return kind

use std::fmt;
use std::sync::Arc;

use surrogate_sdk::{ArgumentEnvelope, ProxyError, ProxyResult, Value};

use super::base_access::BaseAccessSlot;
use super::classify::MemberSlot;
use super::compose::{ComposedInvoker, GenericInvokers};
use crate::metadata::{
    default_value, GenericParam, MethodBody, MethodDef, MethodSignature, ParamDef, PassingMode,
    ReturnKind, TypeInfo,
};
use crate::object::{Frame, Instance};

/// Where a composed invoker lives
pub(crate) enum InvokerField {
    /// Non-generic member: one invoker, built with the type
    Composed(Arc<ComposedInvoker>),
    /// Generic member: one invoker per closed instantiation
    Generic(GenericInvokers),
}

/// What an override body forwards to
pub(crate) enum DispatchTarget {
    /// The base-access slot directly (inherited members, unintercepted overrides)
    Base,
    /// The composed invocation chain
    Invoker(InvokerField),
    /// A body generated for the synthesized type
    Body(MethodBody),
}

/// One entry of a synthesized type's dispatch table
pub struct OverrideMethod {
    method: MethodDef,
    overridden: bool,
    base: Arc<BaseAccessSlot>,
    target: DispatchTarget,
}

impl OverrideMethod {
    pub(crate) fn new(
        member: &MemberSlot,
        base: Arc<BaseAccessSlot>,
        target: DispatchTarget,
    ) -> Self {
        // Re-declare the signature: generic parameters keep their
        // constraints and parameters keep their defaults.
        let mut method = member.method.clone();
        method.body = None;
        method.hooks.clear();
        method.modifiers.is_abstract = false;
        Self {
            method,
            overridden: member.overridable,
            base,
            target,
        }
    }

    /// Member name
    pub fn name(&self) -> &str {
        &self.method.name
    }

    /// Re-declared member
    pub fn method(&self) -> &MethodDef {
        &self.method
    }

    /// Overload identity
    pub fn signature(&self) -> MethodSignature {
        self.method.signature()
    }

    /// Parameters, with defaults
    pub fn params(&self) -> &[ParamDef] {
        &self.method.params
    }

    /// Generic parameters, with constraints
    pub fn generic_params(&self) -> &[GenericParam] {
        &self.method.generic_params
    }

    /// The synthesized type replaces the member's dispatch entry
    pub fn is_overridden(&self) -> bool {
        self.overridden
    }

    /// Calls go through a composed invocation chain
    pub fn is_intercepted(&self) -> bool {
        matches!(self.target, DispatchTarget::Invoker(_))
    }

    /// The composed invoker of a non-generic intercepted member
    pub fn composed_invoker(&self) -> Option<&Arc<ComposedInvoker>> {
        match &self.target {
            DispatchTarget::Invoker(InvokerField::Composed(invoker)) => Some(invoker),
            _ => None,
        }
    }

    /// Closed instantiations composed so far for a generic member
    pub fn closed_instantiations(&self) -> usize {
        match &self.target {
            DispatchTarget::Invoker(InvokerField::Generic(invokers)) => invokers.instantiations(),
            _ => 0,
        }
    }

    /// The forwarding body
    pub(crate) fn call(
        &self,
        this: &Arc<Instance>,
        type_args: &[TypeInfo],
        args: &mut [Value],
        enforce_constraints: bool,
    ) -> ProxyResult<Value> {
        let generics = &self.method.generic_params;
        if enforce_constraints {
            self.check_constraints(type_args)?;
        }

        let mut envelope = pack_arguments(&self.method.params, generics, type_args, args)?;
        let result = match &self.target {
            DispatchTarget::Base => self.base.call(this, &mut envelope, type_args),
            DispatchTarget::Invoker(InvokerField::Composed(invoker)) => {
                invoker.invoke(this, &mut envelope, &self.base)
            }
            DispatchTarget::Invoker(InvokerField::Generic(invokers)) => {
                invokers.resolve(type_args).invoke(this, &mut envelope, &self.base)
            }
            DispatchTarget::Body(body) => body(&mut Frame::new(this, &mut envelope, type_args)),
        }?;

        write_back(&self.method.params, &envelope, args);
        check_return(&self.method.returns.substitute(generics, type_args), result)
    }

    fn check_constraints(&self, type_args: &[TypeInfo]) -> ProxyResult<()> {
        for (param, arg) in self.method.generic_params.iter().zip(type_args) {
            if let Some(constraint) = param.violation(arg) {
                return Err(ProxyError::ConstraintViolation(format!(
                    "{} does not satisfy constraint '{}' on {} of {}",
                    arg, constraint, param.name, self.method.name
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for OverrideMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = match &self.target {
            DispatchTarget::Base => "base",
            DispatchTarget::Invoker(InvokerField::Composed(_)) => "composed",
            DispatchTarget::Invoker(InvokerField::Generic(_)) => "generic",
            DispatchTarget::Body(_) => "body",
        };
        f.debug_struct("OverrideMethod")
            .field("signature", &self.signature().to_string())
            .field("overridden", &self.overridden)
            .field("target", &target)
            .finish()
    }
}

/// Emit the dispatch table. `targets` is aligned with `members`; `None`
/// means the member forwards straight to its base-access slot.
pub(crate) fn emit_overrides(
    members: &[MemberSlot],
    base_slots: &[Arc<BaseAccessSlot>],
    targets: Vec<Option<DispatchTarget>>,
) -> Vec<OverrideMethod> {
    members
        .iter()
        .zip(base_slots)
        .zip(targets)
        .map(|((member, base), target)| {
            OverrideMethod::new(member, base.clone(), target.unwrap_or(DispatchTarget::Base))
        })
        .collect()
}

/// Box `args` into an envelope for `params`
pub(crate) fn pack_arguments(
    params: &[ParamDef],
    generics: &[GenericParam],
    type_args: &[TypeInfo],
    args: &[Value],
) -> ProxyResult<ArgumentEnvelope> {
    if args.len() > params.len() {
        return Err(ProxyError::ArgumentError(format!(
            "expected at most {} argument(s), got {}",
            params.len(),
            args.len()
        )));
    }

    let mut packed = Vec::with_capacity(params.len());
    for (index, param) in params.iter().enumerate() {
        let ty = param.ty.substitute(generics, type_args);
        let supplied = match (args.get(index), &param.default) {
            (Some(value), _) => value.clone(),
            (None, Some(default)) => default.clone(),
            (None, None) => {
                return Err(ProxyError::ArgumentError(format!(
                    "missing argument for parameter '{}'",
                    param.name
                )))
            }
        };

        let boxed = match (param.mode, supplied) {
            (PassingMode::Ref | PassingMode::Out, Value::Ref(slot)) => Value::Ref(slot),
            (PassingMode::Out, _) => Value::by_ref(default_value(&ty)),
            (PassingMode::Ref, value) => Value::by_ref(checked(&ty, value)?),
            (PassingMode::Value, value) => checked(&ty, value.deref_value())?,
        };
        packed.push(boxed);
    }
    Ok(ArgumentEnvelope::new(packed))
}

fn checked(ty: &TypeInfo, value: Value) -> ProxyResult<Value> {
    if ty.accepts(&value) {
        Ok(value)
    } else {
        Err(ProxyError::mismatch(ty.to_string(), value.type_name()))
    }
}

/// Copy by-ref boxes back into caller positions that were passed by value
pub(crate) fn write_back(params: &[ParamDef], envelope: &ArgumentEnvelope, args: &mut [Value]) {
    for (index, param) in params.iter().enumerate() {
        if !param.mode.is_by_ref() {
            continue;
        }
        if let (Some(arg), Some(slot)) = (args.get_mut(index), envelope.ref_slot(index)) {
            // Caller-supplied slots were written in place
            if !matches!(arg, Value::Ref(_)) {
                *arg = slot.get();
            }
        }
    }
}

/// Unbox / cast the chain's result to the declared return kind
pub(crate) fn check_return(returns: &ReturnKind, result: Value) -> ProxyResult<Value> {
    match returns {
        ReturnKind::Void => Ok(Value::Null),
        ReturnKind::Value(ty) => checked(ty, result),
        ReturnKind::Ref(ty) => match result {
            Value::Ref(slot) => {
                let content = slot.get();
                if ty.accepts(&content) {
                    Ok(Value::Ref(slot))
                } else {
                    Err(ProxyError::mismatch(format!("ref {}", ty), content.type_name()))
                }
            }
            other => Err(ProxyError::mismatch(format!("ref {}", ty), other.type_name())),
        },
    }
}
