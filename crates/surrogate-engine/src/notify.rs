//! Change-notification wrappers
//!
//! The sibling family of the interception proxy, built on the same stages
//! but without hooks or handlers. Every overridable property setter is
//! replaced by a body that
//!
//! 1. reads the old value through the base getter (if the property has one)
//! 2. runs the base setter
//! 3. reads the stored value back through the base getter, falling back to
//!    the assigned argument for write-only properties
//! 4. when old and new value differ, calls the prototype's notification
//!    callback through normal dispatch and then every listener registered on
//!    the instance
//!
//! Abstract property accessors are implemented over a generated backing
//! field. Any other abstract member, indexers included, gets a body that
//! fails with an invocation error.

use std::sync::Arc;

use surrogate_sdk::{ArgumentEnvelope, ProxyError, ProxyResult, Value};
use tracing::trace;

use crate::config::SynthesisOptions;
use crate::metadata::{
    backing_field_name, default_value, AccessorKind, MethodBody, PassingMode, Prototype,
    ReturnKind, TypeInfo, Visibility,
};
use crate::object::{Frame, Instance};
use crate::synth::base_access::BaseAccessSlot;
use crate::synth::classify::{Classification, MemberSlot};
use crate::synth::constructors::{emit_constructors, field_layout};
use crate::synth::hooks::HookStorage;
use crate::synth::overrides::{emit_overrides, DispatchTarget};
use crate::synth::proxy_type::TypeParts;

fn method_body<F>(f: F) -> MethodBody
where
    F: Fn(&mut Frame<'_>) -> ProxyResult<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Build the parts of a change-notification wrapper
pub(crate) fn notifier_parts(
    prototype: &Prototype,
    classification: Classification,
    options: &SynthesisOptions,
) -> ProxyResult<TypeParts> {
    let Classification {
        constructors,
        members,
    } = classification;

    let callback = resolve_callback(prototype, &members, options)?;

    let mut fields = field_layout(prototype);
    let mut base_slots = Vec::with_capacity(members.len());
    for member in &members {
        let slot = if member.is_abstract() {
            let body = implement_abstract(member, &mut fields);
            BaseAccessSlot::with_body(member, Some(body))
        } else {
            BaseAccessSlot::emit(member)
        };
        base_slots.push(Arc::new(slot));
    }

    let targets = members
        .iter()
        .zip(&base_slots)
        .map(|(member, setter)| match &member.method.accessor {
            Some(AccessorKind::Setter(property)) if member.overridable => {
                let getter = members
                    .iter()
                    .position(|m| m.method.accessor == Some(AccessorKind::Getter(property.clone())))
                    .map(|index| base_slots[index].clone());
                trace!(property = %property, "notifying setter");
                Some(DispatchTarget::Body(notifying_setter(
                    property.clone(),
                    getter,
                    setter.clone(),
                    callback.clone(),
                )))
            }
            _ => None,
        })
        .collect();

    let constructors = emit_constructors(prototype, &constructors);
    let overrides = emit_overrides(&members, &base_slots, targets);

    Ok(TypeParts {
        members,
        base_slots,
        hooks: HookStorage::default(),
        constructors,
        overrides,
        fields,
    })
}

/// Find the notification callback. Classes must declare it as an instance
/// `(string) -> void` member; interfaces use it only if present.
fn resolve_callback(
    prototype: &Prototype,
    members: &[MemberSlot],
    options: &SynthesisOptions,
) -> ProxyResult<Option<String>> {
    let name = prototype
        .notify_callback
        .clone()
        .unwrap_or_else(|| options.notify_callback.clone());

    let candidates: Vec<&MemberSlot> = members.iter().filter(|m| m.method.name == name).collect();
    if candidates.iter().any(|m| is_callback_shape(m)) {
        return Ok(Some(name));
    }
    if prototype.is_interface() {
        return Ok(None);
    }

    Err(match candidates.first() {
        Some(found) => ProxyError::MissingContract(format!(
            "{}.{} must be an accessible {}(string) -> void, found {} -> {}",
            prototype.display_name(),
            name,
            name,
            found.signature(),
            found.method.returns
        )),
        None => ProxyError::MissingContract(format!(
            "{} does not declare {}(string) -> void",
            prototype.display_name(),
            name
        )),
    })
}

fn is_callback_shape(member: &MemberSlot) -> bool {
    let method = &member.method;
    matches!(method.params.as_slice(), [p] if p.ty == TypeInfo::string() && p.mode == PassingMode::Value)
        && method.returns == ReturnKind::Void
        && !method.is_generic()
        && method.visibility != Visibility::Private
}

fn implement_abstract(member: &MemberSlot, fields: &mut Vec<(String, Value)>) -> MethodBody {
    let method = &member.method;
    match (&method.accessor, &method.returns, method.params.as_slice()) {
        (Some(AccessorKind::Getter(property)), ReturnKind::Value(ty), _) => {
            let field = ensure_backing_field(fields, property, ty);
            method_body(move |frame| Ok(frame.field(&field)?.get()))
        }
        (Some(AccessorKind::Setter(property)), _, [value]) => {
            let field = ensure_backing_field(fields, property, &value.ty);
            method_body(move |frame| {
                let value = frame.args.get(0)?;
                frame.field(&field)?.set(value);
                Ok(Value::Null)
            })
        }
        _ => {
            let what = format!("{}.{}", member.declaring_type, member.signature());
            method_body(move |_| Err(ProxyError::Invocation(format!("{} is not implemented", what))))
        }
    }
}

fn ensure_backing_field(fields: &mut Vec<(String, Value)>, property: &str, ty: &TypeInfo) -> String {
    let name = backing_field_name(property);
    if !fields.iter().any(|(n, _)| *n == name) {
        fields.push((name.clone(), default_value(ty)));
    }
    name
}

fn notifying_setter(
    property: String,
    getter: Option<Arc<BaseAccessSlot>>,
    setter: Arc<BaseAccessSlot>,
    callback: Option<String>,
) -> MethodBody {
    method_body(move |frame| {
        let this = frame.this().clone();
        let old = match &getter {
            Some(getter) => Some(getter.call(&this, &mut ArgumentEnvelope::default(), &[])?),
            None => None,
        };

        setter.call(&this, &mut *frame.args, &[])?;

        let new = match &getter {
            Some(getter) => getter.call(&this, &mut ArgumentEnvelope::default(), &[])?,
            None => frame.args.get(0)?,
        };
        if old.as_ref() != Some(&new) {
            raise_property_changed(&this, &property, callback.as_deref())?;
        }
        Ok(Value::Null)
    })
}

fn raise_property_changed(this: &Arc<Instance>, property: &str, callback: Option<&str>) -> ProxyResult<()> {
    trace!(property, "property changed");
    if let Some(callback) = callback {
        this.invoke_inside(callback, &[], &mut [Value::from(property)])?;
    }
    this.notify_listeners(property);
    Ok(())
}
