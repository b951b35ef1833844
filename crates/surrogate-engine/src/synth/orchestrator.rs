//! Type synthesis orchestration
//!
//! A build is a linear pipeline with no retries:
//!
//! ```text
//! Validate → Name → ClassifyMembers → EmitBaseAccess → ExtractHooks
//!          → ComposeInvokers → EmitConstructors → EmitOverrides → Finalize
//! ```
//!
//! Any stage failing aborts the build. The parts built so far are dropped
//! and no `ProxyType` is ever handed out for a failed build.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use surrogate_sdk::ProxyResult;
use tracing::{debug, debug_span, trace};

use super::base_access::emit_base_access;
use super::classify::{self, Classification, MemberSlot};
use super::compose::{compose, GenericInvokers, MethodDescriptor};
use super::constructors::{emit_constructors, field_layout};
use super::hooks::{extract_hooks, ExtractedHooks};
use super::overrides::{emit_overrides, DispatchTarget, InvokerField};
use super::proxy_type::{ProxyFamily, ProxyType, TypeParts};
use crate::config::SynthesisOptions;
use crate::metadata::{HandlerBinding, Prototype};
use crate::notify;

/// Type ordinals are process-wide so names stay unique across registries
static NEXT_TYPE_ORDINAL: AtomicU64 = AtomicU64::new(1);

/// Run the whole pipeline for one prototype
pub(crate) fn synthesize(
    prototype: &Prototype,
    family: ProxyFamily,
    options: &SynthesisOptions,
) -> ProxyResult<ProxyType> {
    let span = debug_span!("synthesize", prototype = %prototype.display_name(), ?family);
    let _enter = span.enter();

    classify::validate(prototype)?;

    let name = unique_name(prototype, family, options);

    let classification = classify::classify(prototype)?;
    debug!(
        ty = %name,
        members = classification.members.len(),
        overridable = classification.overridable().count(),
        constructors = classification.constructors.len(),
        "classified members"
    );

    let parts = match family {
        ProxyFamily::Interception => interception_parts(prototype, classification)?,
        ProxyFamily::ChangeNotification => {
            notify::notifier_parts(prototype, classification, options)?
        }
    };

    debug!(
        ty = %name,
        hooks = parts.hooks.len(),
        overrides = parts.overrides.iter().filter(|o| o.is_overridden()).count(),
        "synthesized type"
    );
    Ok(ProxyType::assemble(
        name,
        family,
        prototype.clone(),
        parts,
        options.enforce_generic_constraints,
    ))
}

fn unique_name(prototype: &Prototype, family: ProxyFamily, options: &SynthesisOptions) -> String {
    let ordinal = NEXT_TYPE_ORDINAL.fetch_add(1, Ordering::Relaxed);
    let suffix = match family {
        ProxyFamily::Interception => &options.type_name_suffix,
        ProxyFamily::ChangeNotification => &options.notifier_suffix,
    };
    format!("{}${}{}", prototype.name, suffix, ordinal)
}

fn interception_parts(prototype: &Prototype, classification: Classification) -> ProxyResult<TypeParts> {
    let Classification {
        constructors,
        members,
    } = classification;

    let base_slots = emit_base_access(&members);

    let hooks = extract_hooks(prototype, &members)?;
    trace!(fields = hooks.storage.len(), "extracted hooks");

    let targets = compose_invokers(prototype, &members, &hooks);

    let constructors = emit_constructors(prototype, &constructors);

    let overrides = emit_overrides(&members, &base_slots, targets);

    Ok(TypeParts {
        members,
        base_slots,
        hooks: hooks.storage,
        constructors,
        overrides,
        fields: field_layout(prototype),
    })
}

/// One dispatch target per member; `None` for inherited members and for
/// overrides with neither handler nor hooks (direct base-access shortcut)
fn compose_invokers(
    prototype: &Prototype,
    members: &[MemberSlot],
    hooks: &ExtractedHooks,
) -> Vec<Option<DispatchTarget>> {
    members
        .iter()
        .zip(&hooks.per_method)
        .map(|(member, method_hooks)| {
            if !member.overridable {
                return None;
            }

            let handler = match &member.method.handler {
                HandlerBinding::Inherit => prototype.handler.clone(),
                HandlerBinding::Custom(handler) => Some(handler.clone()),
                HandlerBinding::Passthrough => None,
            };
            if handler.is_none() && hooks.type_scoped.is_empty() && method_hooks.is_empty() {
                trace!(member = %member.signature(), "direct base-access override");
                return None;
            }

            let field = if member.method.is_generic() {
                InvokerField::Generic(GenericInvokers::new(
                    member.clone(),
                    hooks.type_scoped.clone(),
                    method_hooks.clone(),
                    handler,
                ))
            } else {
                InvokerField::Composed(Arc::new(compose(
                    MethodDescriptor::for_member(member, &[]),
                    &hooks.type_scoped,
                    method_hooks,
                    handler,
                )))
            };
            Some(DispatchTarget::Invoker(field))
        })
        .collect()
}
