//! Prototype validation and member classification
//!
//! Members are gathered most-derived first: the prototype's own methods, then
//! each base class in turn, then every interface reachable from the
//! prototype. The first declaration of a signature wins, so a derived
//! override hides the base declaration it replaces. Hook declarations on the
//! hidden base declarations are still inherited, base first.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use surrogate_sdk::{ProxyError, ProxyResult};

use crate::metadata::{ConstructorDef, MethodDef, MethodSignature, Prototype, PrototypeDef};

/// One dispatchable instance member of the prototype
#[derive(Debug, Clone)]
pub struct MemberSlot {
    /// The declaring member
    pub method: MethodDef,
    /// Name of the type that declared it
    pub declaring_type: String,
    /// A derived type may replace it
    pub overridable: bool,
}

impl MemberSlot {
    /// Overload identity
    pub fn signature(&self) -> MethodSignature {
        self.method.signature()
    }

    /// No original implementation exists
    pub fn is_abstract(&self) -> bool {
        self.method.modifiers.is_abstract
    }

    /// Property / indexer / event accessor
    pub fn is_special_name(&self) -> bool {
        self.method.is_special_name()
    }
}

/// Constructors and members of a validated prototype
#[derive(Debug, Clone)]
pub struct Classification {
    /// Constructors a derived type can chain to
    pub constructors: Vec<ConstructorDef>,
    /// Every instance member, overridable or not
    pub members: Vec<MemberSlot>,
}

impl Classification {
    /// Members the synthesized type overrides
    pub fn overridable(&self) -> impl Iterator<Item = &MemberSlot> {
        self.members.iter().filter(|m| m.overridable)
    }
}

/// Reject prototypes a derived type cannot be synthesized from
pub fn validate(prototype: &Prototype) -> ProxyResult<()> {
    let name = prototype.display_name();
    if !prototype.visibility.is_externally_visible() {
        return Err(ProxyError::PrototypeShape(format!(
            "{} is not publicly visible",
            name
        )));
    }
    if !prototype.is_interface() && prototype.is_sealed {
        return Err(ProxyError::PrototypeShape(format!("{} is sealed", name)));
    }
    if prototype.is_open_generic() {
        return Err(ProxyError::PrototypeShape(format!(
            "{} is an open generic definition",
            name
        )));
    }
    Ok(())
}

/// Whether a derived type outside the prototype's module may override `method`
pub fn is_overridable(method: &MethodDef) -> bool {
    let m = method.modifiers;
    !m.is_static && !m.is_final && (m.is_virtual || m.is_abstract) && method.visibility.is_inheritable()
}

/// Enumerate constructors and members of a validated prototype
pub fn classify(prototype: &Prototype) -> ProxyResult<Classification> {
    validate(prototype)?;

    let mut seen = FxHashMap::default();
    let mut members = Vec::new();

    let classes = std::iter::once(&**prototype).chain(prototype.ancestors().map(|p| &**p));
    for def in classes {
        collect(def, &mut seen, &mut members, true);
    }
    for iface in interfaces_of(prototype) {
        collect(&iface, &mut seen, &mut members, false);
    }

    if let Some(hidden) = members.iter().find(|m| m.is_abstract() && !m.overridable) {
        return Err(ProxyError::PrototypeShape(format!(
            "abstract member {}.{} cannot be overridden outside its module",
            hidden.declaring_type,
            hidden.signature()
        )));
    }

    Ok(Classification {
        constructors: inheritable_constructors(prototype)?,
        members,
    })
}

fn collect(
    def: &PrototypeDef,
    seen: &mut FxHashMap<MethodSignature, usize>,
    members: &mut Vec<MemberSlot>,
    inherit_hooks: bool,
) {
    for method in def.methods.iter().filter(|m| !m.modifiers.is_static) {
        let signature = method.signature();
        match seen.get(&signature) {
            Some(&index) if inherit_hooks => {
                let hooks = &mut members[index].method.hooks;
                let mut inherited: Vec<_> = method
                    .hooks
                    .iter()
                    .filter(|h| !hooks.iter().any(|own| Arc::ptr_eq(own, *h)))
                    .cloned()
                    .collect();
                inherited.append(hooks);
                *hooks = inherited;
            }
            Some(_) => {}
            None => {
                seen.insert(signature, members.len());
                members.push(MemberSlot {
                    method: method.clone(),
                    declaring_type: def.display_name(),
                    overridable: is_overridable(method),
                });
            }
        }
    }
}

/// Every interface reachable from the prototype, breadth first, without duplicates
fn interfaces_of(prototype: &Prototype) -> Vec<Prototype> {
    let mut queue: Vec<Prototype> = Vec::new();
    if prototype.is_interface() {
        queue.extend(prototype.interfaces.iter().cloned());
    } else {
        let classes = std::iter::once(prototype).chain(prototype.ancestors());
        for class in classes {
            queue.extend(class.interfaces.iter().cloned());
        }
    }

    let mut found: Vec<Prototype> = Vec::new();
    let mut next = 0;
    while next < queue.len() {
        let iface = queue[next].clone();
        next += 1;
        if found.contains(&iface) {
            continue;
        }
        queue.extend(iface.interfaces.iter().cloned());
        found.push(iface);
    }
    found
}

/// Constructors of the effective parent a derived type can chain to
fn inheritable_constructors(prototype: &Prototype) -> ProxyResult<Vec<ConstructorDef>> {
    // Interfaces and classes without declared constructors get object's
    if prototype.is_interface() || prototype.constructors.is_empty() {
        return Ok(vec![ConstructorDef::new()]);
    }

    let ctors: Vec<ConstructorDef> = prototype
        .constructors
        .iter()
        .filter(|c| c.visibility.is_inheritable())
        .cloned()
        .collect();
    if ctors.is_empty() {
        return Err(ProxyError::PrototypeShape(format!(
            "{} has no constructor accessible to derived types",
            prototype.display_name()
        )));
    }
    Ok(ctors)
}
