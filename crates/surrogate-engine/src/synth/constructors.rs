//! Constructor forwarding and instance field layout

use std::fmt;
use std::sync::Arc;

use surrogate_sdk::{ProxyResult, Value};

use super::overrides::{pack_arguments, write_back};
use crate::metadata::{ConstructorDef, ParamDef, Prototype};
use crate::object::{Frame, Instance};

/// A constructor of the synthesized type that forwards to a base constructor
#[derive(Clone)]
pub struct ForwardingConstructor {
    base: ConstructorDef,
    /// Parameterless constructors of the base classes, farthest first
    chain: Vec<ConstructorDef>,
}

impl ForwardingConstructor {
    /// Parameters, identical to the base constructor's
    pub fn params(&self) -> &[ParamDef] {
        &self.base.params
    }

    /// Run the base constructors against a freshly allocated instance
    pub(crate) fn construct(&self, this: &Arc<Instance>, args: &mut [Value]) -> ProxyResult<()> {
        for ancestor in &self.chain {
            if let Some(body) = &ancestor.body {
                let mut envelope = pack_arguments(&ancestor.params, &[], &[], &[])?;
                body(&mut Frame::new(this, &mut envelope, &[]))?;
            }
        }

        let mut envelope = pack_arguments(&self.base.params, &[], &[], args)?;
        if let Some(body) = &self.base.body {
            body(&mut Frame::new(this, &mut envelope, &[]))?;
        }
        write_back(&self.base.params, &envelope, args);
        Ok(())
    }
}

impl fmt::Debug for ForwardingConstructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForwardingConstructor")
            .field("params", &self.base.params)
            .field("chained", &self.chain.len())
            .finish()
    }
}

/// One forwarding constructor per inheritable base constructor
pub(crate) fn emit_constructors(
    prototype: &Prototype,
    constructors: &[ConstructorDef],
) -> Vec<ForwardingConstructor> {
    // Interfaces forward to object, which has nothing to chain
    let chain: Vec<ConstructorDef> = if prototype.is_interface() {
        Vec::new()
    } else {
        let mut ancestors: Vec<&Prototype> = prototype.ancestors().collect();
        ancestors.reverse();
        ancestors
            .into_iter()
            .filter_map(|a| a.constructors.iter().find(|c| c.required_params() == 0).cloned())
            .collect()
    };

    constructors
        .iter()
        .map(|ctor| ForwardingConstructor {
            base: ctor.clone(),
            chain: chain.clone(),
        })
        .collect()
}

/// Instance fields with initial values: base classes first, derived
/// declarations shadowing inherited ones
pub(crate) fn field_layout(prototype: &Prototype) -> Vec<(String, Value)> {
    let mut classes: Vec<&Prototype> = std::iter::once(prototype).chain(prototype.ancestors()).collect();
    classes.reverse();

    let mut layout: Vec<(String, Value)> = Vec::new();
    for class in classes {
        for (name, initial) in &class.fields {
            match layout.iter_mut().find(|(n, _)| n == name) {
                Some(existing) => existing.1 = initial.clone(),
                None => layout.push((name.clone(), initial.clone())),
            }
        }
    }
    layout
}
