//! Hook attributes and their per-type storage
//!
//! A [`HookAttribute`] is the declaration attached to a prototype or one of
//! its members. At synthesis time every distinct declaration is materialized
//! into a [`Hook`] exactly once and parked in a `__hook{n}` storage field of
//! the synthesized type; all instances and all calls share that one hook.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use surrogate_sdk::{ProxyResult, Value};
use tracing::{debug, trace};

use super::classify::MemberSlot;
use super::compose::{Invocation, Next};
use crate::metadata::Prototype;

/// An interception unit in a member's invocation chain.
///
/// A hook may inspect or rewrite the arguments, short-circuit by returning
/// without calling `next`, or proceed down the chain (possibly more than
/// once). Hooks are shared by every instance of a synthesized type and are
/// called concurrently; any mutable state is the hook's to protect.
pub trait Hook: Send + Sync {
    /// Intercept one call
    fn intercept(&self, call: &mut Invocation<'_>, next: Next<'_>) -> ProxyResult<Value>;
}

impl<F> Hook for F
where
    F: Fn(&mut Invocation<'_>, Next<'_>) -> ProxyResult<Value> + Send + Sync,
{
    fn intercept(&self, call: &mut Invocation<'_>, next: Next<'_>) -> ProxyResult<Value> {
        self(call, next)
    }
}

/// Box a closure as a shareable hook
pub fn hook_fn<F>(f: F) -> Arc<dyn Hook>
where
    F: Fn(&mut Invocation<'_>, Next<'_>) -> ProxyResult<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A hook declaration attached to a prototype or member
pub trait HookAttribute: Send + Sync {
    /// Declaration name, used in diagnostics
    fn name(&self) -> &str;

    /// Create the hook instance stored on the synthesized type
    fn materialize(&self) -> ProxyResult<Arc<dyn Hook>>;
}

type MakeHook = Box<dyn Fn() -> ProxyResult<Arc<dyn Hook>> + Send + Sync>;

/// Hook declaration backed by a factory closure
pub struct HookFactory {
    name: String,
    make: MakeHook,
}

impl HookFactory {
    /// Each synthesized type gets a fresh hook from `make`
    pub fn new<H: Hook + 'static>(name: &str, make: impl Fn() -> H + Send + Sync + 'static) -> Self {
        Self {
            name: name.to_string(),
            make: Box::new(move || Ok(Arc::new(make()) as Arc<dyn Hook>)),
        }
    }

    /// Like `new`, but construction may fail and abort the build
    pub fn fallible(
        name: &str,
        make: impl Fn() -> ProxyResult<Arc<dyn Hook>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            make: Box::new(make),
        }
    }

    /// Stateless hook from a closure; every type shares the same closure
    pub fn from_fn<F>(name: &str, f: F) -> Self
    where
        F: Fn(&mut Invocation<'_>, Next<'_>) -> ProxyResult<Value> + Send + Sync + 'static,
    {
        let hook = hook_fn(f);
        Self {
            name: name.to_string(),
            make: Box::new(move || Ok(hook.clone())),
        }
    }
}

impl HookAttribute for HookFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn materialize(&self) -> ProxyResult<Arc<dyn Hook>> {
        (self.make)()
    }
}

impl fmt::Debug for HookFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookFactory").field("name", &self.name).finish()
    }
}

/// Where a hook declaration was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookScope {
    /// On the prototype type; applies to every overridable member
    Type,
    /// On one member, identified by its signature
    Method(String),
}

/// A materialized hook in its storage field
#[derive(Clone)]
pub struct HookDescriptor {
    /// Storage field name (`__hook{n}`)
    pub field: String,
    /// Name of the declaration it was materialized from
    pub attribute: String,
    /// Scope of the first declaration site
    pub scope: HookScope,
    /// The shared hook instance
    pub hook: Arc<dyn Hook>,
}

impl fmt::Debug for HookDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookDescriptor")
            .field("field", &self.field)
            .field("attribute", &self.attribute)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Hook storage fields of a synthesized type
#[derive(Debug, Clone, Default)]
pub struct HookStorage {
    fields: Vec<HookDescriptor>,
}

impl HookStorage {
    /// Number of storage fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// No hooks were declared anywhere
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Storage fields in materialization order
    pub fn iter(&self) -> impl Iterator<Item = &HookDescriptor> {
        self.fields.iter()
    }

    /// Look up a storage field by name
    pub fn get(&self, field: &str) -> Option<&HookDescriptor> {
        self.fields.iter().find(|d| d.field == field)
    }
}

/// Result of hook extraction
pub(crate) struct ExtractedHooks {
    pub storage: HookStorage,
    pub type_scoped: Vec<Arc<dyn Hook>>,
    /// Aligned with the classified members; empty for non-overridable ones
    pub per_method: Vec<Vec<Arc<dyn Hook>>>,
}

/// Materializes each distinct declaration once, keyed by pointer identity
struct Materializer {
    storage: HookStorage,
    seen: FxHashMap<usize, usize>,
}

impl Materializer {
    fn take(&mut self, attr: &Arc<dyn HookAttribute>, scope: HookScope) -> ProxyResult<Arc<dyn Hook>> {
        let key = Arc::as_ptr(attr) as *const () as usize;
        if let Some(&index) = self.seen.get(&key) {
            return Ok(self.storage.fields[index].hook.clone());
        }

        let hook = attr.materialize()?;
        let index = self.storage.fields.len();
        let field = format!("__hook{}", index);
        trace!(field = %field, attribute = attr.name(), ?scope, "materialized hook");
        self.storage.fields.push(HookDescriptor {
            field,
            attribute: attr.name().to_string(),
            scope,
            hook: hook.clone(),
        });
        self.seen.insert(key, index);
        Ok(hook)
    }
}

/// Collect type-scoped and per-member hooks, materializing each declaration once.
///
/// Type hooks declared on base classes apply too, outermost base first.
pub(crate) fn extract_hooks(prototype: &Prototype, members: &[MemberSlot]) -> ProxyResult<ExtractedHooks> {
    let mut materializer = Materializer {
        storage: HookStorage::default(),
        seen: FxHashMap::default(),
    };

    let mut chain: Vec<&Prototype> = prototype.ancestors().collect();
    chain.reverse();
    chain.push(prototype);

    let mut type_scoped: Vec<Arc<dyn Hook>> = Vec::new();
    for attr in chain.iter().flat_map(|p| p.hooks.iter()) {
        let hook = materializer.take(attr, HookScope::Type)?;
        if !type_scoped.iter().any(|h| Arc::ptr_eq(h, &hook)) {
            type_scoped.push(hook);
        }
    }

    let mut per_method = Vec::with_capacity(members.len());
    for member in members {
        if !member.overridable {
            if !member.method.hooks.is_empty() {
                debug!(member = %member.signature(), "ignoring hooks on non-overridable member");
            }
            per_method.push(Vec::new());
            continue;
        }
        let scope = HookScope::Method(member.signature().to_string());
        let hooks = member
            .method
            .hooks
            .iter()
            .map(|attr| materializer.take(attr, scope.clone()))
            .collect::<ProxyResult<Vec<_>>>()?;
        per_method.push(hooks);
    }

    Ok(ExtractedHooks {
        storage: materializer.storage,
        type_scoped,
        per_method,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{MethodDef, TypeInfo};
    use crate::synth::classify::classify;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn passthrough(call: &mut Invocation<'_>, next: Next<'_>) -> ProxyResult<Value> {
        next.proceed(call)
    }

    #[test]
    fn test_no_hooks_is_empty() {
        let proto = Prototype::interface("IPlain")
            .method(MethodDef::new("Run"))
            .build();
        let members = classify(&proto).unwrap().members;
        let hooks = extract_hooks(&proto, &members).unwrap();

        assert!(hooks.storage.is_empty());
        assert!(hooks.type_scoped.is_empty());
        assert!(hooks.per_method.iter().all(Vec::is_empty));
    }

    #[test]
    fn test_shared_declaration_materialized_once() {
        let made = Arc::new(AtomicUsize::new(0));
        let counter = made.clone();
        let shared: Arc<dyn HookAttribute> = Arc::new(HookFactory::new("Audit", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            passthrough
        }));

        let proto = Prototype::interface("IAudited")
            .shared_hook(shared.clone())
            .method(MethodDef::new("A").shared_hook(shared.clone()))
            .method(MethodDef::new("B").hook(HookFactory::from_fn("Trace", passthrough)))
            .method(MethodDef::new("C").returns(TypeInfo::i32()))
            .build();
        let members = classify(&proto).unwrap().members;
        let hooks = extract_hooks(&proto, &members).unwrap();

        assert_eq!(made.load(Ordering::SeqCst), 1);
        assert_eq!(hooks.storage.len(), 2);
        assert_eq!(hooks.storage.get("__hook0").unwrap().scope, HookScope::Type);
        assert_eq!(
            hooks.storage.get("__hook1").unwrap().scope,
            HookScope::Method("B()".to_string())
        );
        assert!(Arc::ptr_eq(&hooks.type_scoped[0], &hooks.per_method[0][0]));
        assert_eq!(hooks.per_method[1].len(), 1);
        assert!(hooks.per_method[2].is_empty());
    }

    #[test]
    fn test_materialize_failure_propagates() {
        let proto = Prototype::interface("IBroken")
            .hook(HookFactory::fallible("NeedsConfig", || {
                Err(surrogate_sdk::ProxyError::Invocation("no endpoint".into()))
            }))
            .method(MethodDef::new("Run"))
            .build();
        let members = classify(&proto).unwrap().members;
        assert!(extract_hooks(&proto, &members).is_err());
    }
}
