//! Builder registry
//!
//! Process-wide cache of synthesized types keyed by prototype identity and
//! family. Each key owns a once-cell: the first requester runs synthesis
//! while concurrent requesters for the same key block on the cell, and
//! unrelated keys build in parallel. A failed build leaves the cell empty so
//! a later request can try again. Successful builds are kept for the life of
//! the registry.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::{Lazy, OnceCell};
use surrogate_sdk::ProxyResult;
use tracing::{debug, trace, warn};

use crate::config::SynthesisOptions;
use crate::metadata::{Prototype, PrototypeId};
use crate::synth::orchestrator::synthesize;
use crate::synth::{ProxyFamily, ProxyType};

static GLOBAL: Lazy<ProxyRegistry> = Lazy::new(ProxyRegistry::new);

type TypeCell = Arc<OnceCell<Arc<ProxyType>>>;

/// Cache of synthesized types
pub struct ProxyRegistry {
    options: SynthesisOptions,
    types: DashMap<(PrototypeId, ProxyFamily), TypeCell>,
    builds: AtomicUsize,
}

impl ProxyRegistry {
    /// Registry with default options
    pub fn new() -> Self {
        Self::with_options(SynthesisOptions::default())
    }

    /// Registry with the given options
    pub fn with_options(options: SynthesisOptions) -> Self {
        Self {
            options,
            types: DashMap::new(),
            builds: AtomicUsize::new(0),
        }
    }

    /// The process-wide registry (default options)
    pub fn global() -> &'static ProxyRegistry {
        &GLOBAL
    }

    /// Options every build uses
    pub fn options(&self) -> &SynthesisOptions {
        &self.options
    }

    /// The interception proxy type for `prototype`, built on first request
    pub fn get_or_build(&self, prototype: &Prototype) -> ProxyResult<Arc<ProxyType>> {
        self.get_or_build_family(prototype, ProxyFamily::Interception)
    }

    /// The change-notification wrapper type for `prototype`, built on first request
    pub fn get_or_build_notifier(&self, prototype: &Prototype) -> ProxyResult<Arc<ProxyType>> {
        self.get_or_build_family(prototype, ProxyFamily::ChangeNotification)
    }

    /// The synthesized type of the given family, built on first request
    pub fn get_or_build_family(
        &self,
        prototype: &Prototype,
        family: ProxyFamily,
    ) -> ProxyResult<Arc<ProxyType>> {
        if let Some(ty) = self.get(prototype, family) {
            trace!(ty = %ty.name(), "registry hit");
            return Ok(ty);
        }

        // Clone the cell out so the shard lock is released before building
        let cell = self.types.entry((prototype.id(), family)).or_default().clone();
        let result = cell.get_or_try_init(|| {
            self.builds.fetch_add(1, Ordering::Relaxed);
            debug!(prototype = %prototype.display_name(), ?family, "registry miss, building");
            synthesize(prototype, family, &self.options).map(Arc::new)
        });

        match result {
            Ok(ty) => Ok(ty.clone()),
            Err(e) => {
                warn!(prototype = %prototype.display_name(), ?family, error = %e, "synthesis failed");
                Err(e)
            }
        }
    }

    /// The cached type, if it has been built
    pub fn get(&self, prototype: &Prototype, family: ProxyFamily) -> Option<Arc<ProxyType>> {
        self.types
            .get(&(prototype.id(), family))
            .and_then(|cell| cell.get().cloned())
    }

    /// Whether a type has been built for `prototype`
    pub fn contains(&self, prototype: &Prototype, family: ProxyFamily) -> bool {
        self.get(prototype, family).is_some()
    }

    /// Number of built types
    pub fn len(&self) -> usize {
        self.types.iter().filter(|entry| entry.value().get().is_some()).count()
    }

    /// Nothing has been built yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of synthesis runs, failed ones included
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }
}

impl Default for ProxyRegistry {
    fn default() -> Self {
        Self::new()
    }
}
