//! Applications: the root of the ownership tree.

use super::module::Module;
use super::registry_key;
use crate::authorizer::Authorizer;
use crate::error::RegistryError;
use crate::scheduler::TaskScheduler;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// A versioned application owning a set of modules.
pub struct Application {
    app_id: String,
    version: String,
    enabled: AtomicBool,
    doc: String,
    authorizer: RwLock<Option<Arc<dyn Authorizer>>>,
    scheduler: RwLock<Option<Arc<dyn TaskScheduler>>>,
    modules: DashMap<String, Arc<Module>>,
}

impl Application {
    pub(crate) fn new(app_id: &str, version: &str, enabled: bool, doc: &str) -> Self {
        Self {
            app_id: app_id.trim().to_string(),
            version: version.to_string(),
            enabled: AtomicBool::new(enabled),
            doc: doc.to_string(),
            authorizer: RwLock::new(None),
            scheduler: RwLock::new(None),
            modules: DashMap::new(),
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn doc(&self) -> &str {
        &self.doc
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Authorizer that overrides the invoker-wide one for this application.
    pub fn authorizer(&self) -> Option<Arc<dyn Authorizer>> {
        self.authorizer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_authorizer(&self, authorizer: Option<Arc<dyn Authorizer>>) {
        *self.authorizer.write().unwrap_or_else(PoisonError::into_inner) = authorizer;
    }

    /// Scheduler used for this application's async timeouts, if overridden.
    pub fn scheduler(&self) -> Option<Arc<dyn TaskScheduler>> {
        self.scheduler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_scheduler(&self, scheduler: Option<Arc<dyn TaskScheduler>>) {
        *self.scheduler.write().unwrap_or_else(PoisonError::into_inner) = scheduler;
    }

    /// Gets or creates module `module_id`. Re-adding returns the existing module.
    pub fn add_module(
        self: &Arc<Self>,
        module_id: &str,
        enabled: bool,
        doc: &str,
    ) -> Result<Arc<Module>, RegistryError> {
        let key = registry_key(module_id).ok_or(RegistryError::EmptyId("module_id"))?;
        let module = match self.modules.entry(key) {
            Entry::Occupied(existing) => Arc::clone(existing.get()),
            Entry::Vacant(slot) => {
                let module = Arc::new(Module::new(Arc::downgrade(self), module_id, enabled, doc));
                debug!(app = %self.app_id, module = %module.module_id(), "Module added");
                Arc::clone(slot.insert(module).value())
            }
        };
        Ok(module)
    }

    pub fn module(&self, module_id: &str) -> Option<Arc<Module>> {
        let key = registry_key(module_id)?;
        self.modules.get(&key).map(|m| Arc::clone(m.value()))
    }

    pub fn has_module(&self, module_id: &str) -> bool {
        registry_key(module_id).is_some_and(|key| self.modules.contains_key(&key))
    }

    pub fn remove_module(&self, module_id: &str) -> Option<Arc<Module>> {
        let key = registry_key(module_id)?;
        self.modules.remove(&key).map(|(_, m)| m)
    }

    pub fn clear_modules(&self) {
        self.modules.clear();
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Snapshot of all modules.
    pub fn modules(&self) -> Vec<Arc<Module>> {
        self.modules.iter().map(|m| Arc::clone(m.value())).collect()
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("app_id", &self.app_id)
            .field("version", &self.version)
            .field("enabled", &self.is_enabled())
            .field("modules", &self.modules.len())
            .finish()
    }
}
