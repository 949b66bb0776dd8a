//! Modules group actors inside an application.

use super::actor::{Actor, ActorDef};
use super::application::Application;
use super::registry_key;
use crate::error::RegistryError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

pub struct Module {
    application: Weak<Application>,
    module_id: String,
    enabled: AtomicBool,
    doc: String,
    actors: DashMap<String, Arc<Actor>>,
}

impl Module {
    pub(crate) fn new(application: Weak<Application>, module_id: &str, enabled: bool, doc: &str) -> Self {
        Self {
            application,
            module_id: module_id.trim().to_string(),
            enabled: AtomicBool::new(enabled),
            doc: doc.to_string(),
            actors: DashMap::new(),
        }
    }

    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    pub fn doc(&self) -> &str {
        &self.doc
    }

    /// The owning application, unless it has been removed.
    pub fn application(&self) -> Option<Arc<Application>> {
        self.application.upgrade()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Registers an actor.
    ///
    /// Registering the same handler type under an existing id returns the
    /// existing actor. A different handler type under an existing id is a
    /// conflict: it is logged and the first registration stays.
    pub fn add_actor(self: &Arc<Self>, def: ActorDef) -> Result<Arc<Actor>, RegistryError> {
        let key = registry_key(def.actor_id()).ok_or(RegistryError::EmptyId("actor_id"))?;
        match self.actors.entry(key) {
            Entry::Occupied(existing) => {
                let existing = existing.get();
                if existing.handler_type() == def.handler_type() {
                    return Ok(Arc::clone(existing));
                }
                let err = RegistryError::ActorConflict {
                    module_id: self.module_id.clone(),
                    actor_id: existing.actor_id().to_string(),
                    existing: existing.handler_type().name(),
                    rejected: def.handler_type().name(),
                };
                warn!(module = %self.module_id, actor = %existing.actor_id(), error = %err, "Actor registration conflict");
                Err(err)
            }
            Entry::Vacant(slot) => {
                let actor = Arc::new(Actor::new(Arc::downgrade(self), def));
                debug!(module = %self.module_id, actor = %actor.actor_id(), handler = actor.handler_type().name(), "Actor added");
                Ok(Arc::clone(slot.insert(actor).value()))
            }
        }
    }

    pub fn actor(&self, actor_id: &str) -> Option<Arc<Actor>> {
        let key = registry_key(actor_id)?;
        self.actors.get(&key).map(|a| Arc::clone(a.value()))
    }

    pub fn has_actor(&self, actor_id: &str) -> bool {
        registry_key(actor_id).is_some_and(|key| self.actors.contains_key(&key))
    }

    pub fn remove_actor(&self, actor_id: &str) -> Option<Arc<Actor>> {
        let key = registry_key(actor_id)?;
        self.actors.remove(&key).map(|(_, a)| a)
    }

    pub fn clear_actors(&self) {
        self.actors.clear();
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    pub fn actors(&self) -> Vec<Arc<Actor>> {
        self.actors.iter().map(|a| Arc::clone(a.value())).collect()
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("module_id", &self.module_id)
            .field("enabled", &self.is_enabled())
            .field("actors", &self.actors.len())
            .finish()
    }
}
