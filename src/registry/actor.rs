//! Actors: a handler type plus the commands bound to its methods.

use super::command::{Command, CommandDef};
use super::module::Module;
use super::registry_key;
use crate::error::RegistryError;
use crate::handler::HandlerType;
use crate::permission::PermissionSet;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// Registration data for an [`Actor`].
///
/// ```rust
/// use actor_dispatch::{ActorDef, HandlerType};
///
/// #[derive(Default)]
/// struct UserPermission;
///
/// let def = ActorDef::new("UserPermission", HandlerType::of::<UserPermission>())
///     .permissions([1, 2])
///     .doc("Permission checks");
/// assert_eq!(def.actor_id(), "UserPermission");
/// ```
#[derive(Debug, Clone)]
pub struct ActorDef {
    actor_id: String,
    handler_type: HandlerType,
    permissions: Vec<i32>,
    enabled: bool,
    doc: String,
}

impl ActorDef {
    pub fn new(actor_id: impl Into<String>, handler_type: HandlerType) -> Self {
        Self {
            actor_id: actor_id.into(),
            handler_type,
            permissions: Vec::new(),
            enabled: true,
            doc: String::new(),
        }
    }

    pub fn permissions<I: IntoIterator<Item = i32>>(mut self, tokens: I) -> Self {
        self.permissions = tokens.into_iter().collect();
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    pub fn actor_id(&self) -> &str {
        &self.actor_id
    }

    pub fn handler_type(&self) -> &HandlerType {
        &self.handler_type
    }
}

pub struct Actor {
    module: Weak<Module>,
    actor_id: String,
    handler_type: HandlerType,
    permissions: PermissionSet,
    enabled: AtomicBool,
    doc: String,
    commands: DashMap<String, Arc<Command>>,
}

impl Actor {
    pub(crate) fn new(module: Weak<Module>, def: ActorDef) -> Self {
        Self {
            module,
            actor_id: def.actor_id.trim().to_string(),
            handler_type: def.handler_type,
            permissions: PermissionSet::new(def.permissions),
            enabled: AtomicBool::new(def.enabled),
            doc: def.doc,
            commands: DashMap::new(),
        }
    }

    pub fn actor_id(&self) -> &str {
        &self.actor_id
    }

    pub fn handler_type(&self) -> &HandlerType {
        &self.handler_type
    }

    pub fn permissions(&self) -> &PermissionSet {
        &self.permissions
    }

    pub fn doc(&self) -> &str {
        &self.doc
    }

    pub fn module(&self) -> Option<Arc<Module>> {
        self.module.upgrade()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Registers a command.
    ///
    /// The same operation under an existing name is a no-op returning the
    /// existing command; a different operation is a logged conflict and the
    /// first registration stays.
    pub fn add_command(self: &Arc<Self>, def: CommandDef) -> Result<Arc<Command>, RegistryError> {
        let key = registry_key(def.cmd()).ok_or(RegistryError::EmptyId("cmd"))?;
        if def.operation().handler_type_id() != self.handler_type.type_id() {
            return Err(RegistryError::HandlerMismatch {
                actor_id: self.actor_id.clone(),
                handler: self.handler_type.name(),
                operation: def.operation().to_string(),
            });
        }
        match self.commands.entry(key) {
            Entry::Occupied(existing) => {
                let existing = existing.get();
                if existing.operation().same_as(def.operation()) {
                    return Ok(Arc::clone(existing));
                }
                let err = RegistryError::CommandConflict {
                    actor_id: self.actor_id.clone(),
                    cmd: existing.cmd().to_string(),
                    existing: existing.operation().to_string(),
                    rejected: def.operation().to_string(),
                };
                warn!(actor = %self.actor_id, cmd = %existing.cmd(), error = %err, "Command registration conflict");
                Err(err)
            }
            Entry::Vacant(slot) => {
                let command = Arc::new(Command::new(Arc::downgrade(self), def));
                debug!(actor = %self.actor_id, cmd = %command.cmd(), "async" = command.is_async(), "Command added");
                Ok(Arc::clone(slot.insert(command).value()))
            }
        }
    }

    pub fn command(&self, cmd: &str) -> Option<Arc<Command>> {
        let key = registry_key(cmd)?;
        self.commands.get(&key).map(|c| Arc::clone(c.value()))
    }

    pub fn has_command(&self, cmd: &str) -> bool {
        registry_key(cmd).is_some_and(|key| self.commands.contains_key(&key))
    }

    pub fn remove_command(&self, cmd: &str) -> Option<Arc<Command>> {
        let key = registry_key(cmd)?;
        self.commands.remove(&key).map(|(_, c)| c)
    }

    pub fn clear_commands(&self) {
        self.commands.clear();
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    pub fn commands(&self) -> Vec<Arc<Command>> {
        self.commands.iter().map(|c| Arc::clone(c.value())).collect()
    }
}

impl fmt::Debug for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Actor")
            .field("actor_id", &self.actor_id)
            .field("handler", &self.handler_type.name())
            .field("permissions", &self.permissions)
            .field("enabled", &self.is_enabled())
            .field("commands", &self.commands.len())
            .finish()
    }
}
