//! # Command Registry
//!
//! The registry is a four-level ownership tree:
//!
//! ```text
//! Registry
//!  └─ Application (app_id + version)
//!      └─ Module (module_id)
//!          └─ Actor (actor_id, handler type, permissions)
//!              └─ Command (cmd, operation, permissions, timeout, async result)
//! ```
//!
//! Every level is keyed case-insensitively and stored in a [`DashMap`], so
//! get-or-create and lookups are safe from any thread. A reader racing a
//! population step may see a partially built tree, but never a torn entry.
//!
//! Children keep a [`Weak`](std::sync::Weak) reference to their parent: the
//! registry alone owns the tree, and removing an application drops everything
//! below it.
//!
//! ## Enabled flags
//!
//! Each level carries its own `enabled` flag. [`Registry::resolve_command`] with
//! `enabled_only = true` treats a disabled entity at *any* level as not found,
//! without touching the flags of its children.

mod actor;
mod application;
mod command;
mod module;

pub use actor::{Actor, ActorDef};
pub use application::Application;
pub use command::{Command, CommandDef, DEFAULT_TIMEOUT};
pub use module::Module;

use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::message::Request;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Version assumed when a request or registration names none.
pub const DEFAULT_APP_VERSION: &str = "1.0.0";

/// Case-insensitive key for a registry identifier. `None` when blank.
pub(crate) fn registry_key(id: &str) -> Option<String> {
    let id = id.trim();
    if id.is_empty() {
        None
    } else {
        Some(id.to_uppercase())
    }
}

/// Trimmed version, or [`DEFAULT_APP_VERSION`] when absent or blank.
pub fn normalize_version(version: Option<&str>) -> &str {
    match version.map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => DEFAULT_APP_VERSION,
    }
}

fn app_key(app_id: &str, version: Option<&str>) -> Option<String> {
    let id = registry_key(app_id)?;
    Some(format!("{}|{}", id, normalize_version(version).to_uppercase()))
}

/// A fully resolved command together with its ancestors.
#[derive(Debug, Clone)]
pub struct CommandInfo {
    application: Arc<Application>,
    module: Arc<Module>,
    actor: Arc<Actor>,
    command: Arc<Command>,
}

impl CommandInfo {
    pub fn application(&self) -> &Arc<Application> {
        &self.application
    }

    pub fn module(&self) -> &Arc<Module> {
        &self.module
    }

    pub fn actor(&self) -> &Arc<Actor> {
        &self.actor
    }

    pub fn command(&self) -> &Arc<Command> {
        &self.command
    }

    /// `APP@VERSION/MODULE/ACTOR/cmd` as registered.
    pub fn address(&self) -> String {
        format!(
            "{}@{}/{}/{}/{}",
            self.application.app_id(),
            self.application.version(),
            self.module.module_id(),
            self.actor.actor_id(),
            self.command.cmd()
        )
    }
}

impl fmt::Display for CommandInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address())
    }
}

/// Root of the application tree.
#[derive(Default)]
pub struct Registry {
    apps: DashMap<String, Arc<Application>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets or creates an application. Re-adding returns the existing one.
    pub fn add_application(
        &self,
        app_id: &str,
        version: Option<&str>,
        enabled: bool,
        doc: &str,
    ) -> Result<Arc<Application>, RegistryError> {
        let key = app_key(app_id, version).ok_or(RegistryError::EmptyId("app_id"))?;
        let app = match self.apps.entry(key) {
            Entry::Occupied(existing) => Arc::clone(existing.get()),
            Entry::Vacant(slot) => {
                let app = Arc::new(Application::new(
                    app_id,
                    normalize_version(version),
                    enabled,
                    doc,
                ));
                debug!(app = %app.app_id(), version = %app.version(), "Application added");
                Arc::clone(slot.insert(app).value())
            }
        };
        Ok(app)
    }

    pub fn application(&self, app_id: &str, version: Option<&str>) -> Option<Arc<Application>> {
        let key = app_key(app_id, version)?;
        self.apps.get(&key).map(|a| Arc::clone(a.value()))
    }

    pub fn has_application(&self, app_id: &str, version: Option<&str>) -> bool {
        app_key(app_id, version).is_some_and(|key| self.apps.contains_key(&key))
    }

    pub fn remove_application(&self, app_id: &str, version: Option<&str>) -> Option<Arc<Application>> {
        let key = app_key(app_id, version)?;
        self.apps.remove(&key).map(|(_, a)| a)
    }

    pub fn clear_applications(&self) {
        self.apps.clear();
    }

    /// Number of applications, counting each version separately.
    pub fn application_count(&self) -> usize {
        self.apps.len()
    }

    pub fn applications(&self) -> Vec<Arc<Application>> {
        self.apps.iter().map(|a| Arc::clone(a.value())).collect()
    }

    /// Walks `app/module/actor/cmd`.
    ///
    /// With `enabled_only`, a disabled entity at any level ends the walk with
    /// `None`. Missing or blank identifiers are also `None`.
    pub fn resolve_command(
        &self,
        app_id: &str,
        version: Option<&str>,
        module_id: &str,
        actor_id: &str,
        cmd: &str,
        enabled_only: bool,
    ) -> Option<CommandInfo> {
        let visible = |enabled: bool| !enabled_only || enabled;

        let application = self.application(app_id, version)?;
        if !visible(application.is_enabled()) {
            return None;
        }
        let module = application.module(module_id)?;
        if !visible(module.is_enabled()) {
            return None;
        }
        let actor = module.actor(actor_id)?;
        if !visible(actor.is_enabled()) {
            return None;
        }
        let command = actor.command(cmd)?;
        if !visible(command.is_enabled()) {
            return None;
        }
        Some(CommandInfo {
            application,
            module,
            actor,
            command,
        })
    }

    /// Resolves the address carried by `request`.
    pub fn resolve(&self, request: &Request, enabled_only: bool) -> Option<CommandInfo> {
        self.resolve_command(
            request.app_id(),
            request.app_version(),
            request.module_id(),
            request.actor_id(),
            request.cmd(),
            enabled_only,
        )
    }

    /// Pre-declares applications and modules from configuration.
    ///
    /// With `reset` the registry is emptied first. Otherwise applications that
    /// already exist are left untouched.
    pub fn apply_config(&self, config: &RegistryConfig, reset: bool) -> Result<usize, RegistryError> {
        if reset {
            self.clear_applications();
        }
        let mut added = 0;
        for app_config in &config.applications {
            let version = app_config.version.as_deref();
            if self.has_application(&app_config.app_id, version) {
                debug!(app = %app_config.app_id, "Application already registered, keeping it");
                continue;
            }
            let app = self.add_application(
                &app_config.app_id,
                version,
                app_config.enabled,
                app_config.doc.as_deref().unwrap_or_default(),
            )?;
            for module in &app_config.modules {
                app.add_module(
                    &module.module_id,
                    module.enabled,
                    module.doc.as_deref().unwrap_or_default(),
                )?;
            }
            added += 1;
        }
        info!(added, reset, total = self.apps.len(), "Registry configured");
        Ok(added)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("applications", &self.apps.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{HandlerType, Operation};
    use crate::value::Value;

    #[derive(Default)]
    struct Echo;

    #[derive(Default)]
    struct Other;

    fn ping() -> Operation {
        Operation::new::<Echo, _>("ping", 0, |_, _, _| Ok(Some(Value::from("pong"))))
    }

    fn populated() -> (Registry, Arc<Application>, Arc<Module>, Arc<Actor>, Arc<Command>) {
        let registry = Registry::new();
        let app = registry.add_application("Demo", None, true, "").unwrap();
        let module = app.add_module("GLOBAL", true, "").unwrap();
        let actor = module
            .add_actor(ActorDef::new("Echo", HandlerType::of::<Echo>()))
            .unwrap();
        let command = actor.add_command(CommandDef::new("ping", ping())).unwrap();
        (registry, app, module, actor, command)
    }

    #[test]
    fn test_lookup_is_case_insensitive_with_default_version() {
        let (registry, ..) = populated();
        let info = registry
            .resolve_command("demo", Some("1.0.0"), "global", "ECHO", "PING", true)
            .unwrap();
        assert_eq!(info.address(), "Demo@1.0.0/GLOBAL/Echo/ping");
        assert!(registry.has_application("DEMO", Some("  ")));
        assert!(!registry.has_application("Demo", Some("2.0")));
    }

    #[test]
    fn test_disabled_at_any_level_hides_command() {
        let (registry, app, module, actor, command) = populated();
        let resolve = |enabled_only| {
            registry
                .resolve_command("Demo", None, "GLOBAL", "Echo", "ping", enabled_only)
                .is_some()
        };

        let toggles: [&dyn Fn(bool); 4] = [
            &|e| app.set_enabled(e),
            &|e| module.set_enabled(e),
            &|e| actor.set_enabled(e),
            &|e| command.set_enabled(e),
        ];
        for toggle in toggles {
            toggle(false);
            assert!(!resolve(true));
            assert!(resolve(false));
            toggle(true);
            assert!(resolve(true));
        }
    }

    #[test]
    fn test_disabling_module_does_not_touch_children() {
        let (_registry, _app, module, actor, command) = populated();
        module.set_enabled(false);
        assert!(actor.is_enabled());
        assert!(command.is_enabled());
    }

    #[test]
    fn test_module_get_or_create_returns_same_instance() {
        let (_registry, app, module, ..) = populated();
        let again = app.add_module("global", false, "ignored").unwrap();
        assert!(Arc::ptr_eq(&module, &again));
        assert!(again.is_enabled());
        assert_eq!(app.module_count(), 1);
    }

    #[test]
    fn test_actor_conflict_keeps_first_registration() {
        let (_registry, _app, module, actor, _) = populated();
        let err = module
            .add_actor(ActorDef::new("echo", HandlerType::of::<Other>()))
            .unwrap_err();
        assert!(matches!(err, RegistryError::ActorConflict { .. }));
        let kept = module.actor("Echo").unwrap();
        assert!(Arc::ptr_eq(&kept, &actor));
        assert_eq!(kept.handler_type().name(), "Echo");

        let same = module
            .add_actor(ActorDef::new("ECHO", HandlerType::of::<Echo>()))
            .unwrap();
        assert!(Arc::ptr_eq(&same, &actor));
    }

    #[test]
    fn test_command_duplicate_and_conflict() {
        let (_registry, _app, _module, actor, command) = populated();
        let same = actor.add_command(CommandDef::new("PING", ping())).unwrap();
        assert!(Arc::ptr_eq(&same, &command));

        let other = Operation::new::<Echo, _>("other", 0, |_, _, _| Ok(None));
        let err = actor.add_command(CommandDef::new("ping", other)).unwrap_err();
        assert!(matches!(err, RegistryError::CommandConflict { .. }));
        assert_eq!(actor.command("ping").unwrap().operation().name(), "ping");
    }

    #[test]
    fn test_command_for_foreign_handler_is_rejected() {
        let (_registry, _app, _module, actor, _) = populated();
        let foreign = Operation::new::<Other, _>("run", 0, |_, _, _| Ok(None));
        let err = actor.add_command(CommandDef::new("run", foreign)).unwrap_err();
        assert!(matches!(err, RegistryError::HandlerMismatch { .. }));
        assert!(!actor.has_command("run"));
    }

    #[test]
    fn test_zero_timeout_falls_back_to_default() {
        let (_registry, _app, _module, actor, command) = populated();
        assert_eq!(command.timeout(), DEFAULT_TIMEOUT);
        let op = Operation::new::<Echo, _>("slow", 0, |_, _, _| Ok(None));
        let slow = actor
            .add_command(CommandDef::new("slow", op).timeout(std::time::Duration::ZERO))
            .unwrap();
        assert_eq!(slow.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(slow.declared_timeout(), None);
    }

    #[test]
    fn test_back_references_and_removal() {
        let (registry, app, module, actor, command) = populated();
        assert!(Arc::ptr_eq(&command.actor().unwrap(), &actor));
        assert!(Arc::ptr_eq(&actor.module().unwrap(), &module));
        assert!(Arc::ptr_eq(&module.application().unwrap(), &app));

        drop(app);
        registry.remove_application("Demo", None);
        assert!(module.application().is_none());
        assert!(registry
            .resolve_command("Demo", None, "GLOBAL", "Echo", "ping", false)
            .is_none());
    }

    #[test]
    fn test_blank_identifiers_are_not_found() {
        let (registry, ..) = populated();
        assert!(registry.resolve_command("", None, "GLOBAL", "Echo", "ping", false).is_none());
        assert!(registry.resolve_command("Demo", None, " ", "Echo", "ping", false).is_none());
        assert!(registry.add_application("  ", None, true, "").is_err());
    }
}
