use crate::error::SampleError;
use crate::{async_actor, echo_actor, permission_actor};
use actor_dispatch::{
    Application, DispatchClient, DispatchConfig, Invoker, Module, Registry, TokioScheduler,
};
use permission_actor::DemoAuthorizer;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{error, info};

/// Application and modules of the demo.
pub const DEMO_CONFIG: &str = r#"
[invoker]
default_timeout_ms = 60000
shutdown_wait_ms = 5000
shutdown_poll_ms = 50

[[registry.applications]]
app_id = "Demo"
doc = "Dispatch engine demo"

[[registry.applications.modules]]
module_id = "GLOBAL"
doc = "Synchronous commands"

[[registry.applications.modules]]
module_id = "ASYNC"
doc = "Async callback commands"

[[registry.applications.modules]]
module_id = "PERMISSION"
doc = "Permission checks"
"#;

pub const DEMO_APP: &str = "Demo";

/// The demo's engine, fully wired.
///
/// # Example
///
/// ```ignore
/// let system = DispatchSystem::new()?;
/// let pong = system.client.fetch(ping_request).await?;
/// system.shutdown().await?;
/// ```
pub struct DispatchSystem {
    /// The populated command tree.
    pub registry: Arc<Registry>,

    /// The engine. Use it directly for `sync_invoke` from blocking code.
    pub invoker: Arc<Invoker>,

    /// Async access for tokio code.
    pub client: DispatchClient,
}

impl DispatchSystem {
    /// Builds the system from [`DEMO_CONFIG`]. Must be called inside a tokio
    /// runtime.
    pub fn new() -> Result<Self, SampleError> {
        Self::with_config(DispatchConfig::from_toml_str(DEMO_CONFIG)?)
    }

    /// Builds the system from `config`. The configuration must declare the
    /// `Demo` application with the `GLOBAL`, `ASYNC` and `PERMISSION` modules.
    pub fn with_config(config: DispatchConfig) -> Result<Self, SampleError> {
        let runtime = Handle::try_current().map_err(|e| SampleError::NoRuntime(e.to_string()))?;
        let registry = Arc::new(Registry::new());
        registry.apply_config(&config.registry, true)?;

        let app = registry
            .application(DEMO_APP, None)
            .ok_or(SampleError::MissingApplication(DEMO_APP))?;
        echo_actor::register(&module(&app, "GLOBAL")?)?;
        async_actor::register(&module(&app, "ASYNC")?, runtime.clone())?;
        permission_actor::register(&module(&app, "PERMISSION")?)?;
        app.set_authorizer(Some(Arc::new(DemoAuthorizer)));

        let invoker = Arc::new(
            Invoker::new(Arc::clone(&registry))
                .with_scheduler(Arc::new(TokioScheduler::new(runtime)))
                .with_config(config.invoker),
        );
        let client = DispatchClient::new(Arc::clone(&invoker));
        info!(app = DEMO_APP, modules = app.module_count(), "Dispatch system ready");

        Ok(Self {
            registry,
            invoker,
            client,
        })
    }

    /// Waits for running calls to finish.
    pub async fn shutdown(self) -> Result<(), SampleError> {
        let invoker = Arc::clone(&self.invoker);
        let remaining = tokio::task::spawn_blocking(move || invoker.shutdown())
            .await
            .map_err(|e| SampleError::Join(e.to_string()))?;
        if remaining > 0 {
            error!(remaining, "Dispatch system stopped with calls in flight");
            return Err(SampleError::StillRunning(remaining));
        }
        info!("Dispatch system stopped");
        Ok(())
    }
}

fn module(app: &Application, module_id: &'static str) -> Result<Arc<Module>, SampleError> {
    app.module(module_id).ok_or(SampleError::MissingModule(module_id))
}
