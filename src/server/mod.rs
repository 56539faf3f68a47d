//! Proxy instance lifecycle: configuration, hook registration, start/stop.

pub mod listener;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::ProxyConfig;
use crate::error::{ConfigError, ServerError};
use crate::proxy::hooks::{Hook, HookContext, HookFuture, HookRegistry};
use crate::proxy::pipeline::Pipeline;

/// A proxy instance.
///
/// Hooks are registered before [`start`](Self::start); each start takes a
/// snapshot of the registry for the lifetime of that listener.
pub struct Proxilate {
    config: Arc<ProxyConfig>,
    hooks: HookRegistry,
    running: Mutex<Option<Running>>,
}

struct Running {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Proxilate {
    pub fn new(config: ProxyConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            config: Arc::new(config),
            hooks: HookRegistry::new(),
            running: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Appends an interceptor to the hook `name` (e.g. `backendFetch`).
    pub fn register<F>(&mut self, name: impl Into<String>, hook: F)
    where
        F: for<'a> Fn(&'a mut HookContext) -> HookFuture<'a> + Send + Sync + 'static,
    {
        self.hooks.register(name, hook);
    }

    pub fn register_hook(&mut self, name: impl Into<String>, hook: Arc<dyn Hook>) {
        self.hooks.register_hook(name, hook);
    }

    /// Binds the listener and starts accepting connections.
    ///
    /// Returns the bound address. Calling it while already running returns
    /// the current address without rebinding.
    pub async fn start(&self) -> Result<SocketAddr, ServerError> {
        let mut running = self.running.lock().await;
        if let Some(current) = running.as_ref() {
            return Ok(current.addr);
        }

        let pipeline = Pipeline::new(Arc::clone(&self.config), Arc::new(self.hooks.clone()))?;
        let requested = self.config.listen_addr();
        let listener = listener::bind(requested).await?;
        let addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind { addr: requested, source })?;

        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(listener::run(listener, Arc::new(pipeline), shutdown_rx));

        match &self.config.target {
            Some(origin) => info!(%addr, %origin, "Started Proxilate in reverse-proxy mode"),
            None => info!(%addr, "Started Proxilate"),
        }

        *running = Some(Running { addr, shutdown, task });
        Ok(addr)
    }

    /// Stops accepting connections. A no-op when not running.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };

        let _ = running.shutdown.send(());
        if let Err(e) = running.task.await {
            warn!(error = %e, "Listener task ended abnormally");
        }

        info!(addr = %running.addr, "Stopped Proxilate");
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().map(|running| running.addr)
    }
}
