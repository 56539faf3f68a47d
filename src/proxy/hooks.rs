//! Named extension points around the outbound fetch.
//!
//! Embedding code registers interceptors under a hook name; the pipeline runs
//! every interceptor of a name one after another, each seeing the mutations
//! of the ones before it. The first interceptor to fail aborts the request.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::{HookError, ProxyError};
use crate::http::headers::Headers;
use crate::http::request::Request;
use crate::proxy::credentials::Credentials;
use crate::proxy::target::ForwardTarget;

/// Runs immediately before the outbound fetch.
pub const BACKEND_FETCH: &str = "backendFetch";

pub type HookFuture<'a> = Pin<Box<dyn Future<Output = Result<(), HookError>> + Send + 'a>>;

/// Options the forwarding engine uses for one outbound fetch.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub target: ForwardTarget,
    /// Rewrite the outbound `Host` header to the target.
    pub change_origin: bool,
    /// Sent to the destination as `Authorization: Basic …`.
    pub auth: Option<Credentials>,
    pub timeout: Option<Duration>,
}

impl FetchOptions {
    pub fn new(target: ForwardTarget, timeout: Option<Duration>) -> Self {
        let auth = target.auth.clone();
        Self {
            target,
            change_origin: true,
            auth,
            timeout,
        }
    }
}

/// Everything an interceptor may inspect or change.
#[derive(Debug)]
pub struct HookContext {
    /// The inbound request; header and body changes are forwarded.
    pub request: Request,
    /// Extra headers appended to the response relayed to the client.
    pub response_headers: Headers,
    pub options: FetchOptions,
    pub peer: SocketAddr,
}

impl HookContext {
    pub fn new(request: Request, options: FetchOptions, peer: SocketAddr) -> Self {
        Self {
            request,
            response_headers: Headers::new(),
            options,
            peer,
        }
    }
}

pub trait Hook: Send + Sync {
    fn call<'a>(&'a self, ctx: &'a mut HookContext) -> HookFuture<'a>;
}

impl<F> Hook for F
where
    F: for<'a> Fn(&'a mut HookContext) -> HookFuture<'a> + Send + Sync,
{
    fn call<'a>(&'a self, ctx: &'a mut HookContext) -> HookFuture<'a> {
        self(ctx)
    }
}

#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: HashMap<String, Vec<Arc<dyn Hook>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a closure interceptor to `name`.
    ///
    /// ```
    /// # use proxilate::proxy::hooks::{HookRegistry, BACKEND_FETCH};
    /// let mut hooks = HookRegistry::new();
    /// hooks.register(BACKEND_FETCH, |ctx| {
    ///     Box::pin(async move {
    ///         ctx.request.headers.insert("X-Random-Header", "testing");
    ///         Ok(())
    ///     })
    /// });
    /// assert_eq!(hooks.len(BACKEND_FETCH), 1);
    /// ```
    pub fn register<F>(&mut self, name: impl Into<String>, hook: F)
    where
        F: for<'a> Fn(&'a mut HookContext) -> HookFuture<'a> + Send + Sync + 'static,
    {
        self.register_hook(name, Arc::new(hook));
    }

    pub fn register_hook(&mut self, name: impl Into<String>, hook: Arc<dyn Hook>) {
        self.hooks.entry(name.into()).or_default().push(hook);
    }

    pub fn len(&self, name: &str) -> usize {
        self.hooks.get(name).map_or(0, Vec::len)
    }

    pub fn is_empty(&self, name: &str) -> bool {
        self.len(name) == 0
    }

    /// Runs the interceptors of `name` in registration order.
    pub async fn exec(&self, name: &str, ctx: &mut HookContext) -> Result<(), ProxyError> {
        let Some(hooks) = self.hooks.get(name) else {
            return Ok(());
        };

        for (index, hook) in hooks.iter().enumerate() {
            debug!(hook = name, index, "Running hook");
            hook.call(ctx).await.map_err(|err| ProxyError::HookExecution {
                hook: name.to_string(),
                message: err.message().to_string(),
            })?;
        }

        Ok(())
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (name, hooks) in &self.hooks {
            map.entry(name, &hooks.len());
        }
        map.finish()
    }
}
