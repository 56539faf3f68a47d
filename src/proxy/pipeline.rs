//! The per-request dispatch pipeline.
//!
//! Health probe → Basic Auth → target resolution → forbidden hosts →
//! `backendFetch` hooks → forwarding engine. Each stage either passes the
//! request on or ends it with a [`ProxyError`]; only the last one touches the
//! network.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::ProxyConfig;
use crate::error::{ProxyError, ServerError};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::logger::{LogEntry, LogLevel, RequestLogger};
use crate::proxy::hooks::{BACKEND_FETCH, FetchOptions, HookContext, HookRegistry};
use crate::proxy::middleware::{BasicAuth, ForbiddenHosts, healthcheck};
use crate::proxy::target::{ForwardTarget, describe_destination};
use crate::proxy::tls;
use crate::proxy::upstream::ForwardingEngine;

pub struct Pipeline {
    config: Arc<ProxyConfig>,
    auth: Option<BasicAuth>,
    forbidden: ForbiddenHosts,
    hooks: Arc<HookRegistry>,
    engine: ForwardingEngine,
    logger: RequestLogger,
}

impl Pipeline {
    pub fn new(config: Arc<ProxyConfig>, hooks: Arc<HookRegistry>) -> Result<Self, ServerError> {
        let auth = config
            .auth_enabled()
            .then(|| BasicAuth::new(config.username.as_deref(), config.password.as_deref()));
        let forbidden = ForbiddenHosts::new(config.forbidden_hosts.clone());
        let engine = ForwardingEngine::new(tls::connector()?, config.max_response_bytes);

        Ok(Self {
            config,
            auth,
            forbidden,
            hooks,
            engine,
            logger: RequestLogger,
        })
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Produces the final response for one request.
    ///
    /// Every outcome except the health probe writes exactly one audit line.
    pub async fn dispatch(&self, request: Request, peer: SocketAddr) -> Response {
        if let Some(response) = healthcheck::probe(&request) {
            return response;
        }

        let entry = LogEntry::new(peer, describe_destination(self.config.target.as_ref(), &request.path));

        match self.process(request, peer).await {
            Ok(response) => {
                let msg = format!("Destination responded with status {}", response.status.as_u16());
                self.logger.log(LogLevel::Info, &entry, &msg);
                response
            }
            Err(err) => {
                self.logger.log(err.level(), &entry, &err.to_string());
                err.to_response()
            }
        }
    }

    async fn process(&self, mut request: Request, peer: SocketAddr) -> Result<Response, ProxyError> {
        if let Some(auth) = &self.auth {
            auth.authenticate(&request)?;
            // Proxy credentials stop here.
            request.headers.remove("Authorization");
        }

        let target = match &self.config.target {
            Some(origin) => ForwardTarget::reverse(origin, &request.path)?,
            None => ForwardTarget::resolve(&request.path)?,
        };

        if !self.forbidden.is_empty() {
            self.forbidden.check(&target)?;
        }

        let options = FetchOptions::new(target, self.config.proxy_timeout);
        let mut ctx = HookContext::new(request, options, peer);
        self.hooks.exec(BACKEND_FETCH, &mut ctx).await?;

        let HookContext {
            request,
            response_headers,
            options,
            ..
        } = ctx;

        let mut response = self.engine.forward(&request, &options).await?;
        for (key, value) in response_headers {
            response.headers.append(key, value);
        }

        Ok(response)
    }
}
