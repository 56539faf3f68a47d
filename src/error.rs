//! Error types for the proxy core, its configuration and its listener.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::http::response::{Response, ResponseBuilder, StatusCode};
use crate::logger::LogLevel;

/// Realm advertised when the client must authenticate.
pub const AUTH_REALM_HEADER: &str = "Basic realm=\"Credentials required\"";

/// A terminal outcome of the request pipeline.
///
/// Every variant maps to the status code the client receives and to the
/// level its audit line is written at. Destination 4xx/5xx responses are not
/// errors and never become a `ProxyError`.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("forward url must be absolute")]
    MalformedTarget { url: String },

    #[error("unsupported forward url scheme \"{scheme}\"")]
    UnsupportedScheme { scheme: String },

    #[error("Basic Auth authentication required")]
    AuthenticationRequired,

    #[error("Basic Auth authentication failed for user \"{username}\"")]
    AuthenticationFailed { username: String },

    #[error("Destination host forbidden")]
    ForbiddenHost { host: String },

    #[error("Hook \"{hook}\" failed: {message}")]
    HookExecution { hook: String, message: String },

    #[error("Unable to reach destination {destination}: {reason}")]
    BackendUnreachable { destination: String, reason: String },

    #[error("Invalid response from destination {destination}: {reason}")]
    BackendProtocol { destination: String, reason: String },

    #[error("Destination {destination} did not respond within {timeout:?}")]
    BackendTimeout { destination: String, timeout: Duration },
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MalformedTarget { .. } | ProxyError::UnsupportedScheme { .. } => {
                StatusCode::BAD_REQUEST
            }
            ProxyError::AuthenticationRequired | ProxyError::AuthenticationFailed { .. } => {
                StatusCode::UNAUTHORIZED
            }
            ProxyError::ForbiddenHost { .. } => StatusCode::FORBIDDEN,
            ProxyError::HookExecution { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::BackendUnreachable { .. } | ProxyError::BackendProtocol { .. } => {
                StatusCode::BAD_GATEWAY
            }
            ProxyError::BackendTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Client and policy rejections are warnings; failures on our side of
    /// the relay are errors.
    pub fn level(&self) -> LogLevel {
        match self {
            ProxyError::HookExecution { .. }
            | ProxyError::BackendUnreachable { .. }
            | ProxyError::BackendProtocol { .. }
            | ProxyError::BackendTimeout { .. } => LogLevel::Error,
            _ => LogLevel::Warn,
        }
    }

    /// The response sent to the client. Bodies never echo internal detail.
    pub fn to_response(&self) -> Response {
        let status = self.status();
        match self {
            ProxyError::MalformedTarget { .. } => Response::text(status, "forward url must be absolute"),
            ProxyError::UnsupportedScheme { .. } => {
                Response::text(status, "forward url scheme must be http or https")
            }
            ProxyError::AuthenticationRequired | ProxyError::AuthenticationFailed { .. } => {
                ResponseBuilder::new(status)
                    .header("WWW-Authenticate", AUTH_REALM_HEADER)
                    .build()
            }
            ProxyError::ForbiddenHost { .. } => Response::text(status, "Host Forbidden"),
            ProxyError::HookExecution { .. } => Response::internal_error(),
            ProxyError::BackendUnreachable { .. } | ProxyError::BackendProtocol { .. } => Response::text(
                status,
                "502 Bad Gateway\n\nFailed to connect to the destination server.",
            ),
            ProxyError::BackendTimeout { .. } => Response::text(
                status,
                "504 Gateway Timeout\n\nThe destination server did not respond in time.",
            ),
        }
    }
}

/// Failure reported by a hook to abort the pipeline.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HookError {
    message: String,
}

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<anyhow::Error> for HookError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{err:#}"))
    }
}

/// Invalid or unreadable configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid value for {key}: {value:?}")]
    Env { key: &'static str, value: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Listener lifecycle failures.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to set up TLS client")]
    Tls(#[from] rustls::Error),
}
