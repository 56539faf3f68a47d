//! Proxilate - access-controlled HTTP forward/reverse proxy
//!
//! Requests to `/<absolute url>` are forwarded to that URL; with a fixed
//! target configured, every request goes to that origin instead.

pub mod config;
pub mod error;
pub mod http;
pub mod logger;
pub mod proxy;
pub mod server;

pub use config::ProxyConfig;
pub use error::{ConfigError, HookError, ProxyError, ServerError};
pub use server::Proxilate;
