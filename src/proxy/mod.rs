//! Proxy core
//!
//! Target resolution, access control, hooks and the forwarding engine, tied
//! together by [`pipeline::Pipeline`].

pub mod credentials;
pub mod hooks;
pub mod middleware;
pub mod pipeline;
pub mod target;
pub mod tls;
pub mod upstream;

pub use credentials::Credentials;
pub use hooks::{BACKEND_FETCH, FetchOptions, Hook, HookContext, HookFuture, HookRegistry};
pub use pipeline::Pipeline;
pub use target::{ForwardTarget, Scheme};
pub use upstream::ForwardingEngine;
