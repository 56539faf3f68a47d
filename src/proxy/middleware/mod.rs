//! Gates evaluated before a request is forwarded.
//!
//! Order per request: [`healthcheck`] first (bypasses everything else), then
//! [`auth`], target resolution, and [`forbidden_hosts`].

pub mod auth;
pub mod forbidden_hosts;
pub mod healthcheck;

pub use auth::BasicAuth;
pub use forbidden_hosts::ForbiddenHosts;
