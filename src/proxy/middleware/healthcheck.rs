use crate::http::request::Request;
use crate::http::response::Response;

/// Reserved path answered by the proxy itself.
pub const HEALTHCHECK_PATH: &str = "/healthcheck";

/// Answers monitoring probes without auth, host policy or logging.
pub fn probe(request: &Request) -> Option<Response> {
    (request.path == HEALTHCHECK_PATH).then(|| Response::ok("OK"))
}
