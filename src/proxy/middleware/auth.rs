use crate::error::ProxyError;
use crate::http::request::Request;
use crate::proxy::credentials::Credentials;

/// Client-to-proxy Basic Auth gate.
///
/// Credentials are compared with plain string equality.
#[derive(Debug, Clone)]
pub struct BasicAuth {
    expected: Credentials,
}

impl BasicAuth {
    /// A missing half of the pair is expected to be empty.
    pub fn new(username: Option<&str>, password: Option<&str>) -> Self {
        Self {
            expected: Credentials::new(username.unwrap_or_default(), password.unwrap_or_default()),
        }
    }

    pub fn authenticate(&self, request: &Request) -> Result<(), ProxyError> {
        let presented = request
            .header("Authorization")
            .and_then(Credentials::from_basic_header)
            .ok_or(ProxyError::AuthenticationRequired)?;

        if presented != self.expected {
            return Err(ProxyError::AuthenticationFailed {
                username: presented.username,
            });
        }

        Ok(())
    }
}
