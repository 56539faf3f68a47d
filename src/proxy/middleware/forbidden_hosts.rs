use std::collections::HashSet;

use crate::error::ProxyError;
use crate::proxy::target::ForwardTarget;

/// Proxy-to-destination host policy.
#[derive(Debug, Clone, Default)]
pub struct ForbiddenHosts {
    hosts: HashSet<String>,
}

impl ForbiddenHosts {
    /// Entries are kept exactly as configured.
    pub fn new(hosts: HashSet<String>) -> Self {
        Self { hosts }
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Exact, case-sensitive match on the target hostname; subdomains are
    /// not covered. Target hostnames arrive lowercased from URL parsing, so
    /// an entry with uppercase letters never matches.
    pub fn check(&self, target: &ForwardTarget) -> Result<(), ProxyError> {
        if self.hosts.contains(&target.hostname) {
            return Err(ProxyError::ForbiddenHost {
                host: target.hostname.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ForbiddenHosts {
        ForbiddenHosts::new(["google.com".to_string()].into_iter().collect())
    }

    #[test]
    fn listed_host_is_rejected() {
        let target = ForwardTarget::resolve("/https://google.com/").unwrap();
        assert!(matches!(
            policy().check(&target),
            Err(ProxyError::ForbiddenHost { host }) if host == "google.com"
        ));
    }

    #[test]
    fn request_host_casing_does_not_bypass() {
        let target = ForwardTarget::resolve("/http://GOOGLE.com/").unwrap();
        assert!(policy().check(&target).is_err());
    }

    #[test]
    fn entries_match_case_sensitively() {
        let policy = ForbiddenHosts::new(["Google.COM".to_string()].into_iter().collect());
        let target = ForwardTarget::resolve("/http://google.com/").unwrap();
        assert!(policy.check(&target).is_ok());
    }

    #[test]
    fn other_hosts_pass() {
        for url in ["/http://127.0.0.1:7000/", "/https://www.google.com/", "/https://google.co/"] {
            let target = ForwardTarget::resolve(url).unwrap();
            assert!(policy().check(&target).is_ok(), "{url} should pass");
        }
    }
}
