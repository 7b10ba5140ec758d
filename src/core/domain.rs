//! Deployment target classification.
//!
//! Derived from the configured domain on every invocation; never cached
//! across process lifetimes.

/// Where this deployment is reachable.
///
/// Drives certificate strategy: loopback deployments get a self-signed
/// certificate, public domains go through ACME issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentTarget {
    /// Reachable only via localhost-equivalent addresses
    Loopback,
    /// Reachable via a real DNS name
    PublicDomain(String),
}

const LOOPBACK_DOMAINS: &[&str] = &["localhost", "127.0.0.1", "0.0.0.0"];

impl DeploymentTarget {
    /// Classify a configured domain value.
    pub fn from_domain(domain: &str) -> Self {
        let domain = domain.trim();
        if LOOPBACK_DOMAINS.contains(&domain) {
            Self::Loopback
        } else {
            Self::PublicDomain(domain.to_string())
        }
    }

    /// Display name for user-facing messages.
    pub fn display_name(&self) -> &str {
        match self {
            Self::Loopback => "loopback (self-signed certificate)",
            Self::PublicDomain(_) => "public domain (ACME certificate)",
        }
    }
}

/// External HTTPS base URL for a domain.
pub fn https_url(domain: &str) -> String {
    format!("https://{}", domain)
}

/// External secure websocket base URL for a domain.
pub fn wss_url(domain: &str) -> String {
    format!("wss://{}", domain)
}
