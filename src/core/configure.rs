//! Auto-configuration of secrets and external URLs.

use tracing::info;

use crate::core::domain::{https_url, wss_url};
use crate::core::env::EnvFile;
use crate::core::secrets::{generate_secret, is_placeholder};

/// Keys holding generated credentials. A placeholder in any of these is
/// replaced on auto-configuration.
pub const SECRET_KEYS: &[&str] = &[
    "JWT_SECRET",
    "SESSION_SECRET",
    "COOKIE_SECRET",
    "POSTGRES_PASSWORD",
    "REDIS_PASSWORD",
    "MINIO_ROOT_PASSWORD",
];

/// URL scheme for a URL-shaped key.
enum Scheme {
    Https,
    Wss,
}

/// Keys rewritten from the configured domain. These are always rewritten
/// together; a partial update would leave the deployment pointing at a mix
/// of hosts.
const URL_KEYS: &[(&str, Scheme, &str)] = &[
    ("API_URL", Scheme::Https, ""),
    ("SOCKET_URL", Scheme::Wss, ""),
    ("FRONTEND_URL", Scheme::Https, ""),
    ("CORS_ORIGINS", Scheme::Https, ""),
    ("OAUTH_CALLBACK_URL", Scheme::Https, "/oauth/callback"),
];

/// What an auto-configuration run changed.
#[derive(Debug, Default)]
pub struct AutoConfigureSummary {
    /// Secret keys that received a freshly generated value
    pub generated: Vec<String>,
    /// URL keys rewritten for the domain
    pub urls: Vec<String>,
}

/// Replace placeholder secrets and point all URL-shaped keys at `domain`.
///
/// Idempotent: once every secret is real, a second run changes nothing
/// (URL values are recomputed but identical, and `EnvFile::set` treats an
/// unchanged value as a no-op).
pub fn auto_configure(env: &mut EnvFile, domain: &str) -> AutoConfigureSummary {
    let mut summary = AutoConfigureSummary::default();

    env.set("DOMAIN", domain);

    for key in SECRET_KEYS {
        let current = env.get_or(key, "");
        if is_placeholder(&current) {
            info!(key, "generating secret");
            env.set(key, &generate_secret(32));
            summary.generated.push((*key).to_string());
        }
    }

    // Compute every URL first, then apply the whole set
    let urls: Vec<(&str, String)> = URL_KEYS
        .iter()
        .map(|(key, scheme, suffix)| {
            let base = match scheme {
                Scheme::Https => https_url(domain),
                Scheme::Wss => wss_url(domain),
            };
            (*key, format!("{}{}", base, suffix))
        })
        .collect();

    for (key, value) in urls {
        env.set(key, &value);
        summary.urls.push(key.to_string());
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_env() -> EnvFile {
        EnvFile::parse(
            "/tmp/.env",
            "DOMAIN=localhost\nJWT_SECRET=CHANGE_THIS_JWT\nSESSION_SECRET=\nCOOKIE_SECRET=CHANGE_THIS\nPOSTGRES_PASSWORD=already_set_by_operator_1234\nREDIS_PASSWORD=redis_password\nMINIO_ROOT_PASSWORD=minioadmin\nAPI_URL=https://old.example.com\n",
        )
    }

    #[test]
    fn placeholders_are_replaced_and_real_values_kept() {
        let mut env = sample_env();
        let summary = auto_configure(&mut env, "app.example.com");

        assert!(summary.generated.contains(&"JWT_SECRET".to_string()));
        assert!(summary.generated.contains(&"REDIS_PASSWORD".to_string()));
        assert!(!summary.generated.contains(&"POSTGRES_PASSWORD".to_string()));
        assert_eq!(
            env.get("POSTGRES_PASSWORD"),
            Some("already_set_by_operator_1234")
        );
        assert_eq!(env.get("JWT_SECRET").unwrap().len(), 64);
    }

    #[test]
    fn all_url_keys_are_rewritten_together() {
        let mut env = sample_env();
        auto_configure(&mut env, "app.example.com");

        assert_eq!(env.get("API_URL"), Some("https://app.example.com"));
        assert_eq!(env.get("SOCKET_URL"), Some("wss://app.example.com"));
        assert_eq!(env.get("FRONTEND_URL"), Some("https://app.example.com"));
        assert_eq!(env.get("CORS_ORIGINS"), Some("https://app.example.com"));
        assert_eq!(
            env.get("OAUTH_CALLBACK_URL"),
            Some("https://app.example.com/oauth/callback")
        );
    }

    #[test]
    fn second_run_changes_nothing() {
        let mut env = sample_env();
        auto_configure(&mut env, "app.example.com");
        let first = env.render();

        let summary = auto_configure(&mut env, "app.example.com");
        assert!(summary.generated.is_empty());
        assert_eq!(env.render(), first);
    }

    #[test]
    fn loopback_domain_configures_local_urls() {
        let mut env = sample_env();
        auto_configure(&mut env, "localhost");
        assert_eq!(env.get("API_URL"), Some("https://localhost"));
        assert_eq!(env.get("SOCKET_URL"), Some("wss://localhost"));
    }
}
