//! Proxy configuration rendering.
//!
//! The nginx config is rendered from structured data rather than patched
//! in place with string substitution. The previous rendering is kept as a
//! `.bak` copy so a failed provisioning run can be rolled back by hand.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::core::settings::Settings;
use crate::error::Result;

/// Inputs for one rendering of the proxy config.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub domain: String,
    pub cert_path: String,
    pub key_path: String,
    /// Serve only the ACME http-01 challenge (no TLS yet)
    pub challenge_only: bool,
    pub api_port: u16,
    pub frontend_port: u16,
}

impl ProxyConfig {
    pub fn new(domain: impl Into<String>, cert_path: impl Into<String>, key_path: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            cert_path: cert_path.into(),
            key_path: key_path.into(),
            challenge_only: false,
            api_port: 3000,
            frontend_port: 8080,
        }
    }
}

/// Render the nginx server blocks for `cfg`.
pub fn render(cfg: &ProxyConfig) -> String {
    if cfg.challenge_only {
        return format!(
            "server {{\n    listen 80;\n    server_name {domain};\n\n    location /.well-known/acme-challenge/ {{\n        root /var/www/certbot;\n    }}\n\n    location / {{\n        return 404;\n    }}\n}}\n",
            domain = cfg.domain
        );
    }

    format!(
        "server {{\n    listen 80;\n    server_name {domain};\n\n    location /.well-known/acme-challenge/ {{\n        root /var/www/certbot;\n    }}\n\n    location / {{\n        return 301 https://$host$request_uri;\n    }}\n}}\n\nserver {{\n    listen 443 ssl;\n    server_name {domain};\n\n    ssl_certificate {cert};\n    ssl_certificate_key {key};\n\n    location /api/ {{\n        proxy_pass http://app:{api_port}/;\n        proxy_set_header Host $host;\n        proxy_set_header X-Forwarded-Proto https;\n    }}\n\n    location /socket/ {{\n        proxy_pass http://app:{api_port}/socket/;\n        proxy_http_version 1.1;\n        proxy_set_header Upgrade $http_upgrade;\n        proxy_set_header Connection \"upgrade\";\n    }}\n\n    location / {{\n        proxy_pass http://frontend:{frontend_port}/;\n        proxy_set_header Host $host;\n    }}\n}}\n",
        domain = cfg.domain,
        cert = cfg.cert_path,
        key = cfg.key_path,
        api_port = cfg.api_port,
        frontend_port = cfg.frontend_port,
    )
}

/// Write a rendered config, keeping the previous one as `nginx.conf.bak`.
///
/// The new contents go through a temp file and rename so the proxy never
/// observes a half-written config.
pub fn write(settings: &Settings, contents: &str) -> Result<()> {
    let conf = settings.nginx_conf();
    fs::create_dir_all(&settings.nginx_dir)?;

    if conf.exists() {
        let backup = backup_path(&conf);
        fs::copy(&conf, &backup)?;
        debug!(backup = %backup.display(), "kept previous proxy config");
    }

    let tmp = conf.with_extension("conf.tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, &conf)?;
    Ok(())
}

fn backup_path(conf: &Path) -> std::path::PathBuf {
    conf.with_extension("conf.bak")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn full_config_references_cert_and_domain() {
        let cfg = ProxyConfig::new(
            "app.example.com",
            "/etc/letsencrypt/live/app.example.com/fullchain.pem",
            "/etc/letsencrypt/live/app.example.com/privkey.pem",
        );
        let rendered = render(&cfg);
        assert!(rendered.contains("server_name app.example.com;"));
        assert!(rendered.contains("ssl_certificate /etc/letsencrypt/live/app.example.com/fullchain.pem;"));
        assert!(rendered.contains("listen 443 ssl;"));
        assert!(rendered.contains("return 301 https://$host$request_uri;"));
    }

    #[test]
    fn challenge_config_has_no_tls_block() {
        let mut cfg = ProxyConfig::new("app.example.com", "unused", "unused");
        cfg.challenge_only = true;
        let rendered = render(&cfg);
        assert!(rendered.contains("acme-challenge"));
        assert!(!rendered.contains("443"));
        assert!(!rendered.contains("ssl_certificate"));
    }

    #[test]
    fn write_keeps_a_backup_of_the_previous_config() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::from_root(tmp.path());

        write(&settings, "first\n").unwrap();
        write(&settings, "second\n").unwrap();

        let conf = std::fs::read_to_string(settings.nginx_conf()).unwrap();
        let bak = std::fs::read_to_string(settings.nginx_dir.join("nginx.conf.bak")).unwrap();
        assert_eq!(conf, "second\n");
        assert_eq!(bak, "first\n");
    }
}
