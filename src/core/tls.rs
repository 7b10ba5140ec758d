//! Certificate provisioner.
//!
//! Two terminal states per run: a locally issued self-signed certificate
//! for loopback deployments, or an ACME-issued certificate for public
//! domains. Certificate material is owned by this module and replaced
//! wholesale; the proxy only ever reads it.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::core::compose::{Mount, Orchestrator};
use crate::core::domain::DeploymentTarget;
use crate::core::env::EnvFile;
use crate::core::proxy::{self, ProxyConfig};
use crate::core::settings::Settings;
use crate::error::{Result, TlsError};

/// Proxy service name.
const PROXY_SERVICE: &str = "nginx";

/// Env flag recording whether the certificate is externally managed.
const EXTERNAL_FLAG: &str = "SSL_EXTERNAL";

/// Where the issuing state came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateProvenance {
    SelfSigned,
    AcmeIssued {
        domain: String,
        issued_at: DateTime<Utc>,
    },
}

/// A provisioned key/certificate pair.
#[derive(Debug, Clone)]
pub struct CertificateBundle {
    pub key_path: PathBuf,
    pub cert_path: PathBuf,
    pub provenance: CertificateProvenance,
}

/// Certificate provisioning state machine.
pub struct TlsProvisioner<'a> {
    settings: &'a Settings,
    orchestrator: &'a dyn Orchestrator,
}

impl<'a> TlsProvisioner<'a> {
    pub fn new(settings: &'a Settings, orchestrator: &'a dyn Orchestrator) -> Self {
        Self {
            settings,
            orchestrator,
        }
    }

    /// Provision a certificate for the deployment target.
    ///
    /// Loopback targets get a self-signed certificate; public domains go
    /// through an ACME `http-01` order.
    pub fn provision(
        &self,
        env: &mut EnvFile,
        target: &DeploymentTarget,
        contact: Option<&str>,
    ) -> Result<CertificateBundle> {
        match target {
            DeploymentTarget::Loopback => self.provision_self_signed(env),
            DeploymentTarget::PublicDomain(domain) => self.provision_acme(env, domain, contact),
        }
    }

    /// Generate a self-signed certificate valid for 365 days, CN=localhost.
    ///
    /// Key file is owner-read/write only; the certificate is world-readable.
    pub fn provision_self_signed(&self, env: &mut EnvFile) -> Result<CertificateBundle> {
        which::which("openssl")
            .map_err(|_| TlsError::OpensslFailed("openssl not found on PATH".to_string()))?;

        fs::create_dir_all(&self.settings.certs_dir)?;
        let key_path = self.settings.certs_dir.join("selfsigned.key");
        let cert_path = self.settings.certs_dir.join("selfsigned.crt");

        info!("generating self-signed certificate (CN=localhost, 365 days)");
        let output = Command::new("openssl")
            .args([
                "req",
                "-x509",
                "-newkey",
                "rsa:2048",
                "-nodes",
                "-days",
                "365",
                "-subj",
                "/CN=localhost",
                "-keyout",
            ])
            .arg(&key_path)
            .arg("-out")
            .arg(&cert_path)
            .output()
            .map_err(|e| TlsError::OpensslFailed(e.to_string()))?;

        if !output.status.success() {
            return Err(TlsError::OpensslFailed(
                String::from_utf8_lossy(&output.stderr).to_string(),
            )
            .into());
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&key_path, fs::Permissions::from_mode(0o600))?;
            fs::set_permissions(&cert_path, fs::Permissions::from_mode(0o644))?;
        }

        env.set(EXTERNAL_FLAG, "false");
        env.save()?;

        let cfg = ProxyConfig::new(
            env.get_or("DOMAIN", "localhost"),
            "/etc/nginx/certs/selfsigned.crt",
            "/etc/nginx/certs/selfsigned.key",
        );
        proxy::write(self.settings, &proxy::render(&cfg))?;

        Ok(CertificateBundle {
            key_path,
            cert_path,
            provenance: CertificateProvenance::SelfSigned,
        })
    }

    /// Issue a certificate for `domain` via an ACME `http-01` order.
    ///
    /// The proxy is switched into challenge-serving mode for the duration
    /// of the order. On failure the previous proxy configuration is put
    /// back byte-for-byte and [`TlsError::AcmeOrderFailed`] carries the
    /// certbot transcript. DNS and port reachability are the operator's
    /// responsibility; they are not verified here.
    pub fn provision_acme(
        &self,
        env: &mut EnvFile,
        domain: &str,
        contact: Option<&str>,
    ) -> Result<CertificateBundle> {
        let contact = contact
            .map(|c| c.to_string())
            .or_else(|| env.get("ACME_EMAIL").map(|c| c.to_string()))
            .filter(|c| !c.trim().is_empty())
            .ok_or(TlsError::MissingContact)?;

        let conf_path = self.settings.nginx_conf();
        let previous_conf = if conf_path.exists() {
            Some(fs::read(&conf_path)?)
        } else {
            None
        };

        info!(domain, "starting ACME order");
        let mut challenge = ProxyConfig::new(domain, "unused", "unused");
        challenge.challenge_only = true;
        proxy::write(self.settings, &proxy::render(&challenge))?;
        self.orchestrator.start(&[PROXY_SERVICE], &[])?;
        self.orchestrator.restart(PROXY_SERVICE)?;

        let order = self.run_certbot(domain, &contact, false);

        match order {
            Ok(()) => {
                let cfg = ProxyConfig::new(
                    domain,
                    format!("/etc/letsencrypt/live/{}/fullchain.pem", domain),
                    format!("/etc/letsencrypt/live/{}/privkey.pem", domain),
                );
                proxy::write(self.settings, &proxy::render(&cfg))?;
                self.orchestrator.restart(PROXY_SERVICE)?;

                env.set(EXTERNAL_FLAG, "true");
                env.save()?;

                Ok(CertificateBundle {
                    key_path: PathBuf::from(format!(
                        "/etc/letsencrypt/live/{}/privkey.pem",
                        domain
                    )),
                    cert_path: PathBuf::from(format!(
                        "/etc/letsencrypt/live/{}/fullchain.pem",
                        domain
                    )),
                    provenance: CertificateProvenance::AcmeIssued {
                        domain: domain.to_string(),
                        issued_at: Utc::now(),
                    },
                })
            }
            Err(err) => {
                // Put the working configuration back exactly as it was
                match previous_conf {
                    Some(bytes) => fs::write(&conf_path, bytes)?,
                    None => {
                        let _ = fs::remove_file(&conf_path);
                    }
                }
                let _ = self.orchestrator.restart(PROXY_SERVICE);
                warn!(domain, "ACME order failed; proxy configuration restored");
                Err(err)
            }
        }
    }

    /// Re-request issuance for the already-configured domain and restart
    /// only the proxy. No other service is touched.
    pub fn renew(&self, env: &EnvFile) -> Result<()> {
        let domain = env.get_or("DOMAIN", "localhost");
        let contact = env
            .get("ACME_EMAIL")
            .map(|c| c.to_string())
            .filter(|c| !c.trim().is_empty())
            .ok_or(TlsError::MissingContact)?;

        info!(domain = %domain, "renewing certificate");
        self.run_certbot(&domain, &contact, true)?;
        self.orchestrator.restart(PROXY_SERVICE)?;
        Ok(())
    }

    fn run_certbot(&self, domain: &str, contact: &str, renewal: bool) -> Result<()> {
        let mounts = [
            Mount::read_write("letsencrypt", "/etc/letsencrypt"),
            Mount::read_write("certbot_www", "/var/www/certbot"),
        ];
        let mut command = vec![
            "certonly",
            "--webroot",
            "-w",
            "/var/www/certbot",
            "-d",
            domain,
            "--email",
            contact,
            "--agree-tos",
            "--non-interactive",
        ];
        if renewal {
            command.push("--force-renewal");
        }

        let out = self
            .orchestrator
            .run_ephemeral("certbot/certbot", &mounts, &command)?;
        if !out.success {
            return Err(TlsError::AcmeOrderFailed {
                transcript: format!("{}{}", out.stdout, out.stderr),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::compose::testing::MockOrchestrator;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Settings, EnvFile) {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::from_root(tmp.path());
        let env = EnvFile::parse(
            tmp.path().join(".env"),
            "DOMAIN=app.example.com\nACME_EMAIL=ops@example.com\n",
        );
        (tmp, settings, env)
    }

    #[test]
    fn acme_without_contact_fails_before_any_side_effect() {
        let (_tmp, settings, _) = setup();
        let mut env = EnvFile::parse(settings.env_file.clone(), "DOMAIN=app.example.com\n");
        let mock = MockOrchestrator::new();
        let provisioner = TlsProvisioner::new(&settings, &mock);

        let err = provisioner
            .provision_acme(&mut env, "app.example.com", None)
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Tls(TlsError::MissingContact)
        ));
        assert!(mock.calls().is_empty());
        assert!(!settings.nginx_conf().exists());
    }

    #[test]
    fn failed_order_restores_previous_proxy_config_byte_for_byte() {
        let (_tmp, settings, mut env) = setup();
        let previous = "server { listen 443 ssl; # working config }\n";
        std::fs::create_dir_all(&settings.nginx_dir).unwrap();
        std::fs::write(settings.nginx_conf(), previous).unwrap();

        let mock = MockOrchestrator::new();
        mock.script("certbot", false, "", "challenge failed: DNS problem");
        let provisioner = TlsProvisioner::new(&settings, &mock);

        let err = provisioner
            .provision_acme(&mut env, "app.example.com", None)
            .unwrap_err();
        match err {
            crate::error::Error::Tls(TlsError::AcmeOrderFailed { transcript }) => {
                assert!(transcript.contains("DNS problem"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let after = std::fs::read_to_string(settings.nginx_conf()).unwrap();
        assert_eq!(after, previous);
    }

    #[test]
    fn successful_order_rewrites_proxy_config_and_flags_external() {
        let (_tmp, settings, mut env) = setup();
        let mock = MockOrchestrator::new();
        let provisioner = TlsProvisioner::new(&settings, &mock);

        let bundle = provisioner
            .provision_acme(&mut env, "app.example.com", None)
            .unwrap();

        assert!(matches!(
            bundle.provenance,
            CertificateProvenance::AcmeIssued { .. }
        ));
        let conf = std::fs::read_to_string(settings.nginx_conf()).unwrap();
        assert!(conf.contains("/etc/letsencrypt/live/app.example.com/fullchain.pem"));
        assert_eq!(env.get(EXTERNAL_FLAG), Some("true"));
    }

    #[test]
    fn renew_restarts_only_the_proxy() {
        let (_tmp, settings, env) = setup();
        let mock = MockOrchestrator::new();
        let provisioner = TlsProvisioner::new(&settings, &mock);

        provisioner.renew(&env).unwrap();

        let calls = mock.calls();
        assert!(calls.iter().any(|c| c.contains("certbot")));
        assert!(calls.iter().any(|c| c == "restart nginx"));
        assert!(!calls.iter().any(|c| c.starts_with("stop")));
        assert!(!calls.iter().any(|c| c.starts_with("start")));
    }
}
