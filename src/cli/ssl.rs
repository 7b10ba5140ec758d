//! TLS provisioning command.

use crate::cli::{context, output};
use crate::core::compose::ComposeRunner;
use crate::core::domain::DeploymentTarget;
use crate::core::lock::CommandLock;
use crate::core::tls::{CertificateProvenance, TlsProvisioner};
use crate::error::Result;

/// Provision or renew the certificate for the configured domain.
pub fn execute(renew: bool, email: Option<&str>) -> Result<()> {
    let (settings, mut env) = context()?;
    let _lock = CommandLock::acquire(&settings)?;
    let runner = ComposeRunner::new(&settings.project_root)?;
    let provisioner = TlsProvisioner::new(&settings, &runner);

    let domain = env.get_or("DOMAIN", "localhost");
    let target = DeploymentTarget::from_domain(&domain);

    output::section("TLS");
    output::kv("domain", target.display_name());

    if renew {
        output::progress("Renewing certificate");
        provisioner.renew(&env)?;
        output::progress_done(true);
        output::success("certificate renewed");
        return Ok(());
    }

    if let DeploymentTarget::PublicDomain(domain) = &target {
        output::hint(&format!(
            "issuance requires {} to resolve to this host with ports 80/443 reachable",
            domain
        ));
    }

    output::progress("Provisioning certificate");
    let bundle = provisioner.provision(&mut env, &target, email)?;
    output::progress_done(true);

    match &bundle.provenance {
        CertificateProvenance::SelfSigned => {
            output::success("self-signed certificate installed");
            output::kv("certificate", output::path(&bundle.cert_path.display().to_string()));
            output::hint("browsers will warn about the self-signed certificate");
        }
        CertificateProvenance::AcmeIssued { domain, .. } => {
            output::success(&format!("certificate issued for {}", domain));
            output::kv("certificate", output::path(&bundle.cert_path.display().to_string()));
        }
    }
    Ok(())
}
