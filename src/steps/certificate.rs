//! TLS certificate issuance

use super::tool;
use anyhow::Result;
use chrono::{Duration, Utc};
use declarative::{CheckResult, Criticality, Precondition, Step, StepContext};
use hostkit::Host;
use std::net::IpAddr;
use std::path::PathBuf;

/// Reason reported while the domain does not point at this host
pub const DNS_NOT_READY: &str = "DNS not ready";

/// Issue (or renew) a certificate for `domain` through ACME HTTP-01
///
/// Best effort: a fresh host often has no DNS record yet, and the rest of
/// the plan is still worth applying.
#[derive(Debug, Clone)]
pub struct CertificateIssue {
    pub domain: String,
    pub alt_names: Vec<String>,
    pub email: String,
    pub renew_before_days: i64,
    /// Address the domain must resolve to; the host's own when unset
    pub expected_ip: Option<IpAddr>,
    /// Logical webroot served for the ACME challenge
    pub webroot: PathBuf,
}

impl CertificateIssue {
    fn dns_ready(&self, host: &Host) -> std::result::Result<(), String> {
        let resolved = host
            .resolver
            .resolve(&self.domain)
            .map_err(|e| e.to_string())?;
        if resolved.is_empty() {
            return Err(format!("{} does not resolve", self.domain));
        }

        let expected = match self.expected_ip {
            Some(ip) => vec![ip],
            None => host.resolver.local_addresses().unwrap_or_default(),
        };
        if expected.is_empty() {
            log::debug!(
                "No local addresses known, accepting any resolution of {}",
                self.domain
            );
            return Ok(());
        }
        if resolved.iter().any(|ip| expected.contains(ip)) {
            Ok(())
        } else {
            let resolved: Vec<String> = resolved.iter().map(ToString::to_string).collect();
            Err(format!(
                "{} resolves to {}, not to this host",
                self.domain,
                resolved.join(", ")
            ))
        }
    }
}

impl Step<Host> for CertificateIssue {
    fn id(&self) -> String {
        format!("cert:{}", self.domain)
    }

    fn description(&self) -> String {
        let mut names = vec![self.domain.as_str()];
        names.extend(self.alt_names.iter().map(String::as_str));
        format!("Issue TLS certificate for {}", names.join(", "))
    }

    fn kind(&self) -> &'static str {
        "certificate"
    }

    fn criticality(&self) -> Criticality {
        Criticality::BestEffort
    }

    fn rollback_hint(&self) -> Option<String> {
        Some(format!("certbot delete --cert-name {}", self.domain))
    }

    fn precondition(&self, ctx: &StepContext<'_, Host>) -> Precondition {
        match self.dns_ready(ctx.host) {
            Ok(()) => Precondition::Met,
            Err(detail) => {
                log::warn!("Skipping certificate: {detail}");
                Precondition::unmet(DNS_NOT_READY)
            }
        }
    }

    fn check(&self, ctx: &StepContext<'_, Host>) -> CheckResult {
        match ctx.host.certs.expiry(&self.domain) {
            Ok(Some(expiry)) => {
                let renew_at = expiry - Duration::days(self.renew_before_days);
                CheckResult::from_bool(
                    Utc::now() < renew_at,
                    format!("expires {}", expiry.format("%Y-%m-%d")),
                )
            }
            Ok(None) => CheckResult::not_satisfied("no certificate"),
            Err(e) => CheckResult::unknown(e.to_string()),
        }
    }

    fn apply(&self, ctx: &StepContext<'_, Host>) -> Result<()> {
        // The challenge is answered by the proxy site's ACME location
        ctx.host.proxy.test_config().map_err(tool("nginx"))?;
        ctx.host.proxy.reload().map_err(tool("nginx"))?;

        ctx.host
            .certs
            .issue(&self.domain, &self.alt_names, &self.email, &self.webroot)
            .map_err(tool("certbot"))?;
        Ok(())
    }
}
