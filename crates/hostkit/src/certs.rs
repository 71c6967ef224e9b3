//! TLS certificate capability (certbot/openssl backend).

use crate::command::Cmd;
use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::path::{Path, PathBuf};

/// Inspect and issue TLS certificates.
pub trait CertificateTool: Send + Sync {
    /// Expiry of the certificate currently installed for `domain`, if any.
    fn expiry(&self, domain: &str) -> Result<Option<DateTime<Utc>>>;

    /// Obtain a certificate for `domain` and `alt_names`, answering the
    /// HTTP challenge from `webroot`.
    fn issue(&self, domain: &str, alt_names: &[String], email: &str, webroot: &Path)
    -> Result<()>;
}

/// Let's Encrypt through `certbot certonly --webroot`.
///
/// Certbot never edits proxy configuration in this mode; the proxy's TLS
/// block is rendered separately once material exists.
#[derive(Debug)]
pub struct Certbot {
    live_dir: PathBuf,
}

impl Default for Certbot {
    fn default() -> Self {
        Self {
            live_dir: PathBuf::from("/etc/letsencrypt/live"),
        }
    }
}

impl Certbot {
    /// Path of the full chain certbot writes for `domain`
    pub fn fullchain(&self, domain: &str) -> PathBuf {
        self.live_dir.join(domain).join("fullchain.pem")
    }
}

/// Parse `openssl x509 -enddate -noout` output (`notAfter=Jan  1 00:00:00 2027 GMT`).
pub fn parse_enddate(output: &str) -> Result<DateTime<Utc>> {
    let raw = output
        .trim()
        .strip_prefix("notAfter=")
        .ok_or_else(|| Error::parse("certificate end date", output.trim()))?;
    // openssl pads single-digit days with an extra space
    let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let naive = NaiveDateTime::parse_from_str(&normalized, "%b %d %H:%M:%S %Y GMT")
        .map_err(|e| Error::parse("certificate end date", format!("{normalized}: {e}")))?;
    Ok(naive.and_utc())
}

impl CertificateTool for Certbot {
    fn expiry(&self, domain: &str) -> Result<Option<DateTime<Utc>>> {
        let chain = self.fullchain(domain);
        if !chain.exists() {
            return Ok(None);
        }
        let out = Cmd::new("openssl")
            .args(["x509", "-enddate", "-noout", "-in"])
            .arg(&chain)
            .run()?;
        parse_enddate(&out).map(Some)
    }

    fn issue(
        &self,
        domain: &str,
        alt_names: &[String],
        email: &str,
        webroot: &Path,
    ) -> Result<()> {
        let mut cmd = Cmd::new("certbot")
            .args(["certonly", "--webroot", "-w"])
            .arg(webroot)
            .args(["--non-interactive", "--agree-tos", "--keep-until-expiring", "-m"])
            .arg(email)
            .args(["-d", domain]);
        for name in alt_names {
            cmd = cmd.args(["-d", name.as_str()]);
        }
        cmd.run()?;
        Ok(())
    }
}
