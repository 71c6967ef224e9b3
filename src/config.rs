//! Desired-state configuration
//!
//! [`DesiredState`] mirrors the TOML file one to one. Required fields are
//! `Option`s so that a missing one is reported by validation together with
//! every other problem, instead of stopping at the first serde error.
//! [`Deployment`] is what validation produces: every default resolved and
//! every value known to be safe to render.

use crate::paths;
use crate::secret::SecretSource;
use anyhow::{Context, Result};
use hostkit::PortRule;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// File format
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DesiredState {
    /// Public hostname the application is served under
    pub domain: Option<String>,
    /// Absolute application directory
    pub app_dir: Option<String>,
    /// `3`, `3.N` or `3.N.M`; selects the interpreter the venv is built with
    #[serde(default = "default_python_version")]
    pub python_version: String,
    /// Where the API key is read from at render time
    pub api_key: Option<SecretSource>,
    /// Variable name the service sees the key under
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Port the application listens on behind the proxy
    pub port: Option<i64>,
    #[serde(default = "default_packages")]
    pub packages: Vec<String>,
    #[serde(default = "default_python_packages")]
    pub python_packages: Vec<String>,
    #[serde(default = "default_retention_days")]
    pub backup_retention_days: i64,
    #[serde(default = "default_backup_schedule")]
    pub backup_schedule: String,
    #[serde(default = "default_firewall_ports")]
    pub firewall_ports: Vec<String>,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub tls: TlsConfig,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub app: AppConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Unit name; defaults to the first label of the domain
    pub name: Option<String>,
    #[serde(default = "default_service_account")]
    pub user: String,
    #[serde(default = "default_service_account")]
    pub group: String,
    /// ASGI application served by uvicorn
    #[serde(default = "default_entrypoint")]
    pub entrypoint: String,
    /// How long to wait for the service to become active after start
    #[serde(default = "default_start_timeout")]
    pub start_timeout_secs: u64,
    /// Extra environment for the unit
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// ACME contact address
    pub email: Option<String>,
    /// Defaults to `www.<domain>`
    pub alt_names: Option<Vec<String>>,
    #[serde(default = "default_renew_before_days")]
    pub renew_before_days: i64,
    /// Address the domain must resolve to before issuing; defaults to the
    /// host's own addresses
    pub expected_ip: Option<IpAddr>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackupConfig {
    /// Defaults to `/var/backups/<service>`
    pub root: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Git remote the update script pulls from
    pub repository: Option<String>,
    /// Writable sub-directories of the app dir
    #[serde(default = "default_data_dirs")]
    pub data_dirs: Vec<String>,
    /// Hosts the application accepts (`ALLOWED_DOMAINS`); defaults to the
    /// domain and its alt names
    pub allowed_origins: Option<Vec<String>>,
}

fn default_python_version() -> String {
    "3".to_string()
}

fn default_api_key_env() -> String {
    "YOUTUBE_API_KEY".to_string()
}

fn default_packages() -> Vec<String> {
    [
        "python3-venv",
        "python3-pip",
        "nginx",
        "certbot",
        "ffmpeg",
        "ufw",
        "git",
    ]
    .map(String::from)
    .to_vec()
}

fn default_python_packages() -> Vec<String> {
    [
        "fastapi",
        "uvicorn[standard]",
        "yt-dlp",
        "requests",
        "google-api-python-client",
    ]
    .map(String::from)
    .to_vec()
}

fn default_retention_days() -> i64 {
    7
}

fn default_backup_schedule() -> String {
    "0 3 * * *".to_string()
}

fn default_firewall_ports() -> Vec<String> {
    ["22/tcp", "80/tcp", "443/tcp"].map(String::from).to_vec()
}

fn default_service_account() -> String {
    "www-data".to_string()
}

fn default_entrypoint() -> String {
    "main:app".to_string()
}

fn default_start_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_renew_before_days() -> i64 {
    30
}

fn default_data_dirs() -> Vec<String> {
    ["downloads", "cache"].map(String::from).to_vec()
}

impl Default for DesiredState {
    fn default() -> Self {
        Self {
            domain: None,
            app_dir: None,
            python_version: default_python_version(),
            api_key: None,
            api_key_env: default_api_key_env(),
            port: None,
            packages: default_packages(),
            python_packages: default_python_packages(),
            backup_retention_days: default_retention_days(),
            backup_schedule: default_backup_schedule(),
            firewall_ports: default_firewall_ports(),
            service: ServiceConfig::default(),
            tls: TlsConfig::default(),
            backup: BackupConfig::default(),
            app: AppConfig::default(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: None,
            user: default_service_account(),
            group: default_service_account(),
            entrypoint: default_entrypoint(),
            start_timeout_secs: default_start_timeout(),
            environment: BTreeMap::new(),
        }
    }
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            email: None,
            alt_names: None,
            renew_before_days: default_renew_before_days(),
            expected_ip: None,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            repository: None,
            data_dirs: default_data_dirs(),
            allowed_origins: None,
        }
    }
}

impl DesiredState {
    /// Load a configuration file (`~` and `$VARS` in the path are expanded)
    pub fn load(path: &str) -> Result<Self> {
        let path = paths::expand(path);
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

// ============================================================================
// Validated state
// ============================================================================

/// TLS settings of a validated deployment
#[derive(Debug, Clone, PartialEq)]
pub struct Tls {
    pub email: String,
    pub alt_names: Vec<String>,
    pub renew_before_days: i64,
    pub expected_ip: Option<IpAddr>,
}

/// A [`DesiredState`] that passed validation, with every default resolved
///
/// Only [`crate::validation::validate`] builds one, so holding a
/// `Deployment` means every string in it is safe to render.
#[derive(Debug, Clone, PartialEq)]
pub struct Deployment {
    pub domain: String,
    pub app_dir: PathBuf,
    pub python_version: String,
    pub api_key: SecretSource,
    pub api_key_env: String,
    pub port: u16,
    pub packages: Vec<String>,
    pub python_packages: Vec<String>,
    pub backup_retention_days: u32,
    pub backup_schedule: String,
    pub firewall_ports: Vec<PortRule>,
    pub service: String,
    pub user: String,
    pub group: String,
    pub entrypoint: String,
    pub start_timeout: Duration,
    pub environment: BTreeMap<String, String>,
    pub tls: Option<Tls>,
    pub backup_root: PathBuf,
    pub repository: Option<String>,
    pub data_dirs: Vec<PathBuf>,
    pub allowed_origins: Vec<String>,
}

impl Deployment {
    /// Interpreter used to create the venv (`python3`, `python3.11`)
    pub fn interpreter(&self) -> String {
        let mut parts = self.python_version.split('.');
        match (parts.next(), parts.next()) {
            (Some(major), Some(minor)) => format!("python{major}.{minor}"),
            (Some(major), None) => format!("python{major}"),
            _ => "python3".to_string(),
        }
    }

    pub fn venv_dir(&self) -> PathBuf {
        self.app_dir.join("venv")
    }

    /// Domain followed by alt names (empty alt names without TLS)
    pub fn server_names(&self) -> Vec<String> {
        let mut names = vec![self.domain.clone()];
        if let Some(tls) = &self.tls {
            names.extend(tls.alt_names.iter().cloned());
        }
        names
    }

    pub fn unit_file(&self) -> PathBuf {
        Path::new(paths::SYSTEMD_UNIT_DIR).join(format!("{}.service", self.service))
    }

    pub fn proxy_site(&self) -> PathBuf {
        Path::new(paths::NGINX_SITES_AVAILABLE).join(&self.service)
    }

    pub fn proxy_site_link(&self) -> PathBuf {
        Path::new(paths::NGINX_SITES_ENABLED).join(&self.service)
    }

    pub fn proxy_tls(&self) -> PathBuf {
        Path::new(paths::NGINX_CONF_DIR).join(format!("{}-tls.conf", self.service))
    }

    pub fn backup_script(&self) -> PathBuf {
        Path::new(paths::LOCAL_BIN).join(format!("{}-backup", self.service))
    }

    pub fn update_script(&self) -> PathBuf {
        Path::new(paths::LOCAL_BIN).join(format!("{}-update", self.service))
    }

    /// Directory holding `fullchain.pem` and `privkey.pem`
    pub fn cert_dir(&self) -> PathBuf {
        Path::new(paths::LETSENCRYPT_LIVE).join(&self.domain)
    }

    /// The scheduler line running the backup script
    pub fn backup_job(&self) -> String {
        format!(
            "{} {}",
            self.backup_schedule,
            self.backup_script().display()
        )
    }
}
