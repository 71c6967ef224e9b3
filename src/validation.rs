//! Desired-state validation
//!
//! Every field is checked and every problem is collected, so one run of
//! `hostform` lists everything wrong with a config file at once. A
//! [`Deployment`] only comes out of [`validate`] when nothing was found.

use crate::config::{Deployment, DesiredState, Tls};
use crate::secret::{PLACEHOLDER, SecretSource};
use hostkit::PortRule;
use regex::Regex;
use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

/// Roots an application directory may live under
pub const APP_ROOTS: &[&str] = &["/srv", "/opt", "/var/www", "/home"];

/// Roots a backup directory may live under
pub const BACKUP_ROOTS: &[&str] = &["/var/backups", "/srv", "/opt"];

const CRON_MACROS: &[&str] = &["@daily", "@hourly", "@weekly", "@monthly", "@reboot"];

static LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?$").unwrap());
static PATH_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._/-]+$").unwrap());
static OS_PACKAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9.+_-]*$").unwrap());
static PIP_REQUIREMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._\[\]<>=!~,-]*$").unwrap());
static CRON_FIELD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9*/,-]+$").unwrap());
static PYTHON_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^3(\.[0-9]{1,2}){0,2}$").unwrap());
static ACCOUNT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_-]*$").unwrap());
static ENV_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z_][A-Z0-9_]*$").unwrap());
static ENTRYPOINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*:[A-Za-z_][A-Za-z0-9_]*$").unwrap());
static DATA_DIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9._-]*$").unwrap());
static REPOSITORY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9+.:/@_~-]*$").unwrap());
static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+$").unwrap());

/// One invalid field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub field: String,
    pub message: String,
}

/// Every problem found in a desired state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub problems: Vec<Problem>,
}

#[cfg(test)]
impl ValidationError {
    /// Whether `field` has at least one problem
    pub fn mentions(&self, field: &str) -> bool {
        self.problems.iter().any(|p| p.field == field)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid desired state ({} problems)", self.problems.len())?;
        for problem in &self.problems {
            write!(f, "\n  {}: {}", problem.field, problem.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Default)]
struct Collector {
    problems: Vec<Problem>,
}

impl Collector {
    fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.problems.push(Problem {
            field: field.into(),
            message: message.into(),
        });
    }

    fn require<'a, T>(&mut self, field: &str, value: &'a Option<T>) -> Option<&'a T> {
        if value.is_none() {
            self.push(field, "is required");
        }
        value.as_ref()
    }
}

/// Check a desired state and resolve every default
pub fn validate(state: &DesiredState) -> Result<Deployment, ValidationError> {
    let mut c = Collector::default();

    // DNS names are case-insensitive; certbot files certificates under the
    // lowercase name, so every name is stored lowercase
    let domain = c
        .require("domain", &state.domain)
        .map(|domain| domain.to_ascii_lowercase());
    if let Some(domain) = &domain
        && let Err(msg) = check_hostname(domain)
    {
        c.push("domain", msg);
    }

    let app_dir = c.require("app_dir", &state.app_dir).and_then(|dir| {
        check_path(dir, APP_ROOTS)
            .map_err(|msg| c.push("app_dir", msg))
            .ok()
    });

    let port = c
        .require("port", &state.port)
        .and_then(|&port| match u16::try_from(port) {
            Ok(p) if p >= 1024 => Some(p),
            _ => {
                c.push("port", format!("{port} is outside 1024-65535"));
                None
            }
        });

    if !PYTHON_VERSION.is_match(&state.python_version) {
        c.push(
            "python_version",
            format!("`{}` is not 3, 3.N or 3.N.M", state.python_version),
        );
    }

    for name in &state.packages {
        if !OS_PACKAGE.is_match(name) {
            c.push("packages", format!("`{name}` is not a valid package name"));
        }
    }
    for req in &state.python_packages {
        if !PIP_REQUIREMENT.is_match(req) {
            c.push(
                "python_packages",
                format!("`{req}` is not a valid requirement specifier"),
            );
        }
    }

    let retention = match u32::try_from(state.backup_retention_days) {
        Ok(days @ 1..=3650) => days,
        _ => {
            c.push(
                "backup_retention_days",
                format!("{} is outside 1-3650", state.backup_retention_days),
            );
            0
        }
    };

    if let Err(msg) = check_schedule(&state.backup_schedule) {
        c.push("backup_schedule", msg);
    }

    let mut firewall_ports = Vec::new();
    for spec in &state.firewall_ports {
        match spec.parse::<PortRule>() {
            Ok(rule) => firewall_ports.push(rule),
            Err(e) => c.push("firewall_ports", e.to_string()),
        }
    }
    if !firewall_ports.is_empty() && !firewall_ports.iter().any(|r| r.covers(&PortRule::tcp(22))) {
        log::warn!("firewall_ports does not allow 22/tcp; enabling the firewall may lock out SSH");
    }

    // Service identity
    let service = match (&state.service.name, &domain) {
        (Some(name), _) => name.clone(),
        (None, Some(domain)) => domain
            .split('.')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase(),
        (None, None) => String::new(),
    };
    if !service.is_empty() && !ACCOUNT.is_match(&service) {
        c.push(
            "service.name",
            format!("`{service}` must match [a-z_][a-z0-9_-]*"),
        );
    }
    for (field, value) in [
        ("service.user", &state.service.user),
        ("service.group", &state.service.group),
    ] {
        if !ACCOUNT.is_match(value) {
            c.push(field, format!("`{value}` must match [a-z_][a-z0-9_-]*"));
        }
    }
    if !ENTRYPOINT.is_match(&state.service.entrypoint) {
        c.push(
            "service.entrypoint",
            format!("`{}` is not of the form module:attribute", state.service.entrypoint),
        );
    }
    if state.service.start_timeout_secs == 0 || state.service.start_timeout_secs > 600 {
        c.push("service.start_timeout_secs", "must be between 1 and 600");
    }
    for (key, value) in &state.service.environment {
        if !ENV_NAME.is_match(key) {
            c.push(
                "service.environment",
                format!("`{key}` is not a valid variable name"),
            );
        }
        if value.contains(['\n', '\r', '\0']) {
            c.push(
                "service.environment",
                format!("value of {key} contains a line break"),
            );
        }
    }

    // Secret
    if !ENV_NAME.is_match(&state.api_key_env) {
        c.push(
            "api_key_env",
            format!("`{}` is not a valid variable name", state.api_key_env),
        );
    }
    let api_key = state
        .api_key
        .clone()
        .unwrap_or_else(|| SecretSource::Env(state.api_key_env.clone()));
    match &api_key {
        SecretSource::Env(var) if !ENV_NAME.is_match(var) => {
            c.push("api_key", format!("`{var}` is not a valid variable name"));
        }
        SecretSource::File(path) if !path.is_absolute() => {
            c.push("api_key", format!("{} is not absolute", path.display()));
        }
        SecretSource::Value(v) if v.is_empty() => c.push("api_key", "is empty"),
        SecretSource::Value(v) if v == PLACEHOLDER => {
            c.push("api_key", format!("is still the placeholder {PLACEHOLDER}"));
        }
        SecretSource::Value(v) if v.contains(['\n', '\r', '\0']) => {
            c.push("api_key", "contains a line break");
        }
        _ => {}
    }

    // TLS
    let tls = if state.tls.enabled {
        let email = match &state.tls.email {
            Some(email) if EMAIL.is_match(email) => Some(email.clone()),
            Some(email) => {
                c.push("tls.email", format!("`{email}` is not an email address"));
                None
            }
            None => {
                c.push("tls.email", "is required when TLS is enabled");
                None
            }
        };
        let alt_names = match (&state.tls.alt_names, &domain) {
            (Some(names), _) => names.iter().map(|n| n.to_ascii_lowercase()).collect(),
            (None, Some(domain)) => vec![format!("www.{domain}")],
            (None, None) => Vec::new(),
        };
        for name in &alt_names {
            if let Err(msg) = check_hostname(name) {
                c.push("tls.alt_names", msg);
            }
        }
        if !(1..=89).contains(&state.tls.renew_before_days) {
            c.push("tls.renew_before_days", "must be between 1 and 89");
        }
        email.map(|email| Tls {
            email,
            alt_names,
            renew_before_days: state.tls.renew_before_days,
            expected_ip: state.tls.expected_ip,
        })
    } else {
        None
    };

    let backup_root = match &state.backup.root {
        Some(root) => check_path(root, BACKUP_ROOTS)
            .map_err(|msg| c.push("backup.root", msg))
            .ok(),
        None => Some(Path::new("/var/backups").join(&service)),
    };

    // Application
    if let Some(repo) = &state.app.repository
        && !REPOSITORY.is_match(repo)
    {
        c.push(
            "app.repository",
            format!("`{repo}` contains characters not allowed in a git remote"),
        );
    }
    for name in &state.app.data_dirs {
        if !DATA_DIR.is_match(name) || name == "venv" || name.chars().all(|ch| ch == '.') {
            c.push(
                "app.data_dirs",
                format!("`{name}` is not a plain directory name"),
            );
        }
    }
    let allowed_origins: Vec<String> = match &state.app.allowed_origins {
        Some(origins) => origins.iter().map(|o| o.to_ascii_lowercase()).collect(),
        None => {
            let mut origins: Vec<String> = domain.iter().cloned().collect();
            if let Some(tls) = &tls {
                origins.extend(tls.alt_names.iter().cloned());
            }
            origins
        }
    };
    for origin in &allowed_origins {
        let is_ip = origin.parse::<IpAddr>().is_ok();
        if !is_ip && origin != "localhost" && check_hostname(origin).is_err() {
            c.push(
                "app.allowed_origins",
                format!("`{origin}` is not a hostname or address"),
            );
        }
    }

    if !c.problems.is_empty() {
        return Err(ValidationError {
            problems: c.problems,
        });
    }

    // Every required value was present and valid, or a problem was pushed
    match (domain, app_dir, port, backup_root) {
        (Some(domain), Some(app_dir), Some(port), Some(backup_root)) => {
            let data_dirs = state.app.data_dirs.iter().map(|d| app_dir.join(d)).collect();
            Ok(Deployment {
                domain,
                app_dir,
                python_version: state.python_version.clone(),
                api_key,
                api_key_env: state.api_key_env.clone(),
                port,
                packages: state.packages.clone(),
                python_packages: state.python_packages.clone(),
                backup_retention_days: retention,
                backup_schedule: state.backup_schedule.clone(),
                firewall_ports,
                service,
                user: state.service.user.clone(),
                group: state.service.group.clone(),
                entrypoint: state.service.entrypoint.clone(),
                start_timeout: Duration::from_secs(state.service.start_timeout_secs),
                environment: state.service.environment.clone(),
                tls,
                backup_root,
                repository: state.app.repository.clone(),
                data_dirs,
                allowed_origins,
            })
        }
        _ => Err(ValidationError {
            problems: vec![Problem {
                field: "config".to_string(),
                message: "required values could not be resolved".to_string(),
            }],
        }),
    }
}

/// A DNS hostname with at least two labels
pub fn check_hostname(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("is empty".to_string());
    }
    if name.len() > 253 {
        return Err(format!("`{name}` is longer than 253 characters"));
    }
    let labels: Vec<&str> = name.split('.').collect();
    if labels.len() < 2 {
        return Err(format!("`{name}` needs at least two labels"));
    }
    if let Some(bad) = labels.iter().find(|l| !LABEL.is_match(l)) {
        return Err(format!("`{name}` is not a valid hostname (label `{bad}`)"));
    }
    Ok(())
}

/// An absolute, normalized path strictly below one of `roots`
pub fn check_path(value: &str, roots: &[&str]) -> Result<PathBuf, String> {
    if !PATH_CHARS.is_match(value) {
        return Err(format!(
            "`{value}` may only contain letters, digits, `.`, `_`, `-` and `/`"
        ));
    }
    let path = Path::new(value);
    if !path.is_absolute() {
        return Err(format!("`{value}` is not absolute"));
    }
    if value.split('/').any(|part| part == "." || part == "..") {
        return Err(format!("`{value}` is not normalized"));
    }
    let normalized: PathBuf = path.components().collect();
    let inside = roots.iter().any(|root| {
        let root = Path::new(root);
        normalized.starts_with(root) && normalized != root
    });
    if !inside {
        return Err(format!("`{value}` is not below one of {}", roots.join(", ")));
    }
    Ok(normalized)
}

/// Five cron fields or a supported `@` macro
pub fn check_schedule(expr: &str) -> Result<(), String> {
    if expr.starts_with('@') {
        return if CRON_MACROS.contains(&expr) {
            Ok(())
        } else {
            Err(format!("unsupported macro `{expr}`"))
        };
    }
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(format!("`{expr}` does not have five fields"));
    }
    if let Some(bad) = fields.iter().find(|f| !CRON_FIELD.is_match(f)) {
        return Err(format!("`{bad}` is not a cron field"));
    }
    Ok(())
}
