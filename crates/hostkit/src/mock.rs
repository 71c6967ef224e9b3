//! In-memory host for tests.
//!
//! [`MockHost`] implements every capability trait over shared state, so a
//! single instance can be boxed into a [`Host`](crate::Host) many times and
//! still be inspected afterwards. Failures can be injected per operation
//! and every mutating call is logged.

use crate::accounts::Accounts;
use crate::certs::CertificateTool;
use crate::error::{Error, Result};
use crate::firewall::Firewall;
use crate::packages::PackageManager;
use crate::python::PythonEnv;
use crate::resolver::Resolver;
use crate::scheduler::Scheduler;
use crate::services::{ProxyServer, ServiceManager};
use crate::types::{ActiveState, FirewallStatus, PortRule, ServiceStatus};
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

const PROXY_UNIT: &str = "nginx";

#[derive(Debug, Default)]
struct State {
    installed: BTreeSet<String>,
    services: BTreeMap<String, ServiceStatus>,
    crashing: BTreeSet<String>,
    venv_packages: BTreeMap<String, Vec<String>>,
    certs: BTreeMap<String, DateTime<Utc>>,
    firewall: FirewallStatus,
    crontab: Vec<String>,
    dns: BTreeMap<String, Vec<IpAddr>>,
    local_addrs: Vec<IpAddr>,
    users: BTreeMap<String, u32>,
    groups: BTreeMap<String, u32>,
    failures: BTreeMap<String, String>,
    calls: Vec<String>,
}

/// Shared in-memory host state.
#[derive(Debug, Clone, Default)]
pub struct MockHost {
    state: Arc<Mutex<State>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panicking test thread must not hide state from the others
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a call, then fail it if a failure was injected for `op`.
    fn call(&self, op: &str, detail: impl AsRef<str>) -> Result<()> {
        let mut state = self.state();
        let detail = detail.as_ref();
        state.calls.push(if detail.is_empty() {
            op.to_string()
        } else {
            format!("{op} {detail}")
        });
        match state.failures.get(op) {
            Some(stderr) => Err(Error::CommandFailed {
                command: op.to_string(),
                code: Some(1),
                stderr: stderr.clone(),
            }),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Setup
    // =========================================================================

    /// Mark packages as already installed.
    pub fn with_packages<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state()
            .installed
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Register a user and a group of the same name.
    pub fn with_account(self, name: &str, uid: u32, gid: u32) -> Self {
        {
            let mut state = self.state();
            state.users.insert(name.to_string(), uid);
            state.groups.insert(name.to_string(), gid);
        }
        self
    }

    /// Make `host` resolve to `addrs`.
    pub fn with_dns(self, host: &str, addrs: &[IpAddr]) -> Self {
        self.state().dns.insert(host.to_string(), addrs.to_vec());
        self
    }

    /// Set the addresses configured on this host.
    pub fn with_local_addresses(self, addrs: &[IpAddr]) -> Self {
        self.state().local_addrs = addrs.to_vec();
        self
    }

    /// Install a certificate for `domain` expiring at `expiry`.
    pub fn with_certificate(self, domain: &str, expiry: DateTime<Utc>) -> Self {
        self.state().certs.insert(domain.to_string(), expiry);
        self
    }

    /// Set a service's state.
    pub fn with_service(self, name: &str, status: ServiceStatus) -> Self {
        self.state().services.insert(name.to_string(), status);
        self
    }

    /// Seed the firewall.
    pub fn with_firewall(self, status: FirewallStatus) -> Self {
        self.state().firewall = status;
        self
    }

    /// Seed the scheduled job table.
    pub fn with_crontab<I, S>(self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state().crontab = lines.into_iter().map(Into::into).collect();
        self
    }

    /// Make operation `op` (e.g. `packages.install`) fail with `stderr`.
    pub fn fail_on(self, op: &str, stderr: &str) -> Self {
        self.state()
            .failures
            .insert(op.to_string(), stderr.to_string());
        self
    }

    /// Make `service` land in `failed` state whenever it is started.
    pub fn crash_on_start(self, service: &str) -> Self {
        self.state().crashing.insert(service.to_string());
        self
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Every mutating call so far, as `op detail` strings.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Forget recorded calls (between runs).
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.state().installed.contains(name)
    }

    pub fn service(&self, name: &str) -> ServiceStatus {
        self.state()
            .services
            .get(name)
            .cloned()
            .unwrap_or_else(ServiceStatus::absent)
    }

    pub fn crontab(&self) -> Vec<String> {
        self.state().crontab.clone()
    }

    pub fn firewall(&self) -> FirewallStatus {
        self.state().firewall.clone()
    }

    /// Packages installed into the venv at `path`.
    pub fn venv_packages(&self, path: &Path) -> Vec<String> {
        self.state()
            .venv_packages
            .get(&path.display().to_string())
            .cloned()
            .unwrap_or_default()
    }

    fn set_active(&self, name: &str) {
        let mut state = self.state();
        let crashed = state.crashing.contains(name);
        let entry = state
            .services
            .entry(name.to_string())
            .or_insert_with(ServiceStatus::absent);
        entry.active_state = if crashed {
            ActiveState::Failed
        } else {
            ActiveState::Active
        };
    }
}

impl PackageManager for MockHost {
    fn is_installed(&self, name: &str) -> Result<bool> {
        Ok(self.state().installed.contains(name))
    }

    fn install(&self, names: &[String]) -> Result<()> {
        self.call("packages.install", names.join(" "))?;
        self.state().installed.extend(names.iter().cloned());
        Ok(())
    }
}

impl ServiceManager for MockHost {
    fn status(&self, name: &str) -> Result<ServiceStatus> {
        Ok(self.service(name))
    }

    fn daemon_reload(&self) -> Result<()> {
        self.call("services.daemon_reload", "")
    }

    fn enable(&self, name: &str) -> Result<()> {
        self.call("services.enable", name)?;
        self.state()
            .services
            .entry(name.to_string())
            .or_insert_with(ServiceStatus::absent)
            .enabled = true;
        Ok(())
    }

    fn start(&self, name: &str) -> Result<()> {
        self.call("services.start", name)?;
        self.set_active(name);
        Ok(())
    }

    fn restart(&self, name: &str) -> Result<()> {
        self.call("services.restart", name)?;
        self.set_active(name);
        Ok(())
    }
}

impl ProxyServer for MockHost {
    fn unit(&self) -> &str {
        PROXY_UNIT
    }

    fn test_config(&self) -> Result<()> {
        self.call("proxy.test_config", "")
    }

    fn reload(&self) -> Result<()> {
        self.call("proxy.reload", "")?;
        let mut state = self.state();
        let entry = state
            .services
            .entry(PROXY_UNIT.to_string())
            .or_insert_with(ServiceStatus::absent);
        entry.enabled = true;
        entry.active_state = ActiveState::Active;
        Ok(())
    }
}

impl PythonEnv for MockHost {
    /// Creates the interpreter marker on disk so path-based checks see it.
    fn create(&self, interpreter: &str, path: &Path) -> Result<()> {
        self.call("python.create", format!("{interpreter} {}", path.display()))?;
        let bin = path.join("bin");
        std::fs::create_dir_all(&bin)?;
        std::fs::write(bin.join("python"), b"")?;
        Ok(())
    }

    fn install(&self, path: &Path, packages: &[String]) -> Result<()> {
        self.call("python.install", packages.join(" "))?;
        self.state()
            .venv_packages
            .insert(path.display().to_string(), packages.to_vec());
        Ok(())
    }
}

impl CertificateTool for MockHost {
    fn expiry(&self, domain: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self.state().certs.get(domain).copied())
    }

    fn issue(&self, domain: &str, alt_names: &[String], email: &str, _webroot: &Path) -> Result<()> {
        let mut names = vec![domain.to_string()];
        names.extend(alt_names.iter().cloned());
        self.call("certs.issue", format!("{} {email}", names.join(",")))?;
        self.state()
            .certs
            .insert(domain.to_string(), Utc::now() + Duration::days(90));
        Ok(())
    }
}

impl Firewall for MockHost {
    fn status(&self) -> Result<FirewallStatus> {
        Ok(self.state().firewall.clone())
    }

    fn allow(&self, rule: &PortRule) -> Result<()> {
        self.call("firewall.allow", rule.to_string())?;
        let mut state = self.state();
        if !state.firewall.allowed.contains(rule) {
            state.firewall.allowed.push(*rule);
        }
        Ok(())
    }

    fn enable(&self) -> Result<()> {
        self.call("firewall.enable", "")?;
        self.state().firewall.active = true;
        Ok(())
    }
}

impl Scheduler for MockHost {
    fn entries(&self) -> Result<Vec<String>> {
        Ok(self.state().crontab.clone())
    }

    fn install(&self, entries: &[String]) -> Result<()> {
        self.call("scheduler.install", entries.len().to_string())?;
        self.state().crontab = entries.to_vec();
        Ok(())
    }
}

impl Resolver for MockHost {
    fn resolve(&self, host: &str) -> Result<Vec<IpAddr>> {
        Ok(self.state().dns.get(host).cloned().unwrap_or_default())
    }

    fn local_addresses(&self) -> Result<Vec<IpAddr>> {
        Ok(self.state().local_addrs.clone())
    }
}

impl Accounts for MockHost {
    fn uid(&self, user: &str) -> Result<u32> {
        self.state()
            .users
            .get(user)
            .copied()
            .ok_or_else(|| Error::UnknownAccount {
                kind: "user",
                name: user.to_string(),
            })
    }

    fn gid(&self, group: &str) -> Result<u32> {
        self.state()
            .groups
            .get(group)
            .copied()
            .ok_or_else(|| Error::UnknownAccount {
                kind: "group",
                name: group.to_string(),
            })
    }
}
