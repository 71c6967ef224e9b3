//! # hostkit
//!
//! Capability interfaces over the tools that shape a Linux host.
//!
//! Each external system is reached through one small trait with a CLI
//! backend:
//!
//! | Trait | Backend | Tool |
//! |-------|---------|------|
//! | [`PackageManager`] | [`Apt`] | `dpkg-query`, `apt-get` |
//! | [`ServiceManager`] | [`Systemd`] | `systemctl` |
//! | [`ProxyServer`] | [`Nginx`] | `nginx -t`, `systemctl reload-or-restart` |
//! | [`PythonEnv`] | [`Venv`] | `python3 -m venv`, `pip` |
//! | [`CertificateTool`] | [`Certbot`] | `certbot certonly --webroot`, `openssl` |
//! | [`Firewall`] | [`Ufw`] | `ufw` |
//! | [`Scheduler`] | [`Crontab`] | `crontab` |
//! | [`Resolver`] | [`SystemResolver`] | libc resolver, `hostname -I` |
//! | [`Accounts`] | [`SystemAccounts`] | `getpwnam`, `getgrnam` |
//!
//! [`Host`] bundles one of each. [`MockHost`] implements all of them in
//! memory for tests.
//!
//! ## Example
//!
//! ```no_run
//! use hostkit::Host;
//!
//! let host = Host::system();
//! if !host.packages.is_installed("nginx").unwrap_or(false) {
//!     host.packages.install(&["nginx".to_string()]).expect("apt failed");
//! }
//! let status = host.services.status("nginx").expect("systemctl failed");
//! println!("nginx: {}", status.active_state);
//! ```

#![warn(clippy::all)]

pub mod accounts;
pub mod certs;
pub mod command;
pub mod error;
pub mod firewall;
pub mod mock;
pub mod packages;
pub mod python;
pub mod resolver;
pub mod scheduler;
pub mod services;
pub mod types;

pub use accounts::{Accounts, SystemAccounts};
pub use certs::{CertificateTool, Certbot};
pub use error::{Error, ErrorCategory, Result};
pub use firewall::{Firewall, Ufw};
pub use mock::MockHost;
pub use packages::{Apt, PackageManager};
pub use python::{PythonEnv, Venv};
pub use resolver::{Resolver, SystemResolver};
pub use scheduler::{Crontab, Scheduler};
pub use services::{Nginx, ProxyServer, ServiceManager, Systemd};
pub use types::{ActiveState, FirewallStatus, PortRule, Proto, ServiceStatus};

/// One backend per capability.
///
/// Fields are public so steps can reach exactly the tool they need
/// (`ctx.host.packages.install(..)`).
pub struct Host {
    pub packages: Box<dyn PackageManager>,
    pub services: Box<dyn ServiceManager>,
    pub proxy: Box<dyn ProxyServer>,
    pub python: Box<dyn PythonEnv>,
    pub certs: Box<dyn CertificateTool>,
    pub firewall: Box<dyn Firewall>,
    pub scheduler: Box<dyn Scheduler>,
    pub resolver: Box<dyn Resolver>,
    pub accounts: Box<dyn Accounts>,
}

impl Host {
    /// Real tools on this machine.
    ///
    /// Nothing is probed here; a missing tool surfaces as
    /// [`Error::ToolMissing`] on first use.
    pub fn system() -> Self {
        Self {
            packages: Box::new(Apt),
            services: Box::new(Systemd),
            proxy: Box::new(Nginx::default()),
            python: Box::new(Venv),
            certs: Box::new(Certbot::default()),
            firewall: Box::new(Ufw),
            scheduler: Box::new(Crontab),
            resolver: Box::new(SystemResolver),
            accounts: Box::new(SystemAccounts),
        }
    }

    /// Every capability backed by the same mock.
    pub fn from_mock(mock: &MockHost) -> Self {
        Self {
            packages: Box::new(mock.clone()),
            services: Box::new(mock.clone()),
            proxy: Box::new(mock.clone()),
            python: Box::new(mock.clone()),
            certs: Box::new(mock.clone()),
            firewall: Box::new(mock.clone()),
            scheduler: Box::new(mock.clone()),
            resolver: Box::new(mock.clone()),
            accounts: Box::new(mock.clone()),
        }
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host").finish_non_exhaustive()
    }
}
