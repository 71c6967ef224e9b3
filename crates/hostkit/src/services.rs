//! Service manager and reverse proxy capabilities (systemd and nginx backends).

use crate::command::Cmd;
use crate::error::Result;
use crate::types::{ActiveState, ServiceStatus};

/// Control long-running services.
pub trait ServiceManager: Send + Sync {
    /// Enablement and runtime state of `name`.
    fn status(&self, name: &str) -> Result<ServiceStatus>;

    /// Re-read unit files from disk.
    fn daemon_reload(&self) -> Result<()>;

    fn enable(&self, name: &str) -> Result<()>;

    fn start(&self, name: &str) -> Result<()>;

    fn restart(&self, name: &str) -> Result<()>;
}

/// Validate and reload the reverse proxy.
pub trait ProxyServer: Send + Sync {
    /// Unit name of the proxy daemon.
    fn unit(&self) -> &str;

    /// Syntax-check the proxy configuration.
    fn test_config(&self) -> Result<()>;

    /// Reload the configuration, starting the daemon if it is not running.
    fn reload(&self) -> Result<()>;
}

/// `systemctl` backend.
#[derive(Debug, Default)]
pub struct Systemd;

/// Interpret `systemctl is-enabled` output
///
/// `static` and `alias` units cannot be disabled, so they count as enabled.
pub fn parse_enabled(output: &str) -> bool {
    matches!(
        output.trim(),
        "enabled" | "enabled-runtime" | "static" | "alias" | "indirect" | "generated"
    )
}

impl ServiceManager for Systemd {
    fn status(&self, name: &str) -> Result<ServiceStatus> {
        // Both commands exit non-zero for disabled/inactive units, so read stdout
        let enabled = Cmd::new("systemctl").args(["is-enabled", name]).output()?;
        let active = Cmd::new("systemctl").args(["is-active", name]).output()?;
        Ok(ServiceStatus {
            enabled: parse_enabled(&enabled.stdout),
            active_state: ActiveState::parse(&active.stdout),
        })
    }

    fn daemon_reload(&self) -> Result<()> {
        Cmd::new("systemctl").arg("daemon-reload").run()?;
        Ok(())
    }

    fn enable(&self, name: &str) -> Result<()> {
        Cmd::new("systemctl").args(["enable", name]).run()?;
        Ok(())
    }

    fn start(&self, name: &str) -> Result<()> {
        Cmd::new("systemctl").args(["start", name]).run()?;
        Ok(())
    }

    fn restart(&self, name: &str) -> Result<()> {
        Cmd::new("systemctl").args(["restart", name]).run()?;
        Ok(())
    }
}

/// nginx backend, reloaded through systemd.
#[derive(Debug)]
pub struct Nginx {
    unit: String,
}

impl Default for Nginx {
    fn default() -> Self {
        Self {
            unit: "nginx".to_string(),
        }
    }
}

impl ProxyServer for Nginx {
    fn unit(&self) -> &str {
        &self.unit
    }

    fn test_config(&self) -> Result<()> {
        Cmd::new("nginx").arg("-t").run()?;
        Ok(())
    }

    fn reload(&self) -> Result<()> {
        Cmd::new("systemctl")
            .args(["reload-or-restart", &self.unit])
            .run()?;
        Ok(())
    }
}
