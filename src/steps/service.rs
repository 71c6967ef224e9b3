//! Application service enablement with post-start verification

use super::tool;
use anyhow::{Result, bail};
use declarative::{CheckResult, Step, StepContext};
use hostkit::{ActiveState, Host};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Enable and start `name`, then confirm it is actually running
///
/// A zero exit from `systemctl start` only means the job was queued. The
/// unit is polled until it settles as active, reports `failed`, or the
/// timeout runs out.
#[derive(Debug, Clone)]
pub struct ServiceEnable {
    pub name: String,
    /// Step ids whose change requires a restart (the unit file)
    pub restart_on: Vec<String>,
    pub start_timeout: Duration,
}

impl ServiceEnable {
    fn wait_until_active(&self, host: &Host) -> Result<()> {
        let deadline = Instant::now() + self.start_timeout;
        loop {
            let status = host.services.status(&self.name).map_err(tool("systemctl"))?;
            let state = status.active_state;
            if state.is_active() {
                return Ok(());
            }
            if state == ActiveState::Failed {
                bail!("{} entered state failed after start", self.name);
            }
            if Instant::now() >= deadline {
                bail!(
                    "{} not active within {}s (state: {})",
                    self.name,
                    self.start_timeout.as_secs(),
                    state
                );
            }
            log::debug!("Waiting for {} ({})", self.name, state);
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Step<Host> for ServiceEnable {
    fn id(&self) -> String {
        format!("service:{}", self.name)
    }

    fn description(&self) -> String {
        format!("Enable and start {}.service", self.name)
    }

    fn kind(&self) -> &'static str {
        "service"
    }

    fn rollback_hint(&self) -> Option<String> {
        Some(format!("systemctl disable --now {}", self.name))
    }

    fn watches(&self) -> Vec<String> {
        self.restart_on.clone()
    }

    fn check(&self, ctx: &StepContext<'_, Host>) -> CheckResult {
        match ctx.host.services.status(&self.name) {
            Ok(status) => CheckResult::from_bool(
                status.is_running(),
                format!(
                    "{} (state: {})",
                    if status.enabled { "enabled" } else { "disabled" },
                    status.active_state
                ),
            ),
            Err(e) => CheckResult::unknown(e.to_string()),
        }
    }

    fn apply(&self, ctx: &StepContext<'_, Host>) -> Result<()> {
        let services = &ctx.host.services;
        services.daemon_reload().map_err(tool("systemctl"))?;
        services.enable(&self.name).map_err(tool("systemctl"))?;

        let status = services.status(&self.name).map_err(tool("systemctl"))?;
        if status.active_state.is_active() || status.active_state.is_transitional() {
            services.restart(&self.name).map_err(tool("systemctl"))?;
        } else {
            services.start(&self.name).map_err(tool("systemctl"))?;
        }

        self.wait_until_active(ctx.host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::testing::{apply, apply_with_changed, check};
    use hostkit::{MockHost, ServiceStatus};

    fn step() -> ServiceEnable {
        ServiceEnable {
            name: "app".to_string(),
            restart_on: vec!["file:service-unit".to_string()],
            start_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_enable_and_start() {
        let mock = MockHost::new();
        let host = Host::from_mock(&mock);

        assert_eq!(
            check(&step(), &host),
            CheckResult::not_satisfied("disabled (state: inactive)")
        );
        apply(&step(), &host).unwrap();
        assert_eq!(
            mock.calls(),
            vec![
                "services.daemon_reload",
                "services.enable app",
                "services.start app"
            ]
        );
        assert!(check(&step(), &host).is_satisfied());
    }

    #[test]
    fn test_running_service_restarted_on_unit_change() {
        let mock = MockHost::new().with_service(
            "app",
            ServiceStatus {
                enabled: true,
                active_state: ActiveState::Active,
            },
        );
        let host = Host::from_mock(&mock);

        apply_with_changed(&step(), &host, &["file:service-unit"]).unwrap();
        assert_eq!(mock.calls().last().unwrap(), "services.restart app");
    }

    #[test]
    fn test_crash_after_start_fails() {
        let mock = MockHost::new().crash_on_start("app");
        let host = Host::from_mock(&mock);

        let err = apply(&step(), &host).unwrap_err();
        assert!(err.to_string().contains("failed"));
        assert!(mock.service("app").enabled);
    }

    #[test]
    fn test_start_error_is_tool_error() {
        let mock = MockHost::new().fail_on("services.start", "Unit app.service not found.");
        let err = apply(&step(), &Host::from_mock(&mock)).unwrap_err();
        assert!(format!("{err:#}").starts_with("systemctl: "));
    }

    #[test]
    fn test_watches_unit_file() {
        assert_eq!(step().watches(), vec!["file:service-unit"]);
    }
}
