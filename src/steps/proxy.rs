//! Reverse proxy reload

use super::tool;
use anyhow::Result;
use declarative::{CheckResult, Step, StepContext};
use hostkit::Host;

/// Validate the proxy configuration and reload it
///
/// Runs when the proxy is not running, or when one of the watched site,
/// link, TLS or certificate steps changed something.
#[derive(Debug, Clone)]
pub struct ProxyReload {
    pub watched: Vec<String>,
}

impl Step<Host> for ProxyReload {
    fn id(&self) -> String {
        "proxy:reload".to_string()
    }

    fn description(&self) -> String {
        "Test and reload the reverse proxy".to_string()
    }

    fn kind(&self) -> &'static str {
        "proxy"
    }

    fn rollback_hint(&self) -> Option<String> {
        Some("fix the reported error, then run `nginx -t`".to_string())
    }

    fn watches(&self) -> Vec<String> {
        self.watched.clone()
    }

    fn check(&self, ctx: &StepContext<'_, Host>) -> CheckResult {
        let unit = ctx.host.proxy.unit();
        match ctx.host.services.status(unit) {
            Ok(status) => CheckResult::from_bool(
                status.is_running(),
                format!("{unit} not running (state: {})", status.active_state),
            ),
            Err(e) => CheckResult::unknown(e.to_string()),
        }
    }

    fn apply(&self, ctx: &StepContext<'_, Host>) -> Result<()> {
        ctx.host.proxy.test_config().map_err(tool("nginx"))?;
        ctx.host.proxy.reload().map_err(tool("nginx"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::testing::{apply, check};
    use hostkit::MockHost;

    fn step() -> ProxyReload {
        ProxyReload {
            watched: vec!["file:proxy-site".to_string()],
        }
    }

    #[test]
    fn test_reload_starts_proxy() {
        let mock = MockHost::new();
        let host = Host::from_mock(&mock);

        assert!(!check(&step(), &host).is_satisfied());
        apply(&step(), &host).unwrap();
        assert_eq!(mock.calls(), vec!["proxy.test_config", "proxy.reload"]);
        assert!(check(&step(), &host).is_satisfied());
    }

    #[test]
    fn test_bad_config_never_reloads() {
        let mock = MockHost::new().fail_on("proxy.test_config", "nginx: [emerg] unexpected \"}\"");
        let host = Host::from_mock(&mock);

        let err = apply(&step(), &host).unwrap_err();
        assert!(format!("{err:#}").contains("[emerg]"));
        assert_eq!(mock.calls(), vec!["proxy.test_config"]);
    }
}
