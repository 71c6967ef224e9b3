//! Firewall rules

use super::tool;
use anyhow::Result;
use declarative::{CheckResult, Step, StepContext};
use hostkit::{Host, PortRule};

#[derive(Debug, Clone)]
pub struct FirewallRule {
    pub rules: Vec<PortRule>,
}

impl FirewallRule {
    fn rule_list(&self) -> String {
        self.rules
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Step<Host> for FirewallRule {
    fn id(&self) -> String {
        "firewall".to_string()
    }

    fn description(&self) -> String {
        format!("Allow {} and enable the firewall", self.rule_list())
    }

    fn kind(&self) -> &'static str {
        "firewall"
    }

    fn rollback_hint(&self) -> Option<String> {
        Some("ufw disable".to_string())
    }

    fn check(&self, ctx: &StepContext<'_, Host>) -> CheckResult {
        let status = match ctx.host.firewall.status() {
            Ok(status) => status,
            Err(e) => return CheckResult::unknown(e.to_string()),
        };
        let missing: Vec<String> = self
            .rules
            .iter()
            .filter(|rule| !status.allows(rule))
            .map(ToString::to_string)
            .collect();
        if !missing.is_empty() {
            return CheckResult::not_satisfied(format!("not allowed: {}", missing.join(", ")));
        }
        CheckResult::from_bool(status.active, "firewall inactive")
    }

    fn apply(&self, ctx: &StepContext<'_, Host>) -> Result<()> {
        let status = ctx.host.firewall.status().map_err(tool("ufw"))?;
        for rule in self.rules.iter().filter(|rule| !status.allows(rule)) {
            ctx.host.firewall.allow(rule).map_err(tool("ufw"))?;
        }
        // Rules first, so enabling never cuts off SSH mid-run
        if !status.active {
            ctx.host.firewall.enable().map_err(tool("ufw"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::testing::{apply, check};
    use hostkit::{FirewallStatus, MockHost};

    fn step() -> FirewallRule {
        FirewallRule {
            rules: ["22/tcp", "80/tcp", "443/tcp"]
                .iter()
                .map(|s| s.parse().unwrap())
                .collect(),
        }
    }

    #[test]
    fn test_allows_missing_then_enables() {
        let mock = MockHost::new().with_firewall(FirewallStatus {
            active: false,
            allowed: vec![PortRule::tcp(22)],
        });
        let host = Host::from_mock(&mock);

        assert_eq!(
            check(&step(), &host),
            CheckResult::not_satisfied("not allowed: 80/tcp, 443/tcp")
        );
        apply(&step(), &host).unwrap();
        assert_eq!(
            mock.calls(),
            vec!["firewall.allow 80/tcp", "firewall.allow 443/tcp", "firewall.enable"]
        );
        assert!(check(&step(), &host).is_satisfied());
    }

    #[test]
    fn test_inactive_with_all_rules() {
        let mock = MockHost::new().with_firewall(FirewallStatus {
            active: false,
            allowed: step().rules,
        });
        let host = Host::from_mock(&mock);
        assert_eq!(
            check(&step(), &host),
            CheckResult::not_satisfied("firewall inactive")
        );
        apply(&step(), &host).unwrap();
        assert_eq!(mock.calls(), vec!["firewall.enable"]);
    }
}
