//! Host firewall capability (ufw backend).

use crate::command::Cmd;
use crate::error::{Error, Result};
use crate::types::{FirewallStatus, PortRule};

/// Inspect and extend the firewall's allow list.
pub trait Firewall: Send + Sync {
    fn status(&self) -> Result<FirewallStatus>;

    /// Allow incoming traffic for `rule`.
    fn allow(&self, rule: &PortRule) -> Result<()>;

    /// Start enforcing rules.
    fn enable(&self) -> Result<()>;
}

/// Uncomplicated Firewall backend.
#[derive(Debug, Default)]
pub struct Ufw;

/// Parse `ufw status` output.
///
/// ```text
/// Status: active
///
/// To                         Action      From
/// --                         ------      ----
/// 22/tcp                     ALLOW       Anywhere
/// 22/tcp (v6)                ALLOW       Anywhere (v6)
/// ```
///
/// Application profiles (`OpenSSH`, `Nginx Full`) are ignored since they do
/// not name a port.
pub fn parse_status(output: &str) -> Result<FirewallStatus> {
    let mut lines = output.lines().map(str::trim).filter(|l| !l.is_empty());
    let active = match lines.next().and_then(|l| l.strip_prefix("Status:")) {
        Some(state) => state.trim() == "active",
        None => return Err(Error::parse("ufw status", "missing 'Status:' line")),
    };

    let mut allowed: Vec<PortRule> = Vec::new();
    for line in lines {
        let Some((to, rest)) = line.split_once(char::is_whitespace) else {
            continue;
        };
        if !rest.trim_start().trim_start_matches("(v6)").trim_start().starts_with("ALLOW") {
            continue;
        }
        if let Ok(rule) = to.parse::<PortRule>()
            && !allowed.contains(&rule)
        {
            allowed.push(rule);
        }
    }

    Ok(FirewallStatus { active, allowed })
}

impl Firewall for Ufw {
    fn status(&self) -> Result<FirewallStatus> {
        parse_status(&Cmd::new("ufw").arg("status").run()?)
    }

    fn allow(&self, rule: &PortRule) -> Result<()> {
        Cmd::new("ufw").args(["allow", &rule.to_string()]).run()?;
        Ok(())
    }

    fn enable(&self) -> Result<()> {
        Cmd::new("ufw").args(["--force", "enable"]).run()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACTIVE: &str = "\
Status: active

To                         Action      From
--                         ------      ----
22/tcp                     ALLOW       Anywhere
80/tcp                     ALLOW       Anywhere
Nginx Full                 ALLOW       Anywhere
8080                       DENY        Anywhere
22/tcp (v6)                ALLOW       Anywhere (v6)
80/tcp (v6)                ALLOW       Anywhere (v6)
";

    #[test]
    fn test_parse_active() {
        let status = parse_status(ACTIVE).unwrap();
        assert!(status.active);
        assert_eq!(status.allowed, vec![PortRule::tcp(22), PortRule::tcp(80)]);
        assert!(!status.allows(&PortRule::tcp(8080)));
    }

    #[test]
    fn test_parse_inactive() {
        let status = parse_status("Status: inactive\n").unwrap();
        assert!(!status.active);
        assert!(status.allowed.is_empty());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_status("ERROR: You need to be root to run this script").is_err());
    }
}
