//! Shared value types reported by host tools.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Runtime state of a service as reported by the service manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActiveState {
    Active,
    Inactive,
    Activating,
    Deactivating,
    Reloading,
    Failed,
    /// Anything else the manager printed
    Unknown(String),
}

impl ActiveState {
    /// Parse the single-word output of `systemctl is-active`.
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "active" => Self::Active,
            "inactive" => Self::Inactive,
            "activating" => Self::Activating,
            "deactivating" => Self::Deactivating,
            "reloading" => Self::Reloading,
            "failed" => Self::Failed,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active | Self::Reloading)
    }

    /// Whether the state may still change on its own (start in progress)
    pub fn is_transitional(&self) -> bool {
        matches!(self, Self::Activating | Self::Deactivating)
    }
}

impl fmt::Display for ActiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
            Self::Activating => write!(f, "activating"),
            Self::Deactivating => write!(f, "deactivating"),
            Self::Reloading => write!(f, "reloading"),
            Self::Failed => write!(f, "failed"),
            Self::Unknown(s) => write!(f, "{s}"),
        }
    }
}

/// Enablement plus runtime state of one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub enabled: bool,
    pub active_state: ActiveState,
}

impl ServiceStatus {
    /// The state of a unit the manager has never heard of.
    pub fn absent() -> Self {
        Self {
            enabled: false,
            active_state: ActiveState::Inactive,
        }
    }

    /// Enabled at boot and currently running
    pub fn is_running(&self) -> bool {
        self.enabled && self.active_state.is_active()
    }
}

/// Transport protocol of a firewall rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Proto {
    Tcp,
    Udp,
}

impl fmt::Display for Proto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
        }
    }
}

/// A port allowed through the firewall, written `22`, `22/tcp` or `53/udp`.
///
/// Without a protocol the rule covers both tcp and udp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PortRule {
    pub port: u16,
    pub proto: Option<Proto>,
}

impl PortRule {
    pub fn tcp(port: u16) -> Self {
        Self {
            port,
            proto: Some(Proto::Tcp),
        }
    }

    /// Whether traffic allowed by `self` includes everything `other` allows.
    pub fn covers(&self, other: &PortRule) -> bool {
        self.port == other.port
            && match (self.proto, other.proto) {
                (None, _) => true,
                (Some(a), Some(b)) => a == b,
                (Some(_), None) => false,
            }
    }
}

impl FromStr for PortRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (port, proto) = match s.split_once('/') {
            Some((port, proto)) => (port, Some(proto)),
            None => (s, None),
        };
        let port: u16 = port
            .parse()
            .map_err(|_| format!("invalid port number in '{s}'"))?;
        if port == 0 {
            return Err(format!("port must be between 1 and 65535 in '{s}'"));
        }
        let proto = match proto {
            None => None,
            Some("tcp") => Some(Proto::Tcp),
            Some("udp") => Some(Proto::Udp),
            Some(other) => return Err(format!("unknown protocol '{other}' in '{s}'")),
        };
        Ok(Self { port, proto })
    }
}

impl fmt::Display for PortRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.proto {
            Some(proto) => write!(f, "{}/{}", self.port, proto),
            None => write!(f, "{}", self.port),
        }
    }
}

/// Firewall state: whether it is enforcing and which rules allow traffic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallStatus {
    pub active: bool,
    pub allowed: Vec<PortRule>,
}

impl FirewallStatus {
    /// Whether `rule` is already allowed by some existing rule
    pub fn allows(&self, rule: &PortRule) -> bool {
        self.allowed.iter().any(|r| r.covers(rule))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_state_parse() {
        assert_eq!(ActiveState::parse("active\n"), ActiveState::Active);
        assert_eq!(ActiveState::parse("failed"), ActiveState::Failed);
        assert_eq!(
            ActiveState::parse("maintenance"),
            ActiveState::Unknown("maintenance".to_string())
        );
        assert!(ActiveState::Activating.is_transitional());
        assert!(!ActiveState::Failed.is_active());
    }

    #[test]
    fn test_port_rule_parse() {
        assert_eq!("22/tcp".parse::<PortRule>().unwrap(), PortRule::tcp(22));
        assert_eq!(
            "53".parse::<PortRule>().unwrap(),
            PortRule {
                port: 53,
                proto: None
            }
        );
        assert!("0/tcp".parse::<PortRule>().is_err());
        assert!("70000".parse::<PortRule>().is_err());
        assert!("80/icmp".parse::<PortRule>().is_err());
        assert!("http".parse::<PortRule>().is_err());
    }

    #[test]
    fn test_port_rule_display() {
        assert_eq!(PortRule::tcp(443).to_string(), "443/tcp");
        assert_eq!("8080".parse::<PortRule>().unwrap().to_string(), "8080");
    }

    #[test]
    fn test_port_rule_covers() {
        let any22: PortRule = "22".parse().unwrap();
        let tcp22 = PortRule::tcp(22);
        let udp22: PortRule = "22/udp".parse().unwrap();
        assert!(any22.covers(&tcp22));
        assert!(!tcp22.covers(&any22));
        assert!(!tcp22.covers(&udp22));
        assert!(!tcp22.covers(&PortRule::tcp(80)));
    }

    #[test]
    fn test_firewall_allows() {
        let status = FirewallStatus {
            active: true,
            allowed: vec!["22".parse().unwrap(), PortRule::tcp(80)],
        };
        assert!(status.allows(&PortRule::tcp(22)));
        assert!(status.allows(&PortRule::tcp(80)));
        assert!(!status.allows(&PortRule::tcp(443)));
    }
}
