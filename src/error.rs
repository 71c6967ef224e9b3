//! Provisioning error taxonomy
//!
//! Steps return `anyhow::Result`; the variants here are what they wrap at
//! the boundary so the CLI can tell a bad config from a broken host.

use crate::validation::ValidationError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Bad desired state, raised before anything is applied
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The host is not ready for a step yet
    #[error("precondition unmet: {0}")]
    PreconditionUnmet(String),

    /// An external tool exited non-zero or printed something unparseable
    #[error("{tool}: {source}")]
    ExternalTool {
        tool: &'static str,
        #[source]
        source: hostkit::Error,
    },

    #[error("{}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ProvisionError {
    pub fn tool(tool: &'static str, source: hostkit::Error) -> Self {
        Self::ExternalTool { tool, source }
    }

    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Process exit code the CLI uses for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Problem;

    #[test]
    fn test_validation_exit_code() {
        let err = ProvisionError::from(ValidationError {
            problems: vec![Problem {
                field: "domain".to_string(),
                message: "is required".to_string(),
            }],
        });
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("domain: is required"));
    }

    #[test]
    fn test_external_tool_keeps_source() {
        let err = ProvisionError::tool(
            "apt",
            hostkit::Error::ToolMissing {
                tool: "apt-get".to_string(),
            },
        );
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().starts_with("apt: "));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = ProvisionError::fs(
            "/srv/app",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        )
        .into();
        let err = err.context("creating app dir");
        assert!(matches!(
            err.downcast_ref::<ProvisionError>(),
            Some(ProvisionError::Filesystem { .. })
        ));
    }
}
