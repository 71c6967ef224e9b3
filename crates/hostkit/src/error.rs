//! Error types for host tool operations.
//!
//! Errors are categorized so callers can tell a missing tool apart from a
//! tool that ran and refused, or from output that could not be understood.

use thiserror::Error;

/// Categories of host tool errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The tool binary is not installed or not in PATH
    ToolMissing,
    /// The tool ran and exited non-zero
    CommandFailed,
    /// The tool's output could not be parsed
    Parse,
    /// Local I/O error (spawning, pipes, files)
    Io,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::ToolMissing => "Required tool not installed",
            Self::CommandFailed => "Tool reported an error",
            Self::Parse => "Unexpected tool output",
            Self::Io => "I/O error",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::ToolMissing => "Install the tool or make sure it is in PATH",
            Self::CommandFailed => "Check the tool's error output above",
            Self::Parse => "The tool version may be unsupported",
            Self::Io => "Check permissions and available disk space",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur while driving host tools.
#[derive(Debug, Error)]
pub enum Error {
    /// Tool binary not found in PATH
    #[error("{tool} not found in PATH")]
    ToolMissing {
        /// Name of the missing executable
        tool: String,
    },

    /// Tool exited with a non-zero status
    #[error("`{command}` failed{suffix}: {detail}", suffix = exit_suffix(.code), detail = .stderr.trim())]
    CommandFailed {
        /// The command line that was run
        command: String,
        /// Exit code, if the process exited normally
        code: Option<i32>,
        /// Standard error output from the failed command
        stderr: String,
    },

    /// Output could not be parsed
    #[error("could not parse {what}: {message}")]
    Parse {
        /// What was being parsed
        what: String,
        /// Why parsing failed
        message: String,
    },

    /// User or group does not exist
    #[error("unknown {kind}: {name}")]
    UnknownAccount {
        /// "user" or "group"
        kind: &'static str,
        /// The name that was looked up
        name: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

fn exit_suffix(code: &Option<i32>) -> String {
    code.map(|c| format!(" with exit code {c}"))
        .unwrap_or_else(|| " (terminated by signal)".to_string())
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::ToolMissing { .. } => ErrorCategory::ToolMissing,
            Error::CommandFailed { .. } => ErrorCategory::CommandFailed,
            Error::Parse { .. } => ErrorCategory::Parse,
            Error::Io(_) => ErrorCategory::Io,
            Error::UnknownAccount { .. } | Error::Other(_) => ErrorCategory::Other,
        }
    }

    /// Shorthand for a parse error.
    pub fn parse(what: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Parse {
            what: what.into(),
            message: message.into(),
        }
    }
}

/// Result type for host tool operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failed_display() {
        let err = Error::CommandFailed {
            command: "apt-get install -y nginx".to_string(),
            code: Some(100),
            stderr: "E: Unable to locate package nginx\n".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "`apt-get install -y nginx` failed with exit code 100: E: Unable to locate package nginx"
        );
        assert_eq!(err.category(), ErrorCategory::CommandFailed);
    }

    #[test]
    fn test_signal_display() {
        let err = Error::CommandFailed {
            command: "nginx -t".to_string(),
            code: None,
            stderr: String::new(),
        };
        assert!(err.to_string().contains("terminated by signal"));
    }

    #[test]
    fn test_categories() {
        let missing = Error::ToolMissing {
            tool: "ufw".to_string(),
        };
        assert_eq!(missing.category(), ErrorCategory::ToolMissing);
        assert_eq!(
            missing.category().advice(),
            "Install the tool or make sure it is in PATH"
        );
        assert_eq!(
            Error::parse("ufw status", "no status line").category(),
            ErrorCategory::Parse
        );
    }
}
