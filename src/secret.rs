//! Scoped secret acquisition
//!
//! The API key never lives in the configuration object itself. Config only
//! names where to find it; the value is read when the service unit is
//! rendered.
//! 1. Config names a source (`env`, `file`, or an inline `value`)
//! 2. `acquire()` reads it right before rendering into a [`SecretString`]
//! 3. Every buffer that held the raw value is zeroed when it is dropped

use anyhow::{Context, Result, bail};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use zeroize::Zeroizing;

/// Placeholder shipped in sample configurations; never a real key
pub const PLACEHOLDER: &str = "YOUR_API_KEY_HERE";

/// Where to read a secret from
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretSource {
    /// Environment variable of the hostform process
    Env(String),
    /// File whose (trimmed) content is the secret
    File(PathBuf),
    /// Inline value (discouraged outside tests)
    Value(String),
}

impl SecretSource {
    /// Read the secret
    ///
    /// A value containing a line break or any other control character is
    /// refused: it ends up inside a unit file line.
    pub fn acquire(&self) -> Result<SecretString> {
        let mut value = Zeroizing::new(match self {
            Self::Env(var) => std::env::var(var)
                .with_context(|| format!("environment variable {} is not set", var))?,
            Self::File(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Could not read secret file {}", path.display()))?,
            Self::Value(v) => v.clone(),
        });
        if matches!(self, Self::File(_)) {
            let len = value.trim_end_matches(['\n', '\r']).len();
            value.truncate(len);
        }

        if value.is_empty() {
            bail!("secret from {} is empty", self);
        }
        if value.as_str() == PLACEHOLDER {
            bail!("secret from {} is still the placeholder {}", self, PLACEHOLDER);
        }
        if value.chars().any(char::is_control) {
            bail!(
                "secret from {} contains a line break or other control character",
                self
            );
        }

        log::debug!("Acquired secret from {}", self);
        Ok(SecretString::from(value.as_str().to_owned()))
    }
}

impl fmt::Display for SecretSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Env(var) => write!(f, "env:{}", var),
            Self::File(path) => write!(f, "file:{}", path.display()),
            Self::Value(_) => write!(f, "inline value"),
        }
    }
}

impl fmt::Debug for SecretSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(_) => f.debug_tuple("Value").field(&"***").finish(),
            Self::Env(var) => f.debug_tuple("Env").field(var).finish(),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}
