//! Path resolution for hostform
//!
//! Every path hostform writes is decided in two stages. The *logical* path is
//! what the host sees and what rendered configuration refers to
//! (`/etc/systemd/system/app.service`). The *physical* path is where the file
//! is actually written, which is the logical path re-rooted under a
//! [`Layout`] root. On a real run the root is `/` and both are identical.
//!
//! # Environment Variables
//!
//! - `HOSTFORM_ROOT` - Re-root every physical path (staging a host image,
//!   or running the whole plan inside a scratch directory)

use std::path::{Component, Path, PathBuf};

/// Environment variable for the filesystem root override
pub const ENV_ROOT: &str = "HOSTFORM_ROOT";

/// Directory systemd loads unit files from
pub const SYSTEMD_UNIT_DIR: &str = "/etc/systemd/system";

/// nginx site configuration, available and enabled
pub const NGINX_SITES_AVAILABLE: &str = "/etc/nginx/sites-available";
pub const NGINX_SITES_ENABLED: &str = "/etc/nginx/sites-enabled";

/// nginx drop-in directory included from the http block
pub const NGINX_CONF_DIR: &str = "/etc/nginx/conf.d";

/// Where helper scripts are installed
pub const LOCAL_BIN: &str = "/usr/local/bin";

/// Webroot answering ACME HTTP-01 challenges
pub const ACME_WEBROOT: &str = "/var/www/_letsencrypt";

/// Certificate material written by certbot
pub const LETSENCRYPT_LIVE: &str = "/etc/letsencrypt/live";

/// Maps logical host paths to physical ones
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    /// The real filesystem
    pub fn system() -> Self {
        Self {
            root: PathBuf::from("/"),
        }
    }

    /// Every path re-rooted under `root`
    pub fn under(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `HOSTFORM_ROOT` if set, the real filesystem otherwise
    pub fn from_env() -> Self {
        match std::env::var(ENV_ROOT) {
            Ok(root) if !root.is_empty() => {
                let root = expand(&root);
                log::debug!("Using filesystem root from {}: {}", ENV_ROOT, root.display());
                Self::under(root)
            }
            _ => Self::system(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether physical paths differ from logical ones
    pub fn is_rerooted(&self) -> bool {
        self.root != Path::new("/")
    }

    /// Physical location of a logical path
    pub fn physical(&self, logical: &Path) -> PathBuf {
        let relative: PathBuf = logical
            .components()
            .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
            .collect();
        self.root.join(relative)
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::system()
    }
}

/// Expand ~ and environment variables in a path string.
///
/// # Examples
///
/// ```ignore
/// use crate::paths;
///
/// // Expands ~ to home directory
/// let config = paths::expand("~/hostform.toml");
///
/// // Expands environment variables
/// let staged = paths::expand("$HOME/stage");
/// ```
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================
