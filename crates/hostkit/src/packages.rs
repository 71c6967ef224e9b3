//! OS package manager capability (apt/dpkg backend).

use crate::command::Cmd;
use crate::error::Result;

/// Query and install OS packages.
pub trait PackageManager: Send + Sync {
    /// Whether `name` is installed.
    fn is_installed(&self, name: &str) -> Result<bool>;

    /// Install (or upgrade) every package in `names`.
    fn install(&self, names: &[String]) -> Result<()>;
}

/// Debian/Ubuntu backend: `dpkg-query` for state, `apt-get` for installs.
#[derive(Debug, Default)]
pub struct Apt;

/// Interpret `dpkg-query -W -f='${Status}'` output
///
/// A removed-but-configured package reports `deinstall ok config-files`,
/// which does not count as installed.
pub fn parse_dpkg_status(status: &str) -> bool {
    status.trim() == "install ok installed"
}

impl PackageManager for Apt {
    fn is_installed(&self, name: &str) -> Result<bool> {
        let output = Cmd::new("dpkg-query")
            .args(["-W", "-f=${Status}"])
            .arg(name)
            .output()?;
        // Exit 1 means dpkg has no record of the package
        Ok(output.success() && parse_dpkg_status(&output.stdout))
    }

    fn install(&self, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        Cmd::new("apt-get")
            .arg("update")
            .env("DEBIAN_FRONTEND", "noninteractive")
            .run()?;
        Cmd::new("apt-get")
            .args(["install", "-y", "--no-install-recommends"])
            .args(names)
            .env("DEBIAN_FRONTEND", "noninteractive")
            .run()?;
        Ok(())
    }
}
