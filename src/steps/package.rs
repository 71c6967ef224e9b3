//! OS package installation

use super::tool;
use anyhow::Result;
use declarative::{CheckResult, Step, StepContext};
use hostkit::Host;

/// Install OS packages through the package manager
#[derive(Debug, Clone)]
pub struct PackageInstall {
    pub names: Vec<String>,
}

impl PackageInstall {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Packages not yet installed; a failed query counts as missing
    fn missing(&self, host: &Host) -> Vec<String> {
        self.names
            .iter()
            .filter(|name| !host.packages.is_installed(name).unwrap_or(false))
            .cloned()
            .collect()
    }
}

impl Step<Host> for PackageInstall {
    fn id(&self) -> String {
        "package:os".to_string()
    }

    fn description(&self) -> String {
        format!("Install {} OS packages", self.names.len())
    }

    fn kind(&self) -> &'static str {
        "package"
    }

    fn check(&self, ctx: &StepContext<'_, Host>) -> CheckResult {
        let mut missing = Vec::new();
        for name in &self.names {
            match ctx.host.packages.is_installed(name) {
                Ok(true) => {}
                Ok(false) => missing.push(name.as_str()),
                Err(e) => return CheckResult::unknown(format!("querying {name}: {e}")),
            }
        }
        CheckResult::from_bool(missing.is_empty(), format!("missing: {}", missing.join(", ")))
    }

    fn apply(&self, ctx: &StepContext<'_, Host>) -> Result<()> {
        let missing = self.missing(ctx.host);
        if missing.is_empty() {
            return Ok(());
        }
        log::info!("Installing packages: {}", missing.join(" "));
        ctx.host.packages.install(&missing).map_err(tool("apt"))?;
        Ok(())
    }
}
