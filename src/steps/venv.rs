//! Python virtual environment

use super::{tool, write_atomic};
use anyhow::Result;
use declarative::{CheckResult, Step, StepContext};
use hostkit::Host;
use std::fs;
use std::path::{Path, PathBuf};

/// Stamp file recording which requirements the venv was built with
pub const STAMP_FILE: &str = ".hostform-requirements";

/// Create a venv and install the requirement list into it
///
/// Satisfied when the interpreter exists and the stamp holds the digest of
/// the current requirement list, so editing the list reinstalls.
#[derive(Debug, Clone)]
pub struct VirtualEnvCreate {
    pub logical: PathBuf,
    pub physical: PathBuf,
    pub interpreter: String,
    pub packages: Vec<String>,
}

impl VirtualEnvCreate {
    fn marker(&self) -> PathBuf {
        self.physical.join("bin/python")
    }

    fn stamp(&self) -> PathBuf {
        self.physical.join(STAMP_FILE)
    }

    /// Digest of the sorted requirement list
    pub fn requirements_digest(&self) -> String {
        let mut packages = self.packages.clone();
        packages.sort();
        blake3::hash(packages.join("\n").as_bytes())
            .to_hex()
            .to_string()
    }
}

fn read_stamp(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
}

impl Step<Host> for VirtualEnvCreate {
    fn id(&self) -> String {
        format!("venv:{}", self.logical.display())
    }

    fn description(&self) -> String {
        format!(
            "Create {} venv with {} packages",
            self.interpreter,
            self.packages.len()
        )
    }

    fn kind(&self) -> &'static str {
        "venv"
    }

    fn rollback_hint(&self) -> Option<String> {
        Some(format!("rm -rf {}", self.logical.display()))
    }

    fn check(&self, _ctx: &StepContext<'_, Host>) -> CheckResult {
        if !self.marker().exists() {
            return CheckResult::not_satisfied("no interpreter in venv");
        }
        match read_stamp(&self.stamp()) {
            Some(stamp) if stamp == self.requirements_digest() => CheckResult::Satisfied,
            Some(_) => CheckResult::not_satisfied("requirements changed"),
            None => CheckResult::not_satisfied("requirements not installed"),
        }
    }

    fn apply(&self, ctx: &StepContext<'_, Host>) -> Result<()> {
        if !self.marker().exists() {
            ctx.host
                .python
                .create(&self.interpreter, &self.physical)
                .map_err(tool("venv"))?;
        }
        ctx.host
            .python
            .install(&self.physical, &self.packages)
            .map_err(tool("pip"))?;

        let digest = format!("{}\n", self.requirements_digest());
        write_atomic(&self.stamp(), digest.as_bytes(), 0o644)
    }
}
