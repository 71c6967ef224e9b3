//! Python virtual environment capability.

use crate::command::Cmd;
use crate::error::Result;
use std::path::Path;

/// Create virtual environments and install packages into them.
pub trait PythonEnv: Send + Sync {
    /// Create a virtual environment at `path` using `interpreter` (e.g. `python3.11`).
    fn create(&self, interpreter: &str, path: &Path) -> Result<()>;

    /// Install or upgrade `packages` inside the environment at `path`.
    fn install(&self, path: &Path, packages: &[String]) -> Result<()>;
}

/// `python -m venv` plus the environment's own pip.
#[derive(Debug, Default)]
pub struct Venv;

impl PythonEnv for Venv {
    fn create(&self, interpreter: &str, path: &Path) -> Result<()> {
        Cmd::new(interpreter)
            .args(["-m", "venv"])
            .arg(path)
            .run()?;
        Ok(())
    }

    fn install(&self, path: &Path, packages: &[String]) -> Result<()> {
        let pip = path.join("bin").join("pip");
        Cmd::new(pip.to_string_lossy())
            .args(["install", "--upgrade", "pip"])
            .run()?;
        if packages.is_empty() {
            return Ok(());
        }
        Cmd::new(pip.to_string_lossy())
            .args(["install", "--upgrade"])
            .args(packages)
            .run()?;
        Ok(())
    }
}
