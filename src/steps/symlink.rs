//! Symlink into the proxy's enabled-sites directory

use super::fs_error;
use crate::error::ProvisionError;
use anyhow::Result;
use declarative::{CheckResult, Step, StepContext};
use hostkit::Host;
use std::fs;
use std::path::PathBuf;

/// A symlink at `link` pointing at `target`
///
/// `target` is stored as the logical path, so the link resolves on the host
/// even when it was written under a staging root.
#[derive(Debug, Clone)]
pub struct SymlinkEnsure {
    pub name: String,
    pub target: PathBuf,
    pub link_logical: PathBuf,
    pub link_physical: PathBuf,
}

#[derive(Debug, PartialEq, Eq)]
enum LinkState {
    Missing,
    Correct,
    WrongTarget(PathBuf),
    FileExists,
}

impl SymlinkEnsure {
    fn current(&self) -> std::io::Result<LinkState> {
        let meta = match fs::symlink_metadata(&self.link_physical) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LinkState::Missing),
            Err(e) => return Err(e),
        };
        if !meta.file_type().is_symlink() {
            return Ok(LinkState::FileExists);
        }
        let actual = fs::read_link(&self.link_physical)?;
        if actual == self.target {
            Ok(LinkState::Correct)
        } else {
            Ok(LinkState::WrongTarget(actual))
        }
    }
}

impl Step<Host> for SymlinkEnsure {
    fn id(&self) -> String {
        format!("link:{}", self.name)
    }

    fn description(&self) -> String {
        format!(
            "Link {} -> {}",
            self.link_logical.display(),
            self.target.display()
        )
    }

    fn kind(&self) -> &'static str {
        "symlink"
    }

    fn rollback_hint(&self) -> Option<String> {
        Some(format!("rm {}", self.link_logical.display()))
    }

    fn check(&self, _ctx: &StepContext<'_, Host>) -> CheckResult {
        match self.current() {
            Ok(LinkState::Correct) => CheckResult::Satisfied,
            Ok(LinkState::Missing) => CheckResult::not_satisfied("missing"),
            Ok(LinkState::WrongTarget(actual)) => {
                CheckResult::not_satisfied(format!("points to {}", actual.display()))
            }
            Ok(LinkState::FileExists) => CheckResult::not_satisfied("a regular file is in the way"),
            Err(e) => CheckResult::unknown(e.to_string()),
        }
    }

    fn apply(&self, _ctx: &StepContext<'_, Host>) -> Result<()> {
        match self.current().map_err(fs_error(&self.link_physical))? {
            LinkState::Correct => return Ok(()),
            LinkState::FileExists => {
                return Err(ProvisionError::PreconditionUnmet(format!(
                    "{} exists and is not a symlink; move it aside first",
                    self.link_logical.display()
                ))
                .into());
            }
            LinkState::WrongTarget(_) => {
                fs::remove_file(&self.link_physical).map_err(fs_error(&self.link_physical))?;
            }
            LinkState::Missing => {}
        }

        if let Some(parent) = self.link_physical.parent() {
            fs::create_dir_all(parent).map_err(fs_error(parent))?;
        }
        std::os::unix::fs::symlink(&self.target, &self.link_physical)
            .map_err(fs_error(&self.link_physical))?;
        Ok(())
    }
}
