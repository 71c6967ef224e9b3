//! Directory existence, ownership and mode

use super::{display, fs_error, owner_ids, permission_bits};
use crate::error::ProvisionError;
use anyhow::Result;
use declarative::{CheckResult, Step, StepContext};
use hostkit::Host;
use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct DirectoryEnsure {
    pub logical: PathBuf,
    pub physical: PathBuf,
    pub owner: String,
    pub group: String,
    pub mode: u32,
}

impl Step<Host> for DirectoryEnsure {
    fn id(&self) -> String {
        format!("dir:{}", self.logical.display())
    }

    fn description(&self) -> String {
        format!(
            "Ensure directory {} ({}:{}, {:04o})",
            self.logical.display(),
            self.owner,
            self.group,
            self.mode
        )
    }

    fn kind(&self) -> &'static str {
        "directory"
    }

    fn rollback_hint(&self) -> Option<String> {
        Some(format!("rmdir {} if it is empty", self.logical.display()))
    }

    fn check(&self, ctx: &StepContext<'_, Host>) -> CheckResult {
        let meta = match fs::metadata(&self.physical) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return CheckResult::not_satisfied("missing");
            }
            Err(e) => return CheckResult::unknown(format!("{}: {e}", display(&self.physical))),
        };
        if !meta.is_dir() {
            return CheckResult::not_satisfied("exists but is not a directory");
        }

        let (uid, gid) = match owner_ids(ctx.host, &self.owner, &self.group) {
            Ok(ids) => ids,
            Err(e) => return CheckResult::unknown(e.to_string()),
        };
        if meta.uid() != uid || meta.gid() != gid {
            return CheckResult::not_satisfied(format!(
                "owned by {}:{}, want {}:{}",
                meta.uid(),
                meta.gid(),
                uid,
                gid
            ));
        }
        let mode = permission_bits(meta.mode());
        CheckResult::from_bool(
            mode == self.mode,
            format!("mode is {mode:04o}, want {:04o}", self.mode),
        )
    }

    fn apply(&self, ctx: &StepContext<'_, Host>) -> Result<()> {
        if self.physical.exists() && !self.physical.is_dir() {
            return Err(ProvisionError::PreconditionUnmet(format!(
                "{} exists and is not a directory",
                self.logical.display()
            ))
            .into());
        }
        let (uid, gid) = owner_ids(ctx.host, &self.owner, &self.group)?;

        fs::create_dir_all(&self.physical).map_err(fs_error(&self.physical))?;
        std::os::unix::fs::chown(&self.physical, Some(uid), Some(gid))
            .map_err(fs_error(&self.physical))?;
        fs::set_permissions(&self.physical, fs::Permissions::from_mode(self.mode))
            .map_err(fs_error(&self.physical))?;
        Ok(())
    }
}
