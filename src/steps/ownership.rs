//! Recursive ownership of the application directory

use super::{display, fs_error, owner_ids};
use anyhow::{Context, Result};
use declarative::{CheckResult, Step, StepContext};
use hostkit::Host;
use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;
use walkdir::WalkDir;

/// Every entry below `physical` owned by `user:group`
///
/// Symlinks are not followed; the links themselves are re-owned.
#[derive(Debug, Clone)]
pub struct OwnershipEnsure {
    pub logical: PathBuf,
    pub physical: PathBuf,
    pub user: String,
    pub group: String,
}

impl OwnershipEnsure {
    /// Entries whose owner differs from `uid:gid`
    fn mismatched(&self, uid: u32, gid: u32) -> Result<Vec<PathBuf>> {
        let mut wrong = Vec::new();
        for entry in WalkDir::new(&self.physical).follow_links(false) {
            let entry =
                entry.with_context(|| format!("Failed to walk {}", self.logical.display()))?;
            let meta = entry
                .metadata()
                .with_context(|| format!("Failed to stat {}", entry.path().display()))?;
            if meta.uid() != uid || meta.gid() != gid {
                wrong.push(entry.into_path());
            }
        }
        Ok(wrong)
    }
}

impl Step<Host> for OwnershipEnsure {
    fn id(&self) -> String {
        format!("perm:{}", self.logical.display())
    }

    fn description(&self) -> String {
        format!(
            "Own {} recursively as {}:{}",
            self.logical.display(),
            self.user,
            self.group
        )
    }

    fn kind(&self) -> &'static str {
        "ownership"
    }

    fn check(&self, ctx: &StepContext<'_, Host>) -> CheckResult {
        if !self.physical.exists() {
            return CheckResult::not_satisfied("missing");
        }
        let (uid, gid) = match owner_ids(ctx.host, &self.user, &self.group) {
            Ok(ids) => ids,
            Err(e) => return CheckResult::unknown(e.to_string()),
        };
        match self.mismatched(uid, gid) {
            Ok(wrong) if wrong.is_empty() => CheckResult::Satisfied,
            Ok(wrong) => CheckResult::not_satisfied(format!(
                "{} entries not owned by {}:{} (first: {})",
                wrong.len(),
                self.user,
                self.group,
                display(&wrong[0])
            )),
            Err(e) => CheckResult::unknown(format!("{e:#}")),
        }
    }

    fn apply(&self, ctx: &StepContext<'_, Host>) -> Result<()> {
        let (uid, gid) = owner_ids(ctx.host, &self.user, &self.group)?;
        let wrong = self.mismatched(uid, gid)?;
        for path in &wrong {
            std::os::unix::fs::lchown(path, Some(uid), Some(gid)).map_err(fs_error(path))?;
        }
        log::debug!(
            "Changed owner of {} entries under {}",
            wrong.len(),
            self.logical.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::testing::{apply, check, mock_owned_by};
    use hostkit::MockHost;
    use std::fs;
    use tempfile::TempDir;

    fn step(dir: &TempDir) -> OwnershipEnsure {
        OwnershipEnsure {
            logical: PathBuf::from("/srv/app"),
            physical: dir.path().join("app"),
            user: "www-data".to_string(),
            group: "www-data".to_string(),
        }
    }

    #[test]
    fn test_tree_owned_by_service_user() {
        let dir = TempDir::new().unwrap();
        let step = step(&dir);
        fs::create_dir_all(step.physical.join("cache")).unwrap();
        fs::write(step.physical.join("cache/item.json"), "{}").unwrap();
        std::os::unix::fs::symlink("/nonexistent", step.physical.join("dangling")).unwrap();

        let host = Host::from_mock(&mock_owned_by(dir.path()));
        assert!(check(&step, &host).is_satisfied());
        apply(&step, &host).unwrap();
        assert!(check(&step, &host).is_satisfied());
    }

    #[test]
    fn test_foreign_owner_detected() {
        let dir = TempDir::new().unwrap();
        let step = step(&dir);
        fs::create_dir_all(&step.physical).unwrap();
        let meta = fs::metadata(dir.path()).unwrap();

        // The service account maps to some other uid
        let mock = MockHost::new().with_account("www-data", meta.uid() + 1, meta.gid());
        let host = Host::from_mock(&mock);
        match check(&step, &host) {
            CheckResult::NotSatisfied { reason } => assert!(reason.starts_with("1 entries")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_missing_dir() {
        let dir = TempDir::new().unwrap();
        let host = Host::from_mock(&mock_owned_by(dir.path()));
        assert_eq!(
            check(&step(&dir), &host),
            CheckResult::not_satisfied("missing")
        );
    }
}
