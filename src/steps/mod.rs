//! Concrete provisioning steps
//!
//! Every step implements [`declarative::Step`] over [`hostkit::Host`] and
//! keeps two views of each path it touches: the logical one (ids, rendered
//! configuration, messages) and the physical one (what is actually read
//! and written, see [`crate::paths::Layout`]).

mod certificate;
mod directory;
mod file_render;
mod firewall;
mod ownership;
mod package;
mod proxy;
mod scheduled_job;
mod service;
mod symlink;
mod venv;

pub use certificate::CertificateIssue;
pub use directory::DirectoryEnsure;
pub use file_render::{FileRender, write_atomic};
pub use firewall::FirewallRule;
pub use ownership::OwnershipEnsure;
pub use package::PackageInstall;
pub use proxy::ProxyReload;
pub use scheduled_job::ScheduledJobInstall;
pub use service::ServiceEnable;
pub use symlink::SymlinkEnsure;
pub use venv::VirtualEnvCreate;

use crate::error::ProvisionError;
use std::path::Path;

/// Wrap a host tool error with the tool it came from
fn tool(name: &'static str) -> impl FnOnce(hostkit::Error) -> ProvisionError {
    move |e| ProvisionError::tool(name, e)
}

/// Wrap an I/O error with the path it concerns
fn fs_error(path: &Path) -> impl FnOnce(std::io::Error) -> ProvisionError {
    let path = path.to_path_buf();
    move |e| ProvisionError::fs(path, e)
}

/// Permission bits of a mode, without the file type
fn permission_bits(mode: u32) -> u32 {
    mode & 0o7777
}

/// Uid and gid of a user and group, as the host sees them
fn owner_ids(host: &hostkit::Host, user: &str, group: &str) -> hostkit::Result<(u32, u32)> {
    Ok((host.accounts.uid(user)?, host.accounts.gid(group)?))
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fixtures shared by the step tests

    use declarative::{CheckResult, Step, StepContext};
    use hostkit::{Host, MockHost};
    use std::collections::HashSet;
    use std::os::unix::fs::MetadataExt;
    use std::path::Path;

    /// Mock host whose accounts map to the owner of `dir`
    ///
    /// chown to one's own uid and gid needs no privilege, so steps that set
    /// ownership can run for real inside a temp dir.
    pub fn mock_owned_by(dir: &Path) -> MockHost {
        let meta = std::fs::metadata(dir).unwrap();
        MockHost::new()
            .with_account("www-data", meta.uid(), meta.gid())
            .with_account("root", meta.uid(), meta.gid())
    }

    pub fn check(step: &dyn Step<Host>, host: &Host) -> CheckResult {
        let changed = HashSet::new();
        step.check(&StepContext::new(host, &changed, false, false))
    }

    pub fn apply(step: &dyn Step<Host>, host: &Host) -> anyhow::Result<()> {
        let changed = HashSet::new();
        step.apply(&StepContext::new(host, &changed, false, false))
    }

    pub fn apply_with_changed(
        step: &dyn Step<Host>,
        host: &Host,
        changed: &[&str],
    ) -> anyhow::Result<()> {
        let changed: HashSet<String> = changed.iter().map(|s| (*s).to_string()).collect();
        step.apply(&StepContext::new(host, &changed, false, false))
    }
}
