//! Rendered configuration files, written atomically
//!
//! The new content goes to a temp file in the destination directory, gets
//! its mode and an fsync, and is then renamed over the destination. A crash
//! at any point leaves either the old file or the new one, never a mix;
//! an abandoned temp file is removed when its handle drops.

use super::{display, fs_error, permission_bits};
use crate::config::Deployment;
use crate::engine::differ;
use crate::templates::{Renderer, Template};
use anyhow::{Context, Result};
use declarative::{CheckResult, Criticality, Precondition, Step, StepContext};
use hostkit::Host;
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

#[derive(Debug, Clone)]
pub struct FileRender {
    pub template: Template,
    pub logical: PathBuf,
    pub physical: PathBuf,
    pub mode: u32,
    /// Only render once the domain's certificate exists
    pub requires_certificate: bool,
    pub deployment: Arc<Deployment>,
    pub renderer: Arc<Renderer>,
}

impl FileRender {
    pub fn new(
        template: Template,
        deployment: Arc<Deployment>,
        renderer: Arc<Renderer>,
        physical: PathBuf,
    ) -> Self {
        Self {
            template,
            logical: template.destination(&deployment),
            physical,
            mode: template.mode(),
            requires_certificate: template == Template::ProxyTls,
            deployment,
            renderer,
        }
    }

    fn show_diff(&self, current: Option<&str>, desired: &str) {
        if self.template.is_sensitive() {
            eprintln!(
                "    {} (content hidden, contains secrets)",
                self.logical.display()
            );
            return;
        }
        differ::show_text_diff(&display(&self.logical), current.unwrap_or(""), desired);
    }
}

impl Step<Host> for FileRender {
    fn id(&self) -> String {
        format!("file:{}", self.template.name())
    }

    fn description(&self) -> String {
        format!("Render {} to {}", self.template, self.logical.display())
    }

    fn kind(&self) -> &'static str {
        "file"
    }

    fn criticality(&self) -> Criticality {
        if self.requires_certificate {
            Criticality::BestEffort
        } else {
            Criticality::Structural
        }
    }

    fn precondition(&self, ctx: &StepContext<'_, Host>) -> Precondition {
        if !self.requires_certificate {
            return Precondition::Met;
        }
        match ctx.host.certs.expiry(&self.deployment.domain) {
            Ok(Some(_)) => Precondition::Met,
            Ok(None) => Precondition::unmet("certificate not issued"),
            Err(e) => Precondition::unmet(format!("certificate state unknown: {e}")),
        }
    }

    fn check(&self, ctx: &StepContext<'_, Host>) -> CheckResult {
        let desired = match self.renderer.render(self.template, &self.deployment) {
            Ok(rendered) => rendered,
            Err(e) => return CheckResult::unknown(format!("render failed: {e:#}")),
        };

        let current = match fs::read(&self.physical) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return CheckResult::unknown(format!("{}: {e}", display(&self.physical))),
        };

        let result = match &current {
            None => CheckResult::not_satisfied("missing"),
            Some(bytes) if blake3::hash(bytes) != desired.hash() => {
                CheckResult::not_satisfied("content differs")
            }
            Some(_) => match fs::metadata(&self.physical) {
                Ok(meta) => {
                    let mode = permission_bits(meta.permissions().mode());
                    CheckResult::from_bool(
                        mode == self.mode,
                        format!("mode is {mode:04o}, want {:04o}", self.mode),
                    )
                }
                Err(e) => CheckResult::unknown(e.to_string()),
            },
        };

        if ctx.dry_run && ctx.verbose && !result.is_satisfied() {
            let current = current.as_deref().map(String::from_utf8_lossy);
            self.show_diff(current.as_deref(), desired.text());
        }
        result
    }

    fn apply(&self, _ctx: &StepContext<'_, Host>) -> Result<()> {
        let rendered = self.renderer.render(self.template, &self.deployment)?;
        write_atomic(&self.physical, rendered.as_bytes(), self.mode)
            .with_context(|| format!("Failed to install {}", self.logical.display()))?;
        log::debug!(
            "Wrote {} ({} bytes, {:04o})",
            self.logical.display(),
            rendered.as_bytes().len(),
            self.mode
        );
        Ok(())
    }
}

/// Write `contents` to `dest` through a temp file and a rename
pub fn write_atomic(dest: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let staged = stage(dest, contents, mode)?;
    commit(staged, dest)
}

/// First half of [`write_atomic`]: a synced temp file next to `dest`
///
/// Dropping the returned handle deletes the temp file and leaves `dest`
/// untouched.
pub fn stage(dest: &Path, contents: &[u8], mode: u32) -> Result<NamedTempFile> {
    let parent = dest
        .parent()
        .with_context(|| format!("{} has no parent directory", dest.display()))?;
    fs::create_dir_all(parent).map_err(fs_error(parent))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(fs_error(parent))?;
    // Mode before content
    tmp.as_file()
        .set_permissions(fs::Permissions::from_mode(mode))
        .map_err(fs_error(tmp.path()))?;
    tmp.write_all(contents).map_err(fs_error(tmp.path()))?;
    tmp.as_file().sync_all().map_err(fs_error(tmp.path()))?;
    Ok(tmp)
}

/// Second half of [`write_atomic`]: rename over `dest` and sync the directory
pub fn commit(staged: NamedTempFile, dest: &Path) -> Result<()> {
    staged
        .persist(dest)
        .map_err(|e| fs_error(dest)(e.error))?;

    if let Some(parent) = dest.parent() {
        let synced = fs::File::open(parent).and_then(|dir| dir.sync_all());
        if let Err(e) = synced {
            log::debug!("Could not sync {}: {}", parent.display(), e);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DesiredState, TlsConfig};
    use crate::secret::SecretSource;
    use crate::steps::testing::{apply, check};
    use crate::validation::validate;
    use chrono::{Duration, Utc};
    use hostkit::MockHost;
    use tempfile::TempDir;

    fn deployment() -> Arc<Deployment> {
        let state = DesiredState {
            domain: Some("example.test".to_string()),
            app_dir: Some("/srv/example".to_string()),
            port: Some(8001),
            api_key: Some(SecretSource::Value("abc".to_string())),
            tls: TlsConfig {
                email: Some("ops@example.test".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        Arc::new(validate(&state).unwrap())
    }

    fn step(dir: &TempDir, template: Template) -> FileRender {
        let d = deployment();
        let physical = dir
            .path()
            .join(template.destination(&d).strip_prefix("/").unwrap());
        FileRender::new(template, d, Arc::new(Renderer::new().unwrap()), physical)
    }

    #[test]
    fn test_render_and_converge() {
        let dir = TempDir::new().unwrap();
        let host = Host::from_mock(&MockHost::new());
        let step = step(&dir, Template::ServiceUnit);

        assert_eq!(check(&step, &host), CheckResult::not_satisfied("missing"));
        apply(&step, &host).unwrap();
        assert!(check(&step, &host).is_satisfied());

        let meta = fs::metadata(&step.physical).unwrap();
        assert_eq!(meta.permissions().mode() & 0o7777, 0o600);
        let text = fs::read_to_string(&step.physical).unwrap();
        assert!(text.contains("YOUTUBE_API_KEY=abc"));
    }

    #[test]
    fn test_drift_detected() {
        let dir = TempDir::new().unwrap();
        let host = Host::from_mock(&MockHost::new());
        let step = step(&dir, Template::ProxySite);
        apply(&step, &host).unwrap();

        fs::write(&step.physical, "server {}\n").unwrap();
        assert_eq!(
            check(&step, &host),
            CheckResult::not_satisfied("content differs")
        );

        apply(&step, &host).unwrap();
        fs::set_permissions(&step.physical, fs::Permissions::from_mode(0o600)).unwrap();
        assert_eq!(
            check(&step, &host),
            CheckResult::not_satisfied("mode is 0600, want 0644")
        );
    }

    #[test]
    fn test_unreadable_secret_is_unknown_then_fails() {
        let dir = TempDir::new().unwrap();
        let host = Host::from_mock(&MockHost::new());
        let mut d = (*deployment()).clone();
        d.api_key = SecretSource::Env("HOSTFORM_TEST_NO_SUCH_KEY".to_string());
        let step = FileRender::new(
            Template::ServiceUnit,
            Arc::new(d),
            Arc::new(Renderer::new().unwrap()),
            dir.path().join("app.service"),
        );

        assert!(matches!(check(&step, &host), CheckResult::Unknown { .. }));
        assert!(apply(&step, &host).is_err());
        assert!(!step.physical.exists());
    }

    #[test]
    fn test_tls_file_waits_for_certificate() {
        let dir = TempDir::new().unwrap();
        let changed = std::collections::HashSet::new();
        let step = step(&dir, Template::ProxyTls);
        assert_eq!(step.criticality(), Criticality::BestEffort);

        let host = Host::from_mock(&MockHost::new());
        assert_eq!(
            step.precondition(&StepContext::new(&host, &changed, false, false)),
            Precondition::unmet("certificate not issued")
        );

        let host = Host::from_mock(
            &MockHost::new().with_certificate("example.test", Utc::now() + Duration::days(60)),
        );
        assert_eq!(
            step.precondition(&StepContext::new(&host, &changed, false, false)),
            Precondition::Met
        );
    }

    #[test]
    fn test_write_atomic_replaces_content() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("etc/app.conf");
        write_atomic(&dest, b"old\n", 0o644).unwrap();
        write_atomic(&dest, b"new\n", 0o640).unwrap();

        assert_eq!(fs::read_to_string(&dest).unwrap(), "new\n");
        assert_eq!(
            fs::metadata(&dest).unwrap().permissions().mode() & 0o7777,
            0o640
        );
        assert_eq!(fs::read_dir(dest.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn test_interrupted_write_keeps_old_content() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("app.conf");
        fs::write(&dest, "old content\n").unwrap();

        let staged = stage(&dest, b"new content that never lands\n", 0o644).unwrap();
        let tmp_path = staged.path().to_path_buf();
        assert!(tmp_path.exists());
        // Before the rename the destination is still fully old
        assert_eq!(fs::read_to_string(&dest).unwrap(), "old content\n");

        // Interrupted here: the staged file is abandoned
        drop(staged);
        assert!(!tmp_path.exists());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "old content\n");

        let staged = stage(&dest, b"new content\n", 0o644).unwrap();
        commit(staged, &dest).unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), "new content\n");
    }
}
