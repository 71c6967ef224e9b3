//! Plan builder - desired state to an ordered step list
//!
//! The order is fixed:
//!
//! 1. OS packages
//! 2. Directories (app, data dirs, backup root, ACME webroot)
//! 3. Virtual environment
//! 4. Rendered files (service unit, proxy site + link, scripts)
//! 5. Ownership of the app dir
//! 6. Certificate, then the TLS server block that needs it
//! 7. Firewall
//! 8. Backup job
//! 9. Service start
//! 10. Proxy reload

use crate::config::{Deployment, DesiredState};
use crate::error::ProvisionError;
use crate::paths::{self, Layout};
use crate::steps::{
    CertificateIssue, DirectoryEnsure, FileRender, FirewallRule, OwnershipEnsure, PackageInstall,
    ProxyReload, ScheduledJobInstall, ServiceEnable, SymlinkEnsure, VirtualEnvCreate,
};
use crate::templates::{Renderer, Template};
use crate::validation::validate;
use anyhow::Result;
use declarative::{Plan, Step};
use hostkit::Host;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Validate `state` and build its plan
///
/// Nothing is executed here; an invalid state fails with
/// [`ProvisionError::Validation`] before any step exists.
pub fn build(state: &DesiredState, layout: &Layout) -> Result<Plan<Host>> {
    let deployment = validate(state).map_err(ProvisionError::from)?;
    plan_for(Arc::new(deployment), layout)
}

/// Build the plan of an already validated deployment
pub fn plan_for(d: Arc<Deployment>, layout: &Layout) -> Result<Plan<Host>> {
    let renderer = Arc::new(Renderer::new()?);
    let mut plan = Plan::new();

    // 1. packages
    plan.push(Box::new(PackageInstall::new(d.packages.clone())));

    // 2. directories
    let dir = |logical: &Path, owner: &str, group: &str, mode: u32| DirectoryEnsure {
        logical: logical.to_path_buf(),
        physical: layout.physical(logical),
        owner: owner.to_string(),
        group: group.to_string(),
        mode,
    };
    plan.push(Box::new(dir(&d.app_dir, &d.user, &d.group, 0o755)));
    for data_dir in &d.data_dirs {
        plan.push(Box::new(dir(data_dir, &d.user, &d.group, 0o750)));
    }
    plan.push(Box::new(dir(&d.backup_root, "root", "root", 0o700)));
    if d.tls.is_some() {
        plan.push(Box::new(dir(
            Path::new(paths::ACME_WEBROOT),
            "root",
            "root",
            0o755,
        )));
    }

    // 3. venv
    let venv = d.venv_dir();
    plan.push(Box::new(VirtualEnvCreate {
        physical: layout.physical(&venv),
        logical: venv,
        interpreter: d.interpreter(),
        packages: d.python_packages.clone(),
    }));

    // 4. rendered files
    let file = |template: Template| {
        let physical = layout.physical(&template.destination(&d));
        FileRender::new(template, Arc::clone(&d), Arc::clone(&renderer), physical)
    };
    let unit = file(Template::ServiceUnit);
    let site = file(Template::ProxySite);
    let link = SymlinkEnsure {
        name: "proxy-site".to_string(),
        target: d.proxy_site(),
        link_logical: d.proxy_site_link(),
        link_physical: layout.physical(&d.proxy_site_link()),
    };
    let unit_id = unit.id();
    let mut proxy_watches = vec![site.id(), link.id()];
    plan.push(Box::new(unit));
    plan.push(Box::new(site));
    plan.push(Box::new(link));
    plan.push(Box::new(file(Template::BackupScript)));
    plan.push(Box::new(file(Template::UpdateScript)));

    // 5. permissions
    plan.push(Box::new(OwnershipEnsure {
        logical: d.app_dir.clone(),
        physical: layout.physical(&d.app_dir),
        user: d.user.clone(),
        group: d.group.clone(),
    }));

    // 6. certificate
    if let Some(tls) = &d.tls {
        let cert = CertificateIssue {
            domain: d.domain.clone(),
            alt_names: tls.alt_names.clone(),
            email: tls.email.clone(),
            renew_before_days: tls.renew_before_days,
            expected_ip: tls.expected_ip,
            webroot: PathBuf::from(paths::ACME_WEBROOT),
        };
        let tls_file = file(Template::ProxyTls);
        proxy_watches.push(cert.id());
        proxy_watches.push(tls_file.id());
        plan.push(Box::new(cert));
        plan.push(Box::new(tls_file));
    }

    // 7. firewall
    if !d.firewall_ports.is_empty() {
        plan.push(Box::new(FirewallRule {
            rules: d.firewall_ports.clone(),
        }));
    }

    // 8. backup job
    plan.push(Box::new(ScheduledJobInstall {
        name: "backup".to_string(),
        line: d.backup_job(),
    }));

    // 9. service
    plan.push(Box::new(ServiceEnable {
        name: d.service.clone(),
        restart_on: vec![unit_id],
        start_timeout: d.start_timeout,
    }));

    // 10. proxy
    plan.push(Box::new(ProxyReload {
        watched: proxy_watches,
    }));

    log::debug!("Planned {} steps for {}", plan.len(), d.domain);
    Ok(plan)
}
