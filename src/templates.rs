//! Configuration file rendering
//!
//! Templates live in `templates/` and are compiled into the binary. Values
//! reach them from a validated [`Deployment`] only; two filters quote them
//! for the syntax they land in:
//!
//! - `shell`: POSIX single quotes (`it's` -> `'it'\''s'`)
//! - `unit`: systemd double quotes, `\` `"` and `%` escaped; with
//!   `exec=true` also `$` (command lines expand variables, `Environment=`
//!   does not). Control characters are refused; a line break would start a
//!   new directive
//!
//! Tera rejects undefined variables, so a template referring to a value the
//! context does not carry fails to render instead of emitting a blank.

use crate::config::Deployment;
use crate::paths;
use anyhow::{Context as _, Result, bail};
use secrecy::ExposeSecret;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use tera::{Context, Tera, Value};
use zeroize::Zeroizing;

const SERVICE_UNIT: &str = include_str!("../templates/service-unit.tera");
const PROXY_SITE: &str = include_str!("../templates/proxy-site.tera");
const PROXY_TLS: &str = include_str!("../templates/proxy-tls.tera");
const PROXY_LOCATION: &str = include_str!("../templates/proxy-location.tera");
const BACKUP_SCRIPT: &str = include_str!("../templates/backup-script.tera");
const UPDATE_SCRIPT: &str = include_str!("../templates/update-script.tera");

/// A rendered configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Template {
    ServiceUnit,
    ProxySite,
    ProxyTls,
    BackupScript,
    UpdateScript,
}

impl Template {
    #[cfg(test)]
    pub const ALL: [Self; 5] = [
        Self::ServiceUnit,
        Self::ProxySite,
        Self::ProxyTls,
        Self::BackupScript,
        Self::UpdateScript,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::ServiceUnit => "service-unit",
            Self::ProxySite => "proxy-site",
            Self::ProxyTls => "proxy-tls",
            Self::BackupScript => "backup-script",
            Self::UpdateScript => "update-script",
        }
    }

    /// Logical path the file is installed at
    pub fn destination(self, d: &Deployment) -> PathBuf {
        match self {
            Self::ServiceUnit => d.unit_file(),
            Self::ProxySite => d.proxy_site(),
            Self::ProxyTls => d.proxy_tls(),
            Self::BackupScript => d.backup_script(),
            Self::UpdateScript => d.update_script(),
        }
    }

    /// File mode of the installed file
    pub fn mode(self) -> u32 {
        match self {
            // carries the API key
            Self::ServiceUnit => 0o600,
            Self::ProxySite | Self::ProxyTls => 0o644,
            Self::BackupScript | Self::UpdateScript => 0o755,
        }
    }

    /// Whether the rendered text contains a secret
    pub fn is_sensitive(self) -> bool {
        self == Self::ServiceUnit
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Output of a render
///
/// The buffer is zeroed on drop, and `Debug` never prints sensitive text.
pub struct Rendered {
    text: Zeroizing<String>,
    sensitive: bool,
}

impl Rendered {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    pub fn is_sensitive(&self) -> bool {
        self.sensitive
    }

    /// BLAKE3 digest of the content
    pub fn hash(&self) -> blake3::Hash {
        blake3::hash(self.text.as_bytes())
    }
}

impl fmt::Debug for Rendered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sensitive {
            write!(f, "Rendered(<{} bytes redacted>)", self.text.len())
        } else {
            f.debug_struct("Rendered")
                .field("text", &self.text.as_str())
                .finish()
        }
    }
}

/// Renders the built-in templates
#[derive(Debug)]
pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.register_filter("shell", shell_filter);
        tera.register_filter("unit", unit_filter);
        tera.add_raw_templates(vec![
            (Template::ServiceUnit.name(), SERVICE_UNIT),
            (Template::ProxySite.name(), PROXY_SITE),
            (Template::ProxyTls.name(), PROXY_TLS),
            ("proxy-location", PROXY_LOCATION),
            (Template::BackupScript.name(), BACKUP_SCRIPT),
            (Template::UpdateScript.name(), UPDATE_SCRIPT),
        ])
        .context("Failed to load built-in templates")?;
        Ok(Self { tera })
    }

    /// Render `template` for `d`
    ///
    /// The service unit reads the API key here, and only here.
    pub fn render(&self, template: Template, d: &Deployment) -> Result<Rendered> {
        let mut context = base_context(d);

        if template.is_sensitive() {
            let secret = d
                .api_key
                .acquire()
                .with_context(|| format!("Could not read API key from {}", d.api_key))?;
            let pair = Zeroizing::new(format!("{}={}", d.api_key_env, secret.expose_secret()));
            let quoted = Zeroizing::new(unit_quote(&pair, false)?);
            let line = Zeroizing::new(format!("Environment={}", quoted.as_str()));
            context.insert("api_key_line", line.as_str());
        } else {
            context.insert("api_key_line", "");
        }

        let result = self.tera.render(template.name(), &context);
        if let Some(Value::String(line)) = context.remove("api_key_line") {
            drop(Zeroizing::new(line));
        }
        let text = Zeroizing::new(
            result.with_context(|| format!("Failed to render {template}"))?,
        );

        log::trace!("Rendered {} ({} bytes)", template, text.len());
        Ok(Rendered {
            text,
            sensitive: template.is_sensitive(),
        })
    }
}

fn base_context(d: &Deployment) -> Context {
    let mut environment = vec![format!("ALLOWED_DOMAINS={}", d.allowed_origins.join(","))];
    environment.extend(d.environment.iter().map(|(k, v)| format!("{k}={v}")));

    let mut context = Context::new();
    context.insert("domain", &d.domain);
    context.insert("service", &d.service);
    context.insert("user", &d.user);
    context.insert("group", &d.group);
    context.insert("owner", &format!("{}:{}", d.user, d.group));
    context.insert("app_dir", &d.app_dir.display().to_string());
    context.insert(
        "uvicorn",
        &d.venv_dir().join("bin/uvicorn").display().to_string(),
    );
    context.insert("entrypoint", &d.entrypoint);
    context.insert("port", &d.port);
    context.insert("environment", &environment);
    context.insert("server_names", &d.server_names());
    context.insert("acme_webroot", paths::ACME_WEBROOT);
    context.insert("cert_dir", &d.cert_dir().display().to_string());
    context.insert("backup_root", &d.backup_root.display().to_string());
    context.insert("retention_days", &d.backup_retention_days);
    context.insert("repository", &d.repository);
    context.insert("python_packages", &d.python_packages);
    context
}

/// POSIX shell single-quoting
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// systemd double-quoting
pub fn unit_quote(s: &str, exec: bool) -> Result<String> {
    if s.chars().any(char::is_control) {
        bail!("control character in a unit file value");
    }
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str(r"\\"),
            '"' => out.push_str("\\\""),
            '%' => out.push_str("%%"),
            '$' if exec => out.push_str("$$"),
            c => out.push(c),
        }
    }
    out.push('"');
    Ok(out)
}

fn filter_input(value: &Value, filter: &str) -> tera::Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(tera::Error::msg(format!(
            "filter `{filter}` expects a string, got {other}"
        ))),
    }
}

fn shell_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    Ok(Value::String(shell_quote(&filter_input(value, "shell")?)))
}

fn unit_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let exec = args
        .get("exec")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    unit_quote(&filter_input(value, "unit")?, exec)
        .map(Value::String)
        .map_err(|e| tera::Error::msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DesiredState, TlsConfig};
    use crate::secret::SecretSource;
    use crate::validation::validate;

    fn deployment() -> Deployment {
        let mut state = DesiredState {
            domain: Some("example.test".to_string()),
            app_dir: Some("/srv/example".to_string()),
            port: Some(8001),
            api_key: Some(SecretSource::Value("k3y-\"quoted\"-100%".to_string())),
            tls: TlsConfig {
                email: Some("ops@example.test".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        state
            .service
            .environment
            .insert("LOG_LEVEL".to_string(), "info".to_string());
        validate(&state).unwrap()
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/srv/app"), "'/srv/app'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote("$(rm -rf /)"), "'$(rm -rf /)'");
    }

    #[test]
    fn test_unit_quote() {
        assert_eq!(unit_quote("A=b", false).unwrap(), "\"A=b\"");
        assert_eq!(
            unit_quote(r#"a"b\c%d$e"#, false).unwrap(),
            r#""a\"b\\c%%d$e""#
        );
        assert_eq!(unit_quote("$HOME", true).unwrap(), "\"$$HOME\"");
        assert!(unit_quote("a\nExecStartPre=/bin/true", false).is_err());
        assert!(unit_quote("a\rb", true).is_err());
    }

    #[test]
    fn test_service_unit() {
        let renderer = Renderer::new().unwrap();
        let out = renderer.render(Template::ServiceUnit, &deployment()).unwrap();
        let text = out.text();

        assert!(out.is_sensitive());
        assert!(text.contains("[Unit]\n"));
        assert!(text.contains("[Service]\n"));
        assert!(text.contains("[Install]\nWantedBy=multi-user.target"));
        assert!(text.contains("User=www-data\nGroup=www-data\n"));
        assert!(text.contains("WorkingDirectory=/srv/example\n"));
        assert!(text.contains("Environment=\"ALLOWED_DOMAINS=example.test,www.example.test\"\n"));
        assert!(text.contains("Environment=\"LOG_LEVEL=info\"\n"));
        assert!(text.contains(r#"Environment="YOUTUBE_API_KEY=k3y-\"quoted\"-100%%""#));
        assert!(text.contains(
            "ExecStart=\"/srv/example/venv/bin/uvicorn\" \"main:app\" --host 127.0.0.1 --port 8001\n"
        ));
        assert!(!text.contains("\n\n\n"));
    }

    #[test]
    fn test_sensitive_render_is_redacted() {
        let renderer = Renderer::new().unwrap();
        let out = renderer.render(Template::ServiceUnit, &deployment()).unwrap();
        let debug = format!("{out:?}");
        assert!(!debug.contains("k3y"));
        assert!(debug.contains("redacted"));

        let site = renderer.render(Template::ProxySite, &deployment()).unwrap();
        assert!(!site.is_sensitive());
        assert!(format!("{site:?}").contains("proxy_pass"));
    }

    #[test]
    fn test_missing_secret_fails_render() {
        let mut d = deployment();
        d.api_key = SecretSource::Env("HOSTFORM_TEST_UNSET_KEY".to_string());
        let renderer = Renderer::new().unwrap();
        let err = renderer.render(Template::ServiceUnit, &d).unwrap_err();
        assert!(format!("{err:#}").contains("HOSTFORM_TEST_UNSET_KEY"));
        // other templates do not need the key
        assert!(renderer.render(Template::ProxySite, &d).is_ok());
    }

    #[test]
    fn test_multiline_secret_cannot_inject_directives() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("api-key");
        std::fs::write(&path, "abc\nExecStartPre=/bin/touch /tmp/hijack\n").unwrap();
        let mut d = deployment();
        d.api_key = SecretSource::File(path);

        let renderer = Renderer::new().unwrap();
        let err = renderer.render(Template::ServiceUnit, &d).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("control character"));
        assert!(!message.contains("ExecStartPre"));
    }

    #[test]
    fn test_proxy_site() {
        let renderer = Renderer::new().unwrap();
        let out = renderer.render(Template::ProxySite, &deployment()).unwrap();
        let text = out.text();

        assert!(text.contains("listen 80;"));
        assert!(text.contains("server_name example.test www.example.test;"));
        assert!(text.contains("root /var/www/_letsencrypt;"));
        assert!(text.contains("proxy_pass http://127.0.0.1:8001;"));
        assert!(text.contains("proxy_set_header Host $host;"));
        assert!(text.contains("proxy_set_header X-Real-IP $remote_addr;"));
        assert!(text.contains("proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;"));
        assert!(text.contains("proxy_set_header X-Forwarded-Proto $scheme;"));
        assert!(!text.contains("ssl_certificate"));
    }

    #[test]
    fn test_proxy_tls() {
        let renderer = Renderer::new().unwrap();
        let out = renderer.render(Template::ProxyTls, &deployment()).unwrap();
        let text = out.text();

        assert!(text.contains("listen 443 ssl;"));
        assert!(text.contains("ssl_certificate /etc/letsencrypt/live/example.test/fullchain.pem;"));
        assert!(text.contains("ssl_certificate_key /etc/letsencrypt/live/example.test/privkey.pem;"));
        assert!(text.contains("proxy_pass http://127.0.0.1:8001;"));
    }

    #[test]
    fn test_backup_script() {
        let renderer = Renderer::new().unwrap();
        let out = renderer.render(Template::BackupScript, &deployment()).unwrap();
        let text = out.text();

        assert!(text.starts_with("#!/bin/sh\n"));
        assert!(text.contains("APP_DIR='/srv/example'\n"));
        assert!(text.contains("BACKUP_ROOT='/var/backups/example'\n"));
        assert!(text.contains("RETENTION_DAYS=7\n"));
        assert!(text.contains("tar --exclude=./venv -czf \"$ARCHIVE\" -C \"$APP_DIR\" ."));
        assert!(text.contains("-mtime +\"$RETENTION_DAYS\" -delete"));
    }

    #[test]
    fn test_update_script() {
        let mut d = deployment();
        d.repository = Some("https://git.example.test/app.git".to_string());
        let renderer = Renderer::new().unwrap();
        let out = renderer.render(Template::UpdateScript, &d).unwrap();
        let text = out.text();

        assert!(text.contains("git pull --ff-only 'https://git.example.test/app.git'"));
        assert!(text.contains("\"$PIP\" install --upgrade 'fastapi' 'uvicorn[standard]'"));
        assert!(text.contains("chown -R 'www-data:www-data' \"$APP_DIR\""));
        assert!(text.contains("systemctl restart \"$SERVICE.service\""));

        d.repository = None;
        let out = renderer.render(Template::UpdateScript, &d).unwrap();
        assert!(out.text().contains("    git pull --ff-only\n"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let renderer = Renderer::new().unwrap();
        let d = deployment();
        for template in Template::ALL {
            let a = renderer.render(template, &d).unwrap();
            let b = renderer.render(template, &d).unwrap();
            assert_eq!(a.hash(), b.hash(), "{template}");
        }
    }

    #[test]
    fn test_undefined_variable_fails_fast() {
        let mut renderer = Renderer::new().unwrap();
        let result = renderer.tera.render_str("{{ not_provided }}", &Context::new());
        assert!(result.is_err());
    }

    #[test]
    fn test_destinations_and_modes() {
        let d = deployment();
        assert_eq!(
            Template::ServiceUnit.destination(&d),
            PathBuf::from("/etc/systemd/system/example.service")
        );
        assert_eq!(
            Template::ProxySite.destination(&d),
            PathBuf::from("/etc/nginx/sites-available/example")
        );
        assert_eq!(
            Template::ProxyTls.destination(&d),
            PathBuf::from("/etc/nginx/conf.d/example-tls.conf")
        );
        assert_eq!(
            Template::BackupScript.destination(&d),
            PathBuf::from("/usr/local/bin/example-backup")
        );
        assert_eq!(Template::ServiceUnit.mode(), 0o600);
        assert_eq!(Template::UpdateScript.mode(), 0o755);
    }
}
