//! Endpoint configuration from the command line and an optional TOML file.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::Cli;
use crate::replicate::EndpointConfig;
use crate::replicate::retry::RetryPolicy;
use crate::replicate::session::{Credentials, Security};

/// One `[source]` or `[destination]` table.
///
/// Either `store = "path"` or a server with `host` and `user`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndpointSection {
    #[serde(default)]
    pub host: String,
    pub port: Option<u16>,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_cmd: String,
    pub security: Option<Security>,
    pub store: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RetrySection {
    pub delay_secs: Option<u64>,
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    pub source: Option<EndpointSection>,
    pub destination: Option<EndpointSection>,
    #[serde(default)]
    pub retry: RetrySection,
}

/// Parse a config file.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Config not found at {}", path.display()))?;
    let config: ConfigFile =
        toml::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))?;
    Ok(config)
}

/// Resolve password: inline value if set, else run password_cmd.
pub fn resolve_password(section: &EndpointSection) -> Result<String> {
    if !section.password.is_empty() {
        return Ok(section.password.clone());
    }
    if !section.password_cmd.is_empty() {
        let output = std::process::Command::new("sh")
            .arg("-c")
            .arg(&section.password_cmd)
            .output()?;
        if !output.status.success() {
            bail!(
                "password_cmd failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
    }
    bail!("Endpoint {:?} has no password or password_cmd", section.user)
}

impl EndpointSection {
    pub fn to_endpoint(&self, security_override: Option<Security>) -> Result<EndpointConfig> {
        if let Some(store) = &self.store {
            if !self.host.is_empty() {
                bail!("Endpoint sets both store and host ({})", self.host);
            }
            return Ok(EndpointConfig::Store(store.clone()));
        }
        if self.host.is_empty() || self.user.is_empty() {
            bail!("Endpoint needs either store or host and user");
        }
        let (host, port) = parse_host(&self.host)?;
        Ok(EndpointConfig::Server(Credentials {
            host,
            port: self.port.or(port),
            user: self.user.clone(),
            password: resolve_password(self)?,
            security: security_override.or(self.security).unwrap_or_default(),
        }))
    }
}

/// Split `host[:port]`.
pub fn parse_host(value: &str) -> Result<(String, Option<u16>)> {
    match value.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && !host.contains(':') => {
            let port = port
                .parse::<u16>()
                .with_context(|| format!("Invalid port in {}", value))?;
            Ok((host.to_string(), Some(port)))
        }
        _ => Ok((value.to_string(), None)),
    }
}

/// Interpret a `--source`/`--destination` value list.
///
/// Three values name a server, one value names a store file.
pub fn parse_endpoint_args(values: &[String], security: Option<Security>) -> Result<EndpointConfig> {
    match values {
        [host, user, password] => {
            let (host, port) = parse_host(host)?;
            Ok(EndpointConfig::Server(Credentials {
                host,
                port,
                user: user.clone(),
                password: password.clone(),
                security: security.unwrap_or_default(),
            }))
        }
        [path] => Ok(EndpointConfig::Store(PathBuf::from(path))),
        other => bail!(
            "Expected HOST USER PASSWORD or a store PATH, got {} value(s)",
            other.len()
        ),
    }
}

/// Everything a run needs, after merging the CLI over the config file.
#[derive(Debug, Clone)]
pub struct Settings {
    pub source: Option<EndpointConfig>,
    pub destination: Option<EndpointConfig>,
    pub policy: RetryPolicy,
}

impl Settings {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => load_config(path)?,
            None => ConfigFile::default(),
        };
        Self::merge(cli, file)
    }

    /// CLI values win over file values.
    pub fn merge(cli: &Cli, file: ConfigFile) -> Result<Self> {
        let source = resolve_role(&cli.source, cli.source_security, file.source.as_ref())
            .context("Invalid source")?;
        let destination = resolve_role(
            &cli.destination,
            cli.destination_security,
            file.destination.as_ref(),
        )
        .context("Invalid destination")?;

        let mut policy = RetryPolicy::default();
        if let Some(secs) = cli.retry_delay.or(file.retry.delay_secs) {
            policy.delay = Duration::from_secs(secs);
        }
        policy.max_attempts = cli.max_attempts.or(file.retry.max_attempts);
        if policy.max_attempts == Some(0) {
            bail!("max_attempts must be at least 1");
        }

        Ok(Self {
            source,
            destination,
            policy,
        })
    }
}

fn resolve_role(
    args: &[String],
    security: Option<Security>,
    section: Option<&EndpointSection>,
) -> Result<Option<EndpointConfig>> {
    if !args.is_empty() {
        return parse_endpoint_args(args, security).map(Some);
    }
    section.map(|s| s.to_endpoint(security)).transpose()
}
