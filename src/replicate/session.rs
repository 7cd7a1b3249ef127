//! Endpoint sessions: one authenticated connection per role, rebuilt on failure.

use log::info;
use std::fmt;

use super::folders::{self, RemoteFolder};
use super::retry::RetryPolicy;
use super::types::{FetchedMessage, FlagSet};
use crate::error::{Error, Result};

/// Transport security for a live endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    #[default]
    Tls,
    Starttls,
    Plain,
}

impl Security {
    pub fn default_port(self) -> u16 {
        match self {
            Security::Tls => 993,
            Security::Starttls | Security::Plain => 143,
        }
    }
}

/// Connection details for a live endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub host: String,
    pub port: Option<u16>,
    pub user: String,
    pub password: String,
    pub security: Security,
}

impl Credentials {
    pub fn new(host: &str, user: &str, password: &str) -> Self {
        Self {
            host: host.to_string(),
            port: None,
            user: user.to_string(),
            password: password.to_string(),
            security: Security::default(),
        }
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.security.default_port())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("port", &self.port())
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("security", &self.security)
            .finish()
    }
}

/// One authenticated connection to a mail server.
///
/// Folder names passed in are the server's native names.
pub trait MailServer {
    /// Full folder tree in one round trip.
    fn list_folders(&mut self) -> Result<Vec<RemoteFolder>>;

    /// The server's hierarchy separator, if it has one.
    fn hierarchy_delimiter(&mut self) -> Result<Option<String>>;

    fn folder_exists(&mut self, folder: &str) -> Result<bool>;

    fn select(&mut self, folder: &str, readonly: bool) -> Result<()>;

    /// Every UID in the selected folder, ascending.
    fn search_uids(&mut self) -> Result<Vec<u32>>;

    /// Flags, internal date and full body. `None` when the server has no
    /// such message.
    fn fetch(&mut self, uid: u32) -> Result<Option<FetchedMessage>>;

    fn append(
        &mut self,
        folder: &str,
        flags: &FlagSet,
        internal_timestamp: i64,
        body: &[u8],
    ) -> Result<()>;

    fn create(&mut self, folder: &str) -> Result<()>;
}

/// Opens and authenticates new connections.
pub trait Connector {
    fn connect(&self, credentials: &Credentials) -> Result<Box<dyn MailServer>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Source,
    Destination,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Source => f.write_str("source"),
            Role::Destination => f.write_str("destination"),
        }
    }
}

/// A live endpoint owned by exactly one role for the whole run.
///
/// The connection is opened lazily and thrown away whenever an operation
/// fails; the next attempt reconnects, reauthenticates and reselects the
/// folder that was last selected.
pub struct Endpoint<'c> {
    role: Role,
    credentials: Credentials,
    connector: &'c dyn Connector,
    server: Option<Box<dyn MailServer>>,
    delimiter: Option<String>,
    selected: Option<(String, bool)>,
}

impl<'c> Endpoint<'c> {
    pub fn new(role: Role, credentials: Credentials, connector: &'c dyn Connector) -> Self {
        Self {
            role,
            credentials,
            connector,
            server: None,
            delimiter: None,
            selected: None,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn is_connected(&self) -> bool {
        self.server.is_some()
    }

    /// Connect (with retry) if there is no live session yet.
    pub fn connect(&mut self, policy: &RetryPolicy) -> Result<()> {
        self.with_retry(policy, "connect", |_| Ok(()))
    }

    fn ensure_connected(&mut self) -> Result<&mut dyn MailServer> {
        if self.server.is_none() {
            info!(
                "Connecting to {} {}:{} as {}",
                self.role,
                self.credentials.host,
                self.credentials.port(),
                self.credentials.user
            );
            let mut server = self.connector.connect(&self.credentials)?;
            self.delimiter = server.hierarchy_delimiter()?;
            if let Some((folder, readonly)) = &self.selected {
                server.select(folder, *readonly)?;
            }
            self.server = Some(server);
        }
        match self.server.as_deref_mut() {
            Some(server) => Ok(server),
            None => Err(Error::connection(&self.credentials.host, "no session")),
        }
    }

    /// Run `op` against a live session, reconnecting between failed attempts.
    pub fn with_retry<T>(
        &mut self,
        policy: &RetryPolicy,
        action: &str,
        mut op: impl FnMut(&mut dyn MailServer) -> Result<T>,
    ) -> Result<T> {
        let action = format!("{} {}", self.role, action);
        policy.run(&action, || {
            let result = match self.ensure_connected() {
                Ok(server) => op(server),
                Err(err) => Err(err),
            };
            if result.is_err() {
                self.server = None;
            }
            result
        })
    }

    /// Select `folder` (native name) and remember it for reconnects.
    pub fn select(&mut self, policy: &RetryPolicy, folder: &str, readonly: bool) -> Result<()> {
        self.selected = Some((folder.to_string(), readonly));
        self.with_retry(policy, "select", |server| server.select(folder, readonly))
    }

    /// Map a canonical `/` path to this server's native folder name.
    pub fn native_name(&self, canonical: &str) -> String {
        folders::to_native(canonical, self.delimiter.as_deref())
    }
}
