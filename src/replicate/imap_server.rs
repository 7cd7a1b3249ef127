//! `MailServer` over the blocking `imap` crate.

use imap::types::NameAttribute;
use imap::Session;
use log::debug;
use std::borrow::Cow;
use std::io::{Read, Write};
use std::net::TcpStream;

use super::folders::RemoteFolder;
use super::session::{Connector, Credentials, MailServer, Security};
use super::types::{FetchedMessage, Flag, FlagSet};
use crate::error::{Error, Result};

const FETCH_QUERY: &str = "(FLAGS INTERNALDATE BODY.PEEK[])";

/// An authenticated IMAP session.
pub struct ImapServer<T: Read + Write> {
    host: String,
    session: Session<T>,
}

impl<T: Read + Write> ImapServer<T> {
    pub fn new(host: &str, session: Session<T>) -> Self {
        Self {
            host: host.to_string(),
            session,
        }
    }

    fn classify(&self, err: imap::error::Error) -> Error {
        use imap::error::Error as ImapError;
        match err {
            e @ (ImapError::Io(_)
            | ImapError::ConnectionLost
            | ImapError::Tls(_)
            | ImapError::TlsHandshake(_)) => Error::connection(&self.host, e),
            ImapError::No(msg) | ImapError::Bad(msg) => Error::Protocol(msg),
            other => Error::Protocol(other.to_string()),
        }
    }
}

/// IMAP quoted string. `Session::list` sends its pattern verbatim.
fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn is_noselect(attr: &NameAttribute<'_>) -> bool {
    match attr {
        NameAttribute::NoSelect => true,
        NameAttribute::Custom(name) => name.eq_ignore_ascii_case("\\NonExistent"),
        _ => false,
    }
}

impl<T: Read + Write> MailServer for ImapServer<T> {
    fn list_folders(&mut self) -> Result<Vec<RemoteFolder>> {
        let names = self
            .session
            .list(Some(""), Some("*"))
            .map_err(|e| self.classify(e))?;
        Ok(names
            .iter()
            .map(|n| {
                let selectable = !n.attributes().iter().any(is_noselect);
                RemoteFolder::new(n.name(), n.delimiter(), selectable)
            })
            .collect())
    }

    fn hierarchy_delimiter(&mut self) -> Result<Option<String>> {
        // LIST "" "" returns only the delimiter of the root.
        let names = self
            .session
            .list(Some(""), None)
            .map_err(|e| self.classify(e))?;
        Ok(names
            .iter()
            .find_map(|n| n.delimiter().map(str::to_string)))
    }

    fn folder_exists(&mut self, folder: &str) -> Result<bool> {
        let names = self
            .session
            .list(Some(""), Some(&quoted(folder)))
            .map_err(|e| self.classify(e))?;
        Ok(names.iter().any(|n| n.name() == folder))
    }

    fn select(&mut self, folder: &str, readonly: bool) -> Result<()> {
        let result = if readonly {
            self.session.examine(folder)
        } else {
            self.session.select(folder)
        };
        match result {
            Ok(_) => Ok(()),
            Err(imap::error::Error::No(_)) => Err(Error::FolderNotFound(folder.to_string())),
            Err(e) => Err(self.classify(e)),
        }
    }

    fn search_uids(&mut self) -> Result<Vec<u32>> {
        let found = self
            .session
            .uid_search("ALL")
            .map_err(|e| self.classify(e))?;
        let mut uids: Vec<u32> = found.into_iter().collect();
        uids.sort_unstable();
        Ok(uids)
    }

    fn fetch(&mut self, uid: u32) -> Result<Option<FetchedMessage>> {
        let fetches = self
            .session
            .uid_fetch(uid.to_string(), FETCH_QUERY)
            .map_err(|e| self.classify(e))?;
        // Unsolicited FETCH responses for other messages may ride along.
        let Some(fetch) = fetches.iter().find(|f| f.uid == Some(uid)) else {
            return Ok(None);
        };
        let Some(body) = fetch.body() else {
            return Ok(None);
        };
        let flags: FlagSet = fetch
            .flags()
            .iter()
            .map(|f| Flag::parse(&f.to_string()))
            .collect();
        let internal_timestamp = match fetch.internal_date() {
            Some(date) => date.timestamp(),
            None => {
                debug!("UID {} has no INTERNALDATE, using epoch", uid);
                0
            }
        };
        Ok(Some(FetchedMessage {
            flags,
            internal_timestamp,
            body: body.to_vec(),
        }))
    }

    fn append(
        &mut self,
        folder: &str,
        flags: &FlagSet,
        internal_timestamp: i64,
        body: &[u8],
    ) -> Result<()> {
        let has_flags = !flags.is_empty();
        let flags: Vec<imap::types::Flag<'_>> = flags
            .iter()
            .map(|f| imap::types::Flag::Custom(Cow::Owned(f.to_string())))
            .collect();
        let date = chrono::DateTime::from_timestamp(internal_timestamp, 0).map(|d| d.fixed_offset());
        match self
            .session
            .append_with_flags_and_date(folder, body, &flags, date)
        {
            Ok(()) => Ok(()),
            Err(imap::error::Error::No(msg) | imap::error::Error::Bad(msg))
                if msg.to_ascii_lowercase().contains("flag") =>
            {
                Err(Error::FlagRejected(msg))
            }
            // Refused before the literal was sent; the reply text is not kept.
            Err(imap::error::Error::Append) if has_flags => Err(Error::FlagRejected(
                "APPEND refused before the message was sent".to_string(),
            )),
            Err(e) => Err(self.classify(e)),
        }
    }

    fn create(&mut self, folder: &str) -> Result<()> {
        match self.session.create(folder) {
            Ok(()) => Ok(()),
            Err(imap::error::Error::No(msg)) if msg.to_ascii_lowercase().contains("exist") => {
                Err(Error::FolderExists(folder.to_string()))
            }
            Err(e) => Err(self.classify(e)),
        }
    }
}

/// Opens IMAP sessions with `native-tls`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImapConnector;

impl Connector for ImapConnector {
    fn connect(&self, credentials: &Credentials) -> Result<Box<dyn MailServer>> {
        let host = credentials.host.as_str();
        let addr = (host, credentials.port());

        let mut tls_builder = native_tls::TlsConnector::builder();
        if credentials.security == Security::Starttls || host == "127.0.0.1" || host == "localhost" {
            tls_builder.danger_accept_invalid_certs(true);
            tls_builder.danger_accept_invalid_hostnames(true);
        }
        let tls = tls_builder.build().map_err(|e| Error::connection(host, e))?;

        match credentials.security {
            Security::Tls => {
                let client = imap::connect(addr, host, &tls).map_err(|e| Error::connection(host, e))?;
                let session = login(client, credentials)?;
                Ok(Box::new(ImapServer::new(host, session)))
            }
            Security::Starttls => {
                let client = imap::connect_starttls(addr, host, &tls)
                    .map_err(|e| Error::connection(host, e))?;
                let session = login(client, credentials)?;
                Ok(Box::new(ImapServer::new(host, session)))
            }
            Security::Plain => {
                let stream = TcpStream::connect(addr).map_err(|e| Error::connection(host, e))?;
                let mut client = imap::Client::new(stream);
                client
                    .read_greeting()
                    .map_err(|e| Error::connection(host, e))?;
                let session = login(client, credentials)?;
                Ok(Box::new(ImapServer::new(host, session)))
            }
        }
    }
}

fn login<T: Read + Write>(client: imap::Client<T>, credentials: &Credentials) -> Result<Session<T>> {
    client
        .login(&credentials.user, &credentials.password)
        .map_err(|(e, _)| Error::Authentication {
            host: credentials.host.clone(),
            user: credentials.user.clone(),
            message: e.to_string(),
        })
}
