//! Shared test fixtures: in-memory IMAP fake and a warning-counting logger.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Once;

use mailclone::error::{Error, Result};
use mailclone::replicate::folders::RemoteFolder;
use mailclone::replicate::session::{Connector, Credentials, MailServer};
use mailclone::replicate::types::{FetchedMessage, FlagSet};

pub const PASSWORD: &str = "secret";

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

thread_local! {
    static WARNINGS: Cell<usize> = const { Cell::new(0) };
}

struct CountingLogger;

impl log::Log for CountingLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        if record.level() == log::Level::Warn {
            WARNINGS.with(|w| w.set(w.get() + 1));
        }
    }

    fn flush(&self) {}
}

static LOGGER: CountingLogger = CountingLogger;
static INIT: Once = Once::new();

/// Install the counting logger and zero this thread's warning count.
pub fn reset_warnings() {
    INIT.call_once(|| {
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(log::LevelFilter::Trace);
    });
    WARNINGS.with(|w| w.set(0));
}

/// Warnings logged on the current thread since `reset_warnings`.
pub fn warnings() -> usize {
    WARNINGS.with(|w| w.get())
}

// ---------------------------------------------------------------------------
// Fake server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FakeFolder {
    pub name: String,
    pub selectable: bool,
    pub messages: Vec<(u32, FetchedMessage)>,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub delimiter: Option<String>,
    pub folders: Vec<FakeFolder>,
    /// Connection attempts that fail before one succeeds.
    pub connect_failures: u32,
    /// Fetch calls that fail with a connection error.
    pub fetch_failures: u32,
    /// Append calls that fail with a connection error.
    pub append_failures: u32,
    /// Refuse any append that carries flags.
    pub reject_flags: bool,
    /// UIDs the server pretends not to have.
    pub missing_uids: Vec<u32>,
    pub connects: u32,
    pub fetches: u32,
    pub appends: u32,
    pub creates: Vec<String>,
    next_uid: u32,
}

impl FakeState {
    pub fn folder(&self, name: &str) -> Option<&FakeFolder> {
        self.folders.iter().find(|f| f.name == name)
    }

    pub fn folder_names(&self) -> Vec<String> {
        self.folders.iter().map(|f| f.name.clone()).collect()
    }
}

pub type SharedState = Rc<RefCell<FakeState>>;

/// Build a server state with the given delimiter.
pub fn fake_server(delimiter: Option<&str>) -> SharedState {
    Rc::new(RefCell::new(FakeState {
        delimiter: delimiter.map(str::to_string),
        next_uid: 1,
        ..Default::default()
    }))
}

pub fn add_folder(state: &SharedState, name: &str, selectable: bool) {
    state.borrow_mut().folders.push(FakeFolder {
        name: name.to_string(),
        selectable,
        messages: Vec::new(),
    });
}

pub fn add_message(state: &SharedState, folder: &str, flags: &str, timestamp: i64, body: &[u8]) -> u32 {
    let mut s = state.borrow_mut();
    let uid = s.next_uid;
    s.next_uid += 1;
    let folder = s
        .folders
        .iter_mut()
        .find(|f| f.name == folder)
        .expect("folder must exist");
    folder.messages.push((uid, message(flags, timestamp, body)));
    uid
}

pub fn message(flags: &str, timestamp: i64, body: &[u8]) -> FetchedMessage {
    FetchedMessage {
        flags: FlagSet::parse(flags),
        internal_timestamp: timestamp,
        body: body.to_vec(),
    }
}

pub struct FakeServer {
    host: String,
    state: SharedState,
    selected: Option<String>,
}

fn lost(host: &str) -> Error {
    Error::connection(host, "connection reset by peer")
}

impl MailServer for FakeServer {
    fn list_folders(&mut self) -> Result<Vec<RemoteFolder>> {
        let s = self.state.borrow();
        Ok(s.folders
            .iter()
            .map(|f| RemoteFolder::new(&f.name, s.delimiter.as_deref(), f.selectable))
            .collect())
    }

    fn hierarchy_delimiter(&mut self) -> Result<Option<String>> {
        Ok(self.state.borrow().delimiter.clone())
    }

    fn folder_exists(&mut self, folder: &str) -> Result<bool> {
        Ok(self.state.borrow().folder(folder).is_some())
    }

    fn select(&mut self, folder: &str, _readonly: bool) -> Result<()> {
        match self.state.borrow().folder(folder) {
            Some(f) if f.selectable => {
                self.selected = Some(folder.to_string());
                Ok(())
            }
            _ => Err(Error::FolderNotFound(folder.to_string())),
        }
    }

    fn search_uids(&mut self) -> Result<Vec<u32>> {
        let s = self.state.borrow();
        let selected = self
            .selected
            .as_deref()
            .ok_or_else(|| Error::Protocol("no folder selected".to_string()))?;
        let folder = s
            .folder(selected)
            .ok_or_else(|| Error::FolderNotFound(selected.to_string()))?;
        Ok(folder.messages.iter().map(|(uid, _)| *uid).collect())
    }

    fn fetch(&mut self, uid: u32) -> Result<Option<FetchedMessage>> {
        let mut s = self.state.borrow_mut();
        s.fetches += 1;
        if s.fetch_failures > 0 {
            s.fetch_failures -= 1;
            return Err(lost(&self.host));
        }
        if s.missing_uids.contains(&uid) {
            return Ok(None);
        }
        let selected = self.selected.as_deref().unwrap_or_default();
        Ok(s.folder(selected).and_then(|f| {
            f.messages
                .iter()
                .find(|(u, _)| *u == uid)
                .map(|(_, m)| m.clone())
        }))
    }

    fn append(
        &mut self,
        folder: &str,
        flags: &FlagSet,
        internal_timestamp: i64,
        body: &[u8],
    ) -> Result<()> {
        let mut s = self.state.borrow_mut();
        s.appends += 1;
        if s.append_failures > 0 {
            s.append_failures -= 1;
            return Err(lost(&self.host));
        }
        if s.reject_flags && !flags.is_empty() {
            return Err(Error::FlagRejected("invalid flag list".to_string()));
        }
        let uid = s.next_uid;
        s.next_uid += 1;
        let Some(target) = s.folders.iter_mut().find(|f| f.name == folder) else {
            return Err(Error::Protocol(format!("[TRYCREATE] no folder {}", folder)));
        };
        target.messages.push((
            uid,
            FetchedMessage {
                flags: flags.clone(),
                internal_timestamp,
                body: body.to_vec(),
            },
        ));
        Ok(())
    }

    fn create(&mut self, folder: &str) -> Result<()> {
        let mut s = self.state.borrow_mut();
        if s.folder(folder).is_some() {
            return Err(Error::FolderExists(folder.to_string()));
        }
        s.creates.push(folder.to_string());
        s.folders.push(FakeFolder {
            name: folder.to_string(),
            selectable: true,
            messages: Vec::new(),
        });
        Ok(())
    }
}

/// Hands out sessions on fake servers keyed by host.
#[derive(Default)]
pub struct FakeConnector {
    servers: HashMap<String, SharedState>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server(mut self, host: &str, state: &SharedState) -> Self {
        self.servers.insert(host.to_string(), Rc::clone(state));
        self
    }
}

impl Connector for FakeConnector {
    fn connect(&self, credentials: &Credentials) -> Result<Box<dyn MailServer>> {
        let state = self
            .servers
            .get(&credentials.host)
            .ok_or_else(|| Error::connection(&credentials.host, "no route to host"))?;
        {
            let mut s = state.borrow_mut();
            s.connects += 1;
            if s.connect_failures > 0 {
                s.connect_failures -= 1;
                return Err(lost(&credentials.host));
            }
        }
        if credentials.password != PASSWORD {
            return Err(Error::Authentication {
                host: credentials.host.clone(),
                user: credentials.user.clone(),
                message: "invalid credentials".to_string(),
            });
        }
        Ok(Box::new(FakeServer {
            host: credentials.host.clone(),
            state: Rc::clone(state),
            selected: None,
        }))
    }
}

pub fn credentials(host: &str) -> Credentials {
    Credentials::new(host, "user@example.com", PASSWORD)
}
