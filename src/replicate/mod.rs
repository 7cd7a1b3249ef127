//! Mailbox replication between IMAP servers and a local SQLite store.

pub mod folders;
pub mod imap_server;
pub mod retry;
pub mod session;
pub mod store;
pub mod transfer;
pub mod types;

use log::{debug, info};
use std::fmt;
use std::path::PathBuf;

use crate::error::{Error, Result};

use self::folders::FolderWalker;
use self::retry::RetryPolicy;
use self::session::{Connector, Credentials, Endpoint, Role};
use self::store::Store;
use self::transfer::{Progress, ServerSink, Sink, StoreSink, WriteOutcome, transfer};
use self::types::MessageRecord;

/// One side of a replication run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointConfig {
    Server(Credentials),
    Store(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ServerToServer,
    ServerToStore,
    StoreToServer,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ServerToServer => f.write_str("server to server"),
            Direction::ServerToStore => f.write_str("server to store"),
            Direction::StoreToServer => f.write_str("store to server"),
        }
    }
}

/// Resolve the transfer direction from the configured roles.
pub fn resolve_direction(
    source: Option<&EndpointConfig>,
    destination: Option<&EndpointConfig>,
) -> Result<Direction> {
    match (source, destination) {
        (Some(EndpointConfig::Server(_)), Some(EndpointConfig::Server(_))) => {
            Ok(Direction::ServerToServer)
        }
        (Some(EndpointConfig::Server(_)), Some(EndpointConfig::Store(_))) => {
            Ok(Direction::ServerToStore)
        }
        (Some(EndpointConfig::Store(_)), Some(EndpointConfig::Server(_))) => {
            Ok(Direction::StoreToServer)
        }
        (None, _) => Err(Error::Configuration("source not set".to_string())),
        (Some(EndpointConfig::Server(_)), None) => {
            Err(Error::Configuration("destination not set".to_string()))
        }
        (Some(EndpointConfig::Store(_)), _) => Err(Error::Configuration(
            "a store source needs an IMAP destination".to_string(),
        )),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationState {
    Unconfigured,
    SourceOnly,
    StoreOnly,
    Ready(Direction),
    Running(Direction),
    Done(Direction),
}

/// Counters for one run. Observational only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationReport {
    pub direction: Direction,
    pub folders: usize,
    pub transferred: usize,
    pub duplicates: usize,
    /// Fetches that came back empty.
    pub skipped: usize,
    /// Records the store refused.
    pub dropped: usize,
}

impl ReplicationReport {
    fn new(direction: Direction) -> Self {
        Self {
            direction,
            folders: 0,
            transferred: 0,
            duplicates: 0,
            skipped: 0,
            dropped: 0,
        }
    }

    fn record(&mut self, outcome: WriteOutcome) {
        match outcome {
            WriteOutcome::Written => self.transferred += 1,
            WriteOutcome::Duplicate => self.duplicates += 1,
            WriteOutcome::Dropped => self.dropped += 1,
        }
    }
}

impl fmt::Display for ReplicationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} folder(s), {} transferred, {} duplicate(s), {} skipped, {} dropped",
            self.direction,
            self.folders,
            self.transferred,
            self.duplicates,
            self.skipped,
            self.dropped
        )
    }
}

/// Drives one replication run.
///
/// ```no_run
/// use mailclone::replicate::{EndpointConfig, Replicator};
/// use mailclone::replicate::imap_server::ImapConnector;
/// use mailclone::replicate::retry::RetryPolicy;
/// use mailclone::replicate::session::Credentials;
///
/// let mut replicator = Replicator::new(RetryPolicy::default())
///     .source(EndpointConfig::Server(Credentials::new("mail.example.com", "me@example.com", "pa5sw0rd")))
///     .destination(EndpointConfig::Store("backup.db".into()));
/// replicator.run(&ImapConnector).unwrap();
/// ```
pub struct Replicator {
    policy: RetryPolicy,
    source: Option<EndpointConfig>,
    destination: Option<EndpointConfig>,
    progress: Option<(Direction, bool)>,
}

impl Replicator {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            source: None,
            destination: None,
            progress: None,
        }
    }

    pub fn source(mut self, source: EndpointConfig) -> Self {
        self.source = Some(source);
        self
    }

    pub fn destination(mut self, destination: EndpointConfig) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn direction(&self) -> Result<Direction> {
        resolve_direction(self.source.as_ref(), self.destination.as_ref())
    }

    pub fn state(&self) -> ReplicationState {
        if let Some((direction, done)) = self.progress {
            return if done {
                ReplicationState::Done(direction)
            } else {
                ReplicationState::Running(direction)
            };
        }
        match self.direction() {
            Ok(direction) => ReplicationState::Ready(direction),
            Err(_) => match self.source {
                None => ReplicationState::Unconfigured,
                Some(EndpointConfig::Server(_)) => ReplicationState::SourceOnly,
                Some(EndpointConfig::Store(_)) => ReplicationState::StoreOnly,
            },
        }
    }

    /// Run to completion. Configuration problems are reported before any
    /// connection is attempted.
    pub fn run(&mut self, connector: &dyn Connector) -> Result<ReplicationReport> {
        let direction = self.direction()?;
        self.progress = Some((direction, false));
        info!("Starting {} replication", direction);

        let mut report = ReplicationReport::new(direction);
        match (&self.source, &self.destination) {
            (Some(EndpointConfig::Server(src)), Some(EndpointConfig::Server(dst))) => {
                let mut source = Endpoint::new(Role::Source, src.clone(), connector);
                source.connect(&self.policy)?;
                let mut sink = ServerSink::new(
                    Endpoint::new(Role::Destination, dst.clone(), connector),
                    self.policy.clone(),
                );
                sink.connect()?;
                replicate_from_server(&mut source, &self.policy, &mut sink, &mut report)?;
            }
            (Some(EndpointConfig::Server(src)), Some(EndpointConfig::Store(path))) => {
                let store = Store::open(path)?;
                let mut source = Endpoint::new(Role::Source, src.clone(), connector);
                source.connect(&self.policy)?;
                let mut sink = StoreSink::new(&store);
                replicate_from_server(&mut source, &self.policy, &mut sink, &mut report)?;
            }
            (Some(EndpointConfig::Store(path)), Some(EndpointConfig::Server(dst))) => {
                let store = Store::open(path)?;
                let mut sink = ServerSink::new(
                    Endpoint::new(Role::Destination, dst.clone(), connector),
                    self.policy.clone(),
                );
                sink.connect()?;
                replicate_from_store(&store, &mut sink, &mut report)?;
            }
            _ => return Err(Error::Configuration("unsupported endpoint combination".to_string())),
        }

        self.progress = Some((direction, true));
        info!("Replication complete: {}", report);
        Ok(report)
    }
}

/// Walk every selectable folder on `source` and send each message to `sink`.
pub fn replicate_from_server(
    source: &mut Endpoint<'_>,
    policy: &RetryPolicy,
    sink: &mut dyn Sink,
    report: &mut ReplicationReport,
) -> Result<()> {
    let listing = source.with_retry(policy, "list folders", |server| server.list_folders())?;
    for folder in FolderWalker::new(listing) {
        info!("Folder: {}", folder.name);
        source.select(policy, &folder.native, true)?;
        sink.prepare_folder(&folder.name)?;
        report.folders += 1;

        let uids = source.with_retry(policy, "search", |server| server.search_uids())?;
        if uids.is_empty() {
            info!("  Folder {} is empty", folder.name);
            continue;
        }

        let total = uids.len();
        for (i, uid) in uids.into_iter().enumerate() {
            let fetched = source.with_retry(policy, "fetch", |server| server.fetch(uid))?;
            let Some(fetched) = fetched else {
                debug!("  UID {} in {} returned nothing, skipping", uid, folder.name);
                report.skipped += 1;
                continue;
            };
            debug!(
                "  Fetched UID {} ({} bytes, internaldate {})",
                uid,
                fetched.body.len(),
                fetched.internal_timestamp
            );
            let record = MessageRecord::from_fetch(&folder.name, fetched);
            let progress = Progress {
                current: i + 1,
                total,
            };
            let outcome = transfer(sink, record, progress)?;
            report.record(outcome);
        }
    }
    Ok(())
}

/// Recreate every stored folder on `sink`, then replay every record.
pub fn replicate_from_store(
    store: &Store,
    sink: &mut dyn Sink,
    report: &mut ReplicationReport,
) -> Result<()> {
    for folder in store.distinct_folders()? {
        sink.prepare_folder(&folder)?;
        report.folders += 1;
    }
    let total = store.count()? as usize;
    for (i, record) in store.records().enumerate() {
        let progress = Progress {
            current: i + 1,
            total,
        };
        let outcome = transfer(sink, record?, progress)?;
        report.record(outcome);
    }
    Ok(())
}
