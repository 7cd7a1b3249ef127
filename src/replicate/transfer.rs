//! Per-message transfer: clean flags, write to a sink, report progress.

use log::{debug, error, info, warn};
use std::collections::HashSet;

use super::retry::RetryPolicy;
use super::session::Endpoint;
use super::store::{InsertOutcome, Store};
use super::types::{FlagSet, MessageRecord};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// The store already held this message.
    Duplicate,
    /// The store refused the record for a reason other than a duplicate.
    Dropped,
}

/// Where replicated messages go.
pub trait Sink {
    /// Make sure `folder` (canonical path) can receive messages.
    fn prepare_folder(&mut self, folder: &str) -> Result<()>;

    /// Write one record whose flags are already cleaned.
    fn write(&mut self, record: &MessageRecord) -> Result<WriteOutcome>;
}

/// A live destination server.
pub struct ServerSink<'c> {
    endpoint: Endpoint<'c>,
    policy: RetryPolicy,
    known_folders: HashSet<String>,
}

impl<'c> ServerSink<'c> {
    pub fn new(endpoint: Endpoint<'c>, policy: RetryPolicy) -> Self {
        Self {
            endpoint,
            policy,
            known_folders: HashSet::new(),
        }
    }

    pub fn endpoint(&self) -> &Endpoint<'c> {
        &self.endpoint
    }

    pub fn connect(&mut self) -> Result<()> {
        self.endpoint.connect(&self.policy)
    }
}

impl Sink for ServerSink<'_> {
    fn prepare_folder(&mut self, folder: &str) -> Result<()> {
        if self.known_folders.contains(folder) {
            return Ok(());
        }
        self.endpoint.connect(&self.policy)?;
        let native = self.endpoint.native_name(folder);
        let created = self
            .endpoint
            .with_retry(&self.policy, "create folder", |server| {
                if server.folder_exists(&native)? {
                    return Ok(false);
                }
                match server.create(&native) {
                    Ok(()) => Ok(true),
                    Err(Error::FolderExists(_)) => Ok(false),
                    Err(e) => Err(e),
                }
            })?;
        if created {
            info!("Folder created: {}", folder);
        } else {
            debug!("Folder exists: {}", folder);
        }
        self.known_folders.insert(folder.to_string());
        Ok(())
    }

    fn write(&mut self, record: &MessageRecord) -> Result<WriteOutcome> {
        let native = self.endpoint.native_name(&record.folder);
        let mut flags = record.flags.clone();
        self.endpoint.with_retry(&self.policy, "append", |server| {
            match server.append(&native, &flags, record.internal_timestamp, &record.body) {
                Err(Error::FlagRejected(msg)) if !flags.is_empty() => {
                    warn!("Message flag error, removing flags for message: {}", msg);
                    flags = FlagSet::new();
                    server.append(&native, &flags, record.internal_timestamp, &record.body)
                }
                other => other,
            }
        })?;
        Ok(WriteOutcome::Written)
    }
}

/// The local durable store.
pub struct StoreSink<'s> {
    store: &'s Store,
}

impl<'s> StoreSink<'s> {
    pub fn new(store: &'s Store) -> Self {
        Self { store }
    }
}

impl Sink for StoreSink<'_> {
    fn prepare_folder(&mut self, _folder: &str) -> Result<()> {
        Ok(())
    }

    fn write(&mut self, record: &MessageRecord) -> Result<WriteOutcome> {
        match self.store.insert(record) {
            Ok(InsertOutcome::Inserted) => Ok(WriteOutcome::Written),
            Ok(InsertOutcome::Duplicate) => Ok(WriteOutcome::Duplicate),
            Err(e) => {
                error!("Dropping message in {}: {}", record.folder, e);
                Ok(WriteOutcome::Dropped)
            }
        }
    }
}

/// Position of a message within the current pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
}

/// Move one record into `sink`. Transient flags never reach a sink.
pub fn transfer(
    sink: &mut dyn Sink,
    mut record: MessageRecord,
    progress: Progress,
) -> Result<WriteOutcome> {
    record.flags = record.flags.cleaned();
    let outcome = sink.write(&record)?;
    if outcome != WriteOutcome::Dropped {
        info!(
            "Posted: {} / {} Folder: {} Flags: {}",
            progress.current, progress.total, record.folder, record.flags
        );
    }
    Ok(outcome)
}
