//! Replication data types: MessageRecord, Flag, FlagSet.

use std::fmt;

/// A single protocol flag token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Flag {
    Seen,
    Answered,
    Flagged,
    Deleted,
    Draft,
    /// Session-relative marker set by the server, never writable by clients.
    Recent,
    /// Index-only marker some servers expose.
    Indexed,
    /// Keywords and vendor flags, kept verbatim.
    Other(String),
}

impl Flag {
    /// Parse one whitespace-free token. System flags match case-insensitively.
    pub fn parse(token: &str) -> Flag {
        let known = [
            ("\\Seen", Flag::Seen),
            ("\\Answered", Flag::Answered),
            ("\\Flagged", Flag::Flagged),
            ("\\Deleted", Flag::Deleted),
            ("\\Draft", Flag::Draft),
            ("\\Recent", Flag::Recent),
            ("\\Indexed", Flag::Indexed),
        ];
        known
            .into_iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(token))
            .map(|(_, flag)| flag)
            .unwrap_or_else(|| Flag::Other(token.to_string()))
    }

    /// Flags that only make sense on the server that reported them.
    pub fn is_transient(&self) -> bool {
        matches!(self, Flag::Recent | Flag::Indexed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Flag::Seen => "\\Seen",
            Flag::Answered => "\\Answered",
            Flag::Flagged => "\\Flagged",
            Flag::Deleted => "\\Deleted",
            Flag::Draft => "\\Draft",
            Flag::Recent => "\\Recent",
            Flag::Indexed => "\\Indexed",
            Flag::Other(s) => s,
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered set of flags. Insertion order is kept, duplicates are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagSet(Vec<Flag>);

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a whitespace-separated flag list.
    pub fn parse(text: &str) -> Self {
        text.split_whitespace().map(Flag::parse).collect()
    }

    pub fn insert(&mut self, flag: Flag) {
        if !self.0.contains(&flag) {
            self.0.push(flag);
        }
    }

    pub fn contains(&self, flag: &Flag) -> bool {
        self.0.contains(flag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Flag> {
        self.0.iter()
    }

    /// Copy without transient flags. This is what every sink receives.
    pub fn cleaned(&self) -> FlagSet {
        self.0.iter().filter(|f| !f.is_transient()).cloned().collect()
    }
}

impl FromIterator<Flag> for FlagSet {
    fn from_iter<I: IntoIterator<Item = Flag>>(iter: I) -> Self {
        let mut set = FlagSet::new();
        for flag in iter {
            set.insert(flag);
        }
        set
    }
}

impl fmt::Display for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, flag) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(flag.as_str())?;
        }
        Ok(())
    }
}

/// What a server returns for one UID fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMessage {
    pub flags: FlagSet,
    /// Server delivery time, seconds since the epoch.
    pub internal_timestamp: i64,
    pub body: Vec<u8>,
}

/// The unit of replication. Identity is (folder, internal_timestamp, body);
/// flags ride along but are not part of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    /// Canonical folder path, `/` separated.
    pub folder: String,
    pub flags: FlagSet,
    pub internal_timestamp: i64,
    pub body: Vec<u8>,
}

impl MessageRecord {
    pub fn from_fetch(folder: &str, fetched: FetchedMessage) -> Self {
        Self {
            folder: folder.to_string(),
            flags: fetched.flags,
            internal_timestamp: fetched.internal_timestamp,
            body: fetched.body,
        }
    }

    pub fn same_message(&self, other: &MessageRecord) -> bool {
        self.folder == other.folder
            && self.internal_timestamp == other.internal_timestamp
            && self.body == other.body
    }
}
