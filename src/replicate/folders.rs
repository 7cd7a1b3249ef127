//! Folder enumeration: drop structural containers, normalize hierarchy paths.

/// A folder as reported by a server's LIST response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFolder {
    pub name: String,
    pub delimiter: Option<String>,
    pub selectable: bool,
}

impl RemoteFolder {
    pub fn new(name: &str, delimiter: Option<&str>, selectable: bool) -> Self {
        Self {
            name: name.to_string(),
            delimiter: delimiter.map(str::to_string),
            selectable,
        }
    }
}

/// A selectable folder ready for replication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    /// Canonical `/` separated path.
    pub name: String,
    /// Name to use when talking to the server it came from.
    pub native: String,
}

/// Rewrite a native folder name into canonical `/` form.
pub fn to_canonical(native: &str, delimiter: Option<&str>) -> String {
    match delimiter {
        Some(d) if !d.is_empty() && d != "/" => native.replace(d, "/"),
        _ => native.to_string(),
    }
}

/// Rewrite a canonical `/` path into a server's native form.
pub fn to_native(canonical: &str, delimiter: Option<&str>) -> String {
    match delimiter {
        Some(d) if !d.is_empty() && d != "/" => canonical.replace('/', d),
        _ => canonical.to_string(),
    }
}

/// One pass over a server's folder listing, in the server's own order.
pub struct FolderWalker {
    listing: std::vec::IntoIter<RemoteFolder>,
}

impl FolderWalker {
    pub fn new(listing: Vec<RemoteFolder>) -> Self {
        Self {
            listing: listing.into_iter(),
        }
    }
}

impl Iterator for FolderWalker {
    type Item = Folder;

    fn next(&mut self) -> Option<Folder> {
        self.listing.by_ref().find(|f| f.selectable).map(|f| Folder {
            name: to_canonical(&f.name, f.delimiter.as_deref()),
            native: f.name,
        })
    }
}
