//! Blob and tree payload parsing/serialisation.
//!
//! `ParseTree`/`SerialiseTree` follow `gitutils.py`'s `ParseTree` and
//! `WriteTree` byte-for-byte: entries are `mode SP name NUL hash(20)`,
//! concatenated in sort-key order.

use crate::error::GraftError;
use crate::hash::{HASH_BYTES, ObjectHash};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
}

impl ObjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Tree => "tree",
            ObjectKind::Commit => "commit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "blob" => Some(ObjectKind::Blob),
            "tree" => Some(ObjectKind::Tree),
            "commit" => Some(ObjectKind::Commit),
            _ => None,
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File mode, stored as the raw octal-ASCII string git uses on the wire
/// (`"100644"`, `"100755"`, `"120000"`, `"40000"`).
pub type Mode = String;

pub const MODE_DIR: &str = "40000";

pub fn is_dir_mode(mode: &str) -> bool {
    mode == MODE_DIR
}

pub fn is_file_mode(mode: &str) -> bool {
    mode.as_bytes().first() == Some(&b'1')
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub mode: Mode,
    pub name: Vec<u8>,
    pub hash: ObjectHash,
}

impl TreeEntry {
    pub fn new(mode: impl Into<Mode>, name: impl Into<Vec<u8>>, hash: ObjectHash) -> Self {
        Self {
            mode: mode.into(),
            name: name.into(),
            hash,
        }
    }

    /// Sort key: directory names are compared as if suffixed with `/`, so
    /// that a directory sorts after a file of the same name prefix. Mirrors
    /// `_GitTreeEntryGetSortKey`.
    fn sort_key(&self) -> Vec<u8> {
        if is_dir_mode(&self.mode) {
            let mut key = self.name.clone();
            key.push(b'/');
            key
        } else {
            self.name.clone()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    pub fn parse(payload: &[u8]) -> Result<Self, GraftError> {
        let mut entries = Vec::new();
        let mut cursor = 0usize;
        while cursor < payload.len() {
            let space = payload[cursor..]
                .iter()
                .position(|&b| b == b' ')
                .map(|p| cursor + p)
                .ok_or_else(|| {
                    GraftError::Protocol("truncated tree entry: missing mode separator".into())
                })?;
            let mode = std::str::from_utf8(&payload[cursor..space])
                .map_err(|e| GraftError::Protocol(format!("non-utf8 tree mode: {e}")))?
                .to_string();

            let nul = payload[space + 1..]
                .iter()
                .position(|&b| b == 0)
                .map(|p| space + 1 + p)
                .ok_or_else(|| {
                    GraftError::Protocol("truncated tree entry: missing name terminator".into())
                })?;
            let name = payload[space + 1..nul].to_vec();

            let hash_start = nul + 1;
            let hash_end = hash_start + HASH_BYTES;
            if hash_end > payload.len() {
                return Err(GraftError::Protocol(
                    "truncated tree entry: short hash".into(),
                ));
            }
            let mut raw = [0u8; HASH_BYTES];
            raw.copy_from_slice(&payload[hash_start..hash_end]);

            entries.push(TreeEntry::new(mode, name, ObjectHash::from_bytes(raw)));
            cursor = hash_end;
        }
        Ok(Tree { entries })
    }

    /// Canonical serialisation: stable-sort by [`TreeEntry::sort_key`], then
    /// concatenate `mode SP name NUL hash`.
    pub fn serialize(mut entries: Vec<TreeEntry>) -> Vec<u8> {
        entries.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        let mut out = Vec::new();
        for entry in &entries {
            out.extend_from_slice(entry.mode.as_bytes());
            out.push(b' ');
            out.extend_from_slice(&entry.name);
            out.push(0);
            out.extend_from_slice(entry.hash.as_bytes());
        }
        out
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        Self::serialize(self.entries.clone())
    }

    pub fn lookup(&self, name: &[u8]) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name == name)
    }
}
