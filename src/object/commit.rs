//! Structured commit view (spec §3, §4.B).
//!
//! Headers are parsed into an ordered map keyed by first token, preserving
//! encounter order for "other" headers (gpg/mergetag) so a commit that is
//! read and re-serialised unchanged round-trips byte-for-byte. `parent` is
//! tracked separately from the map (primary + optional merged parent) since
//! it may repeat, mirroring `gitutils.py`'s `Commit` class.

use crate::error::GraftError;
use crate::hash::ObjectHash;

#[derive(Debug, Clone)]
pub struct Commit {
    pub tree: ObjectHash,
    /// The first `parent` header, treated as the linear ancestor (spec §3).
    pub parent: Option<ObjectHash>,
    /// A second `parent` header injected only by the separate merge phase;
    /// left `None` by every operation this crate performs on its own.
    pub merged_parent: Option<ObjectHash>,
    pub author: String,
    pub committer: String,
    /// Headers other than tree/parent/author/committer, in encounter order.
    pub extra_headers: Vec<(String, String)>,
    pub message: String,
}

impl Commit {
    pub fn parse(payload: &[u8]) -> Result<Self, GraftError> {
        let text = std::str::from_utf8(payload)
            .map_err(|e| GraftError::Protocol(format!("non-utf8 commit payload: {e}")))?;
        let (header_block, message) = text.split_once("\n\n").ok_or_else(|| {
            GraftError::Protocol("commit payload missing header/message separator".into())
        })?;

        let mut tree = None;
        let mut parents: Vec<ObjectHash> = Vec::new();
        let mut author = None;
        let mut committer = None;
        let mut extra_headers = Vec::new();

        for line in header_block.lines() {
            let (key, value) = line.split_once(' ').ok_or_else(|| {
                GraftError::Protocol(format!("malformed commit header line: {line:?}"))
            })?;
            match key {
                "tree" => {
                    tree = Some(value.parse()?);
                }
                "parent" => {
                    parents.push(value.parse()?);
                }
                "author" => author = Some(value.to_string()),
                "committer" => committer = Some(value.to_string()),
                other => extra_headers.push((other.to_string(), value.to_string())),
            }
        }

        Ok(Commit {
            tree: tree.ok_or_else(|| GraftError::Protocol("commit missing tree header".into()))?,
            parent: parents.first().copied(),
            merged_parent: parents.get(1).copied(),
            author: author
                .ok_or_else(|| GraftError::Protocol("commit missing author header".into()))?,
            committer: committer
                .ok_or_else(|| GraftError::Protocol("commit missing committer header".into()))?,
            extra_headers,
            message: message.to_string(),
        })
    }

    /// Canonical serialisation: `tree`, `parent` (primary), `parent`
    /// (merged) if any, `author`, `committer`, then other headers in
    /// encounter order, then `"\n\n"` + message.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = String::new();
        out.push_str("tree ");
        out.push_str(&self.tree.to_hex());
        if let Some(parent) = self.parent {
            out.push_str("\nparent ");
            out.push_str(&parent.to_hex());
        }
        if let Some(merged) = self.merged_parent {
            out.push_str("\nparent ");
            out.push_str(&merged.to_hex());
        }
        out.push_str("\nauthor ");
        out.push_str(&self.author);
        out.push_str("\ncommitter ");
        out.push_str(&self.committer);
        for (key, value) in &self.extra_headers {
            out.push('\n');
            out.push_str(key);
            out.push(' ');
            out.push_str(value);
        }
        out.push_str("\n\n");
        out.push_str(&self.message);
        out.into_bytes()
    }
}
