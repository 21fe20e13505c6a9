//! Revision lister: enumerates the (commit, root-tree) pairs of a branch in
//! reverse chronological order (oldest first) — spec §4.C.
//!
//! Shells out to `git rev-list --format=%T --reverse <branch>`, mirroring
//! `_LoadRevlist` in `blink_rewriter.py`: each commit line is followed by a
//! tree line (the `%T` format string), paired up as they arrive.

use std::path::Path;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::error::GraftError;
use crate::hash::ObjectHash;

/// A single revision: the commit and the root tree it points at.
#[derive(Debug, Clone, Copy)]
pub struct Revision {
    pub commit: ObjectHash,
    pub tree: ObjectHash,
}

pub struct RevisionList {
    pub revisions: Vec<Revision>,
}

impl RevisionList {
    pub fn commits(&self) -> impl Iterator<Item = ObjectHash> + '_ {
        self.revisions.iter().map(|r| r.commit)
    }

    pub fn trees(&self) -> impl Iterator<Item = ObjectHash> + '_ {
        self.revisions.iter().map(|r| r.tree)
    }

    pub fn newest_tree(&self) -> Option<ObjectHash> {
        self.revisions.last().map(|r| r.tree)
    }
}

pub async fn list_revisions(repo_dir: &Path, branch: &str) -> Result<RevisionList, GraftError> {
    let output = Command::new("git")
        .args(["rev-list", "--format=%T", "--reverse", branch])
        .current_dir(repo_dir)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::null())
        .spawn()?;

    let stdout = output
        .stdout
        .ok_or_else(|| GraftError::Protocol("rev-list: no stdout handle".into()))?;
    let mut lines = BufReader::new(stdout).lines();

    let mut revisions = Vec::new();
    let mut pending_commit: Option<ObjectHash> = None;
    while let Some(line) = lines.next_line().await? {
        if let Some(hex) = line.strip_prefix("commit ") {
            pending_commit = Some(hex.parse()?);
        } else {
            let commit = pending_commit.take().ok_or_else(|| {
                GraftError::Protocol(format!("rev-list: tree line {line:?} with no preceding commit"))
            })?;
            let tree = line.parse()?;
            revisions.push(Revision { commit, tree });
        }
    }

    if revisions.is_empty() {
        return Err(GraftError::NotFound(format!(
            "branch {branch} has no reachable revisions"
        )));
    }

    Ok(RevisionList { revisions })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newest_tree_is_last_revision() {
        let h = |b: u8| ObjectHash::from_bytes([b; 20]);
        let list = RevisionList {
            revisions: vec![
                Revision {
                    commit: h(1),
                    tree: h(2),
                },
                Revision {
                    commit: h(3),
                    tree: h(4),
                },
            ],
        };
        assert_eq!(list.newest_tree(), Some(h(4)));
        assert_eq!(list.commits().collect::<Vec<_>>(), vec![h(1), h(3)]);
    }
}
