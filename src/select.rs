//! Blob selector: walks the root tree of the newest revision once, gathering
//! the blob hashes to submit to the formatter (spec §4.D).
//!
//! Only the tip's tree is walked — see the Open Question in spec §9. A blob
//! under the scoped prefix that existed in an earlier commit but was deleted
//! before the tip never enters `blob_map`; [`crate::config::OnMissingBlobMapping`]
//! decides what the tree rewriter then does with it.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

use crate::error::GraftError;
use crate::hash::ObjectHash;
use crate::object::model::{is_dir_mode, is_file_mode};
use crate::object::store::ObjectStore;

/// Returns the lowercased extension (with leading dot) of a file name, or
/// `None` if it has none. Operates on raw bytes since git names are not
/// guaranteed UTF-8; a non-UTF-8 name simply never matches any extension set.
fn lowercased_extension(name: &[u8]) -> Option<String> {
    let name = std::str::from_utf8(name).ok()?;
    let dot = name.rfind('.')?;
    if dot == 0 {
        return None; // dotfile, e.g. ".gitignore" -- no extension
    }
    Some(name[dot..].to_ascii_lowercase())
}

/// Walks a path-segment prefix, e.g. `["third_party", "WebKit"]`, matching
/// `(depth, name)` against the next unconsumed segment.
fn matches_prefix_segment(prefix: &[String], depth: usize, name: &[u8]) -> bool {
    prefix
        .get(depth)
        .map(|seg| seg.as_bytes() == name)
        .unwrap_or(false)
}

pub struct BlobSelector<'a> {
    store: &'a dyn ObjectStore,
    scope_prefix: Vec<String>,
    rewritable_extensions: HashSet<String>,
    visited: HashSet<ObjectHash>,
    selected: HashSet<ObjectHash>,
}

impl<'a> BlobSelector<'a> {
    pub fn new(
        store: &'a dyn ObjectStore,
        scope_prefix: Vec<String>,
        rewritable_extensions: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            store,
            scope_prefix,
            rewritable_extensions: rewritable_extensions.into_iter().collect(),
            visited: HashSet::new(),
            selected: HashSet::new(),
        }
    }

    pub async fn select(mut self, root_tree: ObjectHash) -> Result<HashSet<ObjectHash>, GraftError> {
        self.walk(root_tree, 0, 0).await?;
        Ok(self.selected)
    }

    /// `matched` is the count of leading `scope_prefix` segments consumed by
    /// the path taken to reach this tree; a path is in scope once `matched`
    /// reaches `scope_prefix.len()` (all segments consumed), not as soon as
    /// the *first* segment matches.
    fn walk<'s>(
        &'s mut self,
        tree_hash: ObjectHash,
        depth: usize,
        matched: usize,
    ) -> Pin<Box<dyn Future<Output = Result<(), GraftError>> + Send + 's>> {
        Box::pin(async move {
            if !self.visited.insert(tree_hash) {
                return Ok(());
            }

            let in_scope = matched >= self.scope_prefix.len();
            let tree = self.store.read_tree(tree_hash).await?;
            for entry in &tree.entries {
                if is_file_mode(&entry.mode) {
                    if in_scope {
                        if let Some(ext) = lowercased_extension(&entry.name) {
                            if self.rewritable_extensions.contains(&ext) {
                                self.selected.insert(entry.hash);
                            }
                        }
                    }
                } else if is_dir_mode(&entry.mode) {
                    let child_matched = if in_scope {
                        matched
                    } else if matches_prefix_segment(&self.scope_prefix, depth, &entry.name) {
                        matched + 1
                    } else {
                        matched
                    };
                    let child_in_scope = child_matched >= self.scope_prefix.len();
                    let extends_prefix_match = !in_scope && child_matched > matched;
                    if child_in_scope || extends_prefix_match {
                        self.walk(entry.hash, depth + 1, child_matched).await?;
                    }
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::model::{ObjectKind, Tree, TreeEntry};
    use crate::object::store::TargetStore;
    use tempfile::tempdir;

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(lowercased_extension(b"a.CPP"), Some(".cpp".to_string()));
        assert_eq!(lowercased_extension(b"a.cpp"), Some(".cpp".to_string()));
        assert_eq!(lowercased_extension(b".gitignore"), None);
        assert_eq!(lowercased_extension(b"noext"), None);
    }

    /// A sibling subtree under the first prefix segment but not the second
    /// (`third_party/skia` alongside `third_party/WebKit`) must not be
    /// selected: scope only activates once every segment is consumed.
    #[tokio::test]
    async fn sibling_under_first_segment_is_not_selected() {
        let store = TargetStore::new(tempdir().unwrap().keep());
        let webkit_blob = store.write(ObjectKind::Blob, b"int x;").unwrap();
        let skia_blob = store.write(ObjectKind::Blob, b"int y;").unwrap();

        let webkit = store
            .write(
                ObjectKind::Tree,
                &Tree::serialize(vec![TreeEntry::new("100644", *b"a.cpp", webkit_blob)]),
            )
            .unwrap();
        let skia = store
            .write(
                ObjectKind::Tree,
                &Tree::serialize(vec![TreeEntry::new("100644", *b"b.cpp", skia_blob)]),
            )
            .unwrap();
        let third_party = store
            .write(
                ObjectKind::Tree,
                &Tree::serialize(vec![
                    TreeEntry::new("40000", *b"WebKit", webkit),
                    TreeEntry::new("40000", *b"skia", skia),
                ]),
            )
            .unwrap();
        let root = store
            .write(
                ObjectKind::Tree,
                &Tree::serialize(vec![TreeEntry::new("40000", *b"third_party", third_party)]),
            )
            .unwrap();

        let selector = BlobSelector::new(
            &store,
            vec!["third_party".into(), "WebKit".into()],
            vec![".cpp".to_string()],
        );
        let selected = selector.select(root).await.unwrap();

        assert!(selected.contains(&webkit_blob));
        assert!(!selected.contains(&skia_blob));
    }

    #[test]
    fn prefix_segment_matching() {
        let prefix = vec!["third_party".to_string(), "WebKit".to_string()];
        assert!(matches_prefix_segment(&prefix, 0, b"third_party"));
        assert!(!matches_prefix_segment(&prefix, 0, b"other"));
        assert!(matches_prefix_segment(&prefix, 1, b"WebKit"));
        assert!(!matches_prefix_segment(&prefix, 2, b"anything"));
    }
}
