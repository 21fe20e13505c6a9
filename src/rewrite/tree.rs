//! Tree rewriter (component F, spec §4.F): for every tree reachable from the
//! enumerated revisions, emits a rewritten tree that substitutes rewritten
//! blobs and recurses into gated sub-paths, sharing one memoisation table
//! across workers.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::task::JoinSet;

use crate::config::{FilterRule, OnMissingBlobMapping};
use crate::error::GraftError;
use crate::hash::ObjectHash;
use crate::object::model::{ObjectKind, Tree, TreeEntry, is_dir_mode, is_file_mode};
use crate::object::store::{ObjectStore, TargetStore};
use crate::rewrite::ConcurrentMap;

fn lowercased_extension(name: &[u8]) -> Option<String> {
    let name = std::str::from_utf8(name).ok()?;
    let dot = name.rfind('.')?;
    if dot == 0 {
        return None;
    }
    Some(name[dot..].to_ascii_lowercase())
}

fn matches_prefix_segment(prefix: &[String], depth: usize, name: &[u8]) -> bool {
    prefix
        .get(depth)
        .map(|seg| seg.as_bytes() == name)
        .unwrap_or(false)
}

pub struct TreeRewriter {
    source: Arc<dyn ObjectStore>,
    target: TargetStore,
    tree_map: Arc<ConcurrentMap>,
    blob_map: Arc<ConcurrentMap>,
    scope_prefix: Vec<String>,
    rewritable_extensions: HashSet<String>,
    filter: Option<FilterRule>,
    wrap_segments: Vec<String>,
    on_missing_blob: OnMissingBlobMapping,
}

impl TreeRewriter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Arc<dyn ObjectStore>,
        target: TargetStore,
        tree_map: Arc<ConcurrentMap>,
        blob_map: Arc<ConcurrentMap>,
        scope_prefix: Vec<String>,
        rewritable_extensions: impl IntoIterator<Item = String>,
        filter: Option<FilterRule>,
        wrap_segments: Vec<String>,
        on_missing_blob: OnMissingBlobMapping,
    ) -> Self {
        Self {
            source,
            target,
            tree_map,
            blob_map,
            scope_prefix,
            rewritable_extensions: rewritable_extensions.into_iter().collect(),
            filter,
            wrap_segments,
            on_missing_blob,
        }
    }

    /// Rewrites every distinct root tree in `roots` in parallel, up to
    /// `worker_count` concurrent tree jobs (spec §5's "tree workers at
    /// `num_cpus`"). Within this phase, trees may complete in any order;
    /// the shared memoisation table makes order irrelevant to correctness.
    pub async fn rewrite_all(
        self: Arc<Self>,
        roots: impl IntoIterator<Item = ObjectHash>,
        worker_count: usize,
    ) -> Result<(), GraftError> {
        let unique: HashSet<ObjectHash> = roots.into_iter().collect();
        let semaphore = Arc::new(tokio::sync::Semaphore::new(worker_count.max(1)));
        let mut tasks: JoinSet<Result<(), GraftError>> = JoinSet::new();

        for root in unique {
            let this = self.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore open");
                this.rewrite_one(root, 0, 0, false).await?;
                Ok(())
            });
        }

        while let Some(result) = tasks.join_next().await {
            result??;
        }
        Ok(())
    }

    /// `matched` is the count of leading `scope_prefix` segments consumed by
    /// the path taken to reach this tree; a path is in scope once `matched`
    /// reaches `scope_prefix.len()` (all segments consumed), not as soon as
    /// the *first* segment matches.
    fn rewrite_one<'s>(
        &'s self,
        tree_hash: ObjectHash,
        depth: usize,
        matched: usize,
        in_filter_dir: bool,
    ) -> Pin<Box<dyn Future<Output = Result<ObjectHash, GraftError>> + Send + 's>> {
        Box::pin(async move {
            if let Some(cached) = self.tree_map.get(tree_hash) {
                return Ok(cached);
            }

            let in_scope = matched >= self.scope_prefix.len();
            let tree = self.source.read_tree(tree_hash).await?;
            let mut changed = false;
            let mut entries = Vec::with_capacity(tree.entries.len());

            for entry in tree.entries {
                if is_file_mode(&entry.mode) {
                    if self.is_filtered_out(&entry, in_filter_dir) {
                        changed = true;
                        continue;
                    }
                    if in_scope {
                        if let Some(ext) = lowercased_extension(&entry.name) {
                            if self.rewritable_extensions.contains(&ext) {
                                let new_hash = self.resolve_blob(entry.hash)?;
                                if new_hash != entry.hash {
                                    changed = true;
                                }
                                entries.push(TreeEntry::new(entry.mode, entry.name, new_hash));
                                continue;
                            }
                        }
                    }
                    entries.push(entry);
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
                    let child_in_filter_dir = in_filter_dir
                        || self
                            .filter
                            .as_ref()
                            .is_some_and(|f| f.directory_name.as_bytes() == entry.name.as_slice());

                    if child_in_scope || extends_prefix_match || child_in_filter_dir {
                        let new_hash = self
                            .rewrite_one(entry.hash, depth + 1, child_matched, child_in_filter_dir)
                            .await?;
                        if new_hash != entry.hash {
                            changed = true;
                        }
                        entries.push(TreeEntry::new(entry.mode, entry.name, new_hash));
                    } else {
                        entries.push(entry);
                    }
                } else {
                    // Unknown mode class: pass through untouched.
                    entries.push(entry);
                }
            }

            let mut result = if changed {
                self.target.write(ObjectKind::Tree, &Tree::serialize(entries))?
            } else {
                tree_hash
            };

            if depth == 0 && !self.wrap_segments.is_empty() {
                result = self.apply_ancestor_wrap(result)?;
            }

            self.tree_map.insert_or_check(tree_hash, result)?;
            Ok(result)
        })
    }

    fn is_filtered_out(&self, entry: &TreeEntry, in_filter_dir: bool) -> bool {
        let Some(filter) = &self.filter else {
            return false;
        };
        if !in_filter_dir {
            return false;
        }
        let Some(ext) = lowercased_extension(&entry.name) else {
            return false;
        };
        if !filter.extensions.contains(&ext) {
            return false;
        }
        !filter.whitelist.contains(&entry.hash.to_hex())
    }

    fn resolve_blob(&self, original: ObjectHash) -> Result<ObjectHash, GraftError> {
        match self.blob_map.get(original) {
            Some(new_hash) => Ok(new_hash),
            None => match self.on_missing_blob {
                OnMissingBlobMapping::Passthrough => Ok(original),
                OnMissingBlobMapping::Fail => Err(GraftError::MissingMapping {
                    hash: original,
                    phase: "tree rewrite (blob substitution)",
                }),
            },
        }
    }

    /// Wraps `root` in the configured ancestor directories, applied exactly
    /// once at depth 0 (spec §4.F). `wrap_segments` is outer-to-inner, e.g.
    /// `["third_party", "WebKit"]` nests `root` inside `WebKit` inside
    /// `third_party`, so trees are written innermost-first.
    fn apply_ancestor_wrap(&self, mut root: ObjectHash) -> Result<ObjectHash, GraftError> {
        for segment in self.wrap_segments.iter().rev() {
            let entries = vec![TreeEntry::new("40000", segment.as_bytes(), root)];
            root = self.target.write(ObjectKind::Tree, &Tree::serialize(entries))?;
        }
        Ok(root)
    }

    pub fn tree_map_snapshot(&self) -> HashMap<ObjectHash, ObjectHash> {
        self.tree_map.to_hash_map()
    }
}
