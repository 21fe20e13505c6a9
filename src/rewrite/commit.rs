//! Commit rewriter (component G, spec §4.G): walks the enumerated commits
//! oldest-first, substituting each commit's tree and parent through the
//! maps the earlier phases built, and writes the result.
//!
//! Must run strictly in ancestor order: a commit's rewritten parent has to
//! already be in `commit_map` before this commit is processed, which is
//! exactly the order [`crate::revlist::list_revisions`] returns.

use std::sync::Arc;

use crate::config::OnMissingParentMapping;
use crate::error::GraftError;
use crate::hash::ObjectHash;
use crate::object::commit::Commit;
use crate::object::model::ObjectKind;
use crate::object::store::{ObjectStore, TargetStore};
use crate::rewrite::ConcurrentMap;

pub struct CommitRewriteOutcome {
    /// The rewritten hash of the last commit processed -- the new branch tip.
    pub head: ObjectHash,
    /// Count of parents retained/nullified under
    /// [`OnMissingParentMapping::RetainOriginal`] or
    /// [`OnMissingParentMapping::Nullify`] because they predate the walk.
    pub missing_parent_count: usize,
}

pub struct CommitRewriter {
    source: Arc<dyn ObjectStore>,
    target: TargetStore,
    tree_map: Arc<ConcurrentMap>,
    commit_map: Arc<ConcurrentMap>,
    on_missing_parent: OnMissingParentMapping,
    preserve_merge_parents: bool,
}

impl CommitRewriter {
    pub fn new(
        source: Arc<dyn ObjectStore>,
        target: TargetStore,
        tree_map: Arc<ConcurrentMap>,
        commit_map: Arc<ConcurrentMap>,
        on_missing_parent: OnMissingParentMapping,
        preserve_merge_parents: bool,
    ) -> Self {
        Self {
            source,
            target,
            tree_map,
            commit_map,
            on_missing_parent,
            preserve_merge_parents,
        }
    }

    /// Resolves one parent hash through `commit_map`, applying
    /// `on_missing_parent` on a miss. Shared by the primary parent and, when
    /// `preserve_merge_parents` is set, the merged parent -- both are
    /// commit-hash substitutions with the same missing-mapping policy.
    fn resolve_parent(
        &self,
        rewriting: ObjectHash,
        parent: ObjectHash,
        missing_parent_count: &mut usize,
    ) -> Result<Option<ObjectHash>, GraftError> {
        match self.commit_map.get(parent) {
            Some(mapped) => Ok(Some(mapped)),
            None => {
                *missing_parent_count += 1;
                match self.on_missing_parent {
                    OnMissingParentMapping::RetainOriginal => {
                        tracing::warn!(
                            commit = %rewriting,
                            parent = %parent,
                            "parent predates the rewritten range; retaining original parent hash"
                        );
                        Ok(Some(parent))
                    }
                    OnMissingParentMapping::Nullify => {
                        tracing::warn!(
                            commit = %rewriting,
                            parent = %parent,
                            "parent predates the rewritten range; dropping parent link"
                        );
                        Ok(None)
                    }
                    OnMissingParentMapping::Fail => Err(GraftError::MissingMapping {
                        hash: parent,
                        phase: "commit rewrite (parent substitution)",
                    }),
                }
            }
        }
    }

    /// Rewrites each commit in `commits` in order. Serial by design: spec §5
    /// assigns the commit phase no worker pool, unlike blobs and trees, since
    /// each commit depends on the previous one's rewritten hash.
    pub async fn rewrite_commits(
        &self,
        commits: impl IntoIterator<Item = ObjectHash>,
    ) -> Result<CommitRewriteOutcome, GraftError> {
        let mut head = None;
        let mut missing_parent_count = 0;

        for original_hash in commits {
            let commit = self.source.read_commit(original_hash).await?;

            let new_tree =
                self.tree_map
                    .get(commit.tree)
                    .ok_or_else(|| GraftError::MissingMapping {
                        hash: commit.tree,
                        phase: "commit rewrite (tree substitution)",
                    })?;

            let new_parent = match commit.parent {
                None => None,
                Some(parent) => {
                    self.resolve_parent(original_hash, parent, &mut missing_parent_count)?
                }
            };

            // First-parent linearization is the default (spec §1 non-goal);
            // `preserve_merge_parents` is the documented opt-in variant (§9)
            // that keeps a rewritten second parent instead of discarding it.
            let new_merged_parent = if self.preserve_merge_parents {
                match commit.merged_parent {
                    None => None,
                    Some(parent) => {
                        self.resolve_parent(original_hash, parent, &mut missing_parent_count)?
                    }
                }
            } else {
                None
            };

            let new_commit = Commit {
                tree: new_tree,
                parent: new_parent,
                merged_parent: new_merged_parent,
                author: commit.author,
                committer: commit.committer,
                extra_headers: commit.extra_headers,
                message: commit.message,
            };

            let new_hash = self
                .target
                .write(ObjectKind::Commit, &new_commit.to_bytes())?;
            self.commit_map.insert_or_check(original_hash, new_hash)?;
            head = Some(new_hash);
        }

        head.map(|head| CommitRewriteOutcome {
            head,
            missing_parent_count,
        })
        .ok_or_else(|| GraftError::NotFound("no commits to rewrite".into()))
    }
}
