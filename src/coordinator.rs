//! Phase coordinator: runs the four ordered phases of a rewrite (spec §5)
//! and reports the result. This is the one place that knows the full
//! pipeline; every other module only knows its own phase.

use std::sync::Arc;

use crate::cache;
use crate::config::RewriteConfig;
use crate::error::GraftError;
use crate::hash::ObjectHash;
use crate::object::store::{ObjectStore, SourceStore, TargetStore};
use crate::revlist;
use crate::rewrite::{CommitRewriter, ConcurrentMap, TreeRewriter};
use crate::select::BlobSelector;
use crate::transform;

/// Summary handed back to the CLI layer after a successful run.
pub struct RewriteReport {
    pub head: ObjectHash,
    pub commits_rewritten: usize,
    pub blobs_transformed: usize,
    pub trees_rewritten: usize,
    pub missing_parent_count: usize,
}

pub async fn run(config: &RewriteConfig) -> Result<RewriteReport, GraftError> {
    let source: Arc<dyn ObjectStore> = Arc::new(SourceStore::spawn(&config.source_repo)?);
    let target = TargetStore::new(config.target_objects.clone());

    tracing::info!(branch = %config.branch, "listing revisions");
    let revisions = revlist::list_revisions(&config.source_repo, &config.branch).await?;
    let tip_tree = revisions
        .newest_tree()
        .ok_or_else(|| GraftError::NotFound("revision list produced no trees".into()))?;

    tracing::info!("phase 1: selecting blobs under scoped prefix");
    let selector = BlobSelector::new(
        source.as_ref(),
        config.scope_prefix.clone(),
        config.rewritable_extensions.iter().cloned(),
    );
    let selected = selector.select(tip_tree).await?;
    let blob_count = selected.len();
    tracing::info!(count = blob_count, "blob selection complete");
    let selected_for_cache = config.keep_cache.then(|| selected.clone());

    tracing::info!(workers = config.blob_worker_count(), "phase 2: transforming blobs");
    let blob_map = Arc::new(ConcurrentMap::new());
    transform::transform_blobs(
        source.clone(),
        target.clone(),
        config.formatter.clone(),
        selected,
        blob_map.clone(),
        config.blob_worker_count(),
    )
    .await?;

    tracing::info!(workers = config.tree_worker_count(), "phase 3: rewriting trees");
    let tree_map = Arc::new(ConcurrentMap::new());
    let tree_rewriter = Arc::new(TreeRewriter::new(
        source.clone(),
        target.clone(),
        tree_map.clone(),
        blob_map.clone(),
        config.scope_prefix.clone(),
        config.rewritable_extensions.iter().cloned(),
        config.filter.clone(),
        config.wrap_segments.clone(),
        config.on_missing_blob_mapping,
    ));
    tree_rewriter
        .clone()
        .rewrite_all(revisions.trees(), config.tree_worker_count())
        .await?;

    tracing::info!(commits = revisions.revisions.len(), "phase 4: rewriting commits");
    let commit_map = Arc::new(ConcurrentMap::new());
    let commit_rewriter = CommitRewriter::new(
        source.clone(),
        target.clone(),
        tree_map.clone(),
        commit_map,
        config.on_missing_parent_mapping,
        config.preserve_merge_parents,
    );
    let outcome = commit_rewriter.rewrite_commits(revisions.commits()).await?;

    if outcome.missing_parent_count > 0 {
        tracing::warn!(
            count = outcome.missing_parent_count,
            "some commit parents predated the rewritten range"
        );
    }

    if let Some(selected) = selected_for_cache {
        tracing::info!("persisting blob selection and mapping caches");
        persist_caches(config, &selected, &blob_map, &tree_map)?;
    }

    Ok(RewriteReport {
        head: outcome.head,
        commits_rewritten: revisions.revisions.len(),
        blobs_transformed: blob_count,
        trees_rewritten: tree_map.len(),
        missing_parent_count: outcome.missing_parent_count,
    })
}

/// Persists `blobs.cache` and the mapping caches alongside the target object
/// directory, for the optional resume/testing workflow (spec §6).
fn persist_caches(
    config: &RewriteConfig,
    selected: &std::collections::HashSet<ObjectHash>,
    blob_map: &ConcurrentMap,
    tree_map: &ConcurrentMap,
) -> Result<(), GraftError> {
    let dir = &config.target_objects;
    cache::save_blob_selection(&dir.join("blobs.cache"), selected)?;
    cache::save_mapping(&dir.join("blob_map.cache"), blob_map)?;
    cache::save_mapping(&dir.join("tree_map.cache"), tree_map)?;
    Ok(())
}
