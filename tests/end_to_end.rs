//! End-to-end scenarios for the rewrite pipeline, covering the literal
//! inputs/outputs table from the specification's testable-properties
//! section. Each scenario builds its own fixture objects directly through
//! `TargetStore`, used as both source and sink -- no real git checkout is
//! needed since every object is content-addressed and the store is
//! type-agnostic about where bytes came from.

use std::collections::BTreeSet;
use std::sync::Arc;

use gitgraft::config::{FilterRule, OnMissingBlobMapping, OnMissingParentMapping};
use gitgraft::hash::ObjectHash;
use gitgraft::object::commit::Commit;
use gitgraft::object::model::{ObjectKind, Tree, TreeEntry};
use gitgraft::object::store::{ObjectStore, TargetStore};
use gitgraft::rewrite::{CommitRewriter, ConcurrentMap, TreeRewriter};
use gitgraft::select::BlobSelector;
use gitgraft::transform::transform_blobs;
use tempfile::tempdir;

fn store() -> TargetStore {
    TargetStore::new(tempdir().unwrap().keep())
}

fn identity_formatter() -> gitgraft::config::FormatterConfig {
    gitgraft::config::FormatterConfig {
        command: "cat".into(),
        args: vec![],
        cwd: std::env::temp_dir(),
    }
}

fn uppercase_formatter() -> gitgraft::config::FormatterConfig {
    gitgraft::config::FormatterConfig {
        command: "tr".into(),
        args: vec!["a-z".into(), "A-Z".into()],
        cwd: std::env::temp_dir(),
    }
}

fn simple_commit(tree: ObjectHash, parent: Option<ObjectHash>) -> Commit {
    Commit {
        tree,
        parent,
        merged_parent: None,
        author: "A <a@b.com> 0 +0000".into(),
        committer: "A <a@b.com> 0 +0000".into(),
        extra_headers: vec![],
        message: "msg\n".into(),
    }
}

async fn run_pipeline(
    store: &TargetStore,
    trees: Vec<ObjectHash>,
    commits: Vec<ObjectHash>,
    formatter: gitgraft::config::FormatterConfig,
    scope_prefix: Vec<String>,
    extensions: Vec<String>,
    filter: Option<FilterRule>,
    wrap_segments: Vec<String>,
) -> (ObjectHash, Arc<ConcurrentMap>) {
    let source: Arc<dyn ObjectStore> = Arc::new(store.clone());

    let selector = BlobSelector::new(source.as_ref(), scope_prefix.clone(), extensions.clone());
    let tip_tree = *trees.last().unwrap();
    let selected = selector.select(tip_tree).await.unwrap();

    let blob_map = Arc::new(ConcurrentMap::new());
    transform_blobs(
        source.clone(),
        store.clone(),
        formatter,
        selected,
        blob_map.clone(),
        4,
    )
    .await
    .unwrap();

    let tree_map = Arc::new(ConcurrentMap::new());
    let tree_rewriter = Arc::new(TreeRewriter::new(
        source.clone(),
        store.clone(),
        tree_map.clone(),
        blob_map,
        scope_prefix,
        extensions,
        filter,
        wrap_segments,
        OnMissingBlobMapping::Passthrough,
    ));
    tree_rewriter.clone().rewrite_all(trees, 4).await.unwrap();

    let commit_map = Arc::new(ConcurrentMap::new());
    let commit_rewriter = CommitRewriter::new(
        source,
        store.clone(),
        tree_map.clone(),
        commit_map,
        OnMissingParentMapping::RetainOriginal,
        false,
    );
    let outcome = commit_rewriter.rewrite_commits(commits).await.unwrap();
    (outcome.head, tree_map)
}

/// Scenario 1: identity formatter leaves everything byte-identical.
#[tokio::test]
async fn scenario_1_identity_formatter_reuses_every_hash() {
    let store = store();
    let blob_cpp = store.write(ObjectKind::Blob, b"int x;").unwrap();
    let blob_readme = store.write(ObjectKind::Blob, b"hi").unwrap();
    let webkit = store
        .write(
            ObjectKind::Tree,
            &Tree::serialize(vec![TreeEntry::new("100644", *b"a.cpp", blob_cpp)]),
        )
        .unwrap();
    let third_party = store
        .write(
            ObjectKind::Tree,
            &Tree::serialize(vec![TreeEntry::new("40000", *b"WebKit", webkit)]),
        )
        .unwrap();
    let root = store
        .write(
            ObjectKind::Tree,
            &Tree::serialize(vec![
                TreeEntry::new("40000", *b"third_party", third_party),
                TreeEntry::new("100644", *b"README", blob_readme),
            ]),
        )
        .unwrap();
    let commit = store
        .write(ObjectKind::Commit, &simple_commit(root, None).to_bytes())
        .unwrap();

    let (head, tree_map) = run_pipeline(
        &store,
        vec![root],
        vec![commit],
        identity_formatter(),
        vec!["third_party".into(), "WebKit".into()],
        vec![".cpp".into()],
        None,
        vec![],
    )
    .await;

    assert_eq!(tree_map.get(root), Some(root));
    let rewritten = store.read_commit(head).await.unwrap();
    assert_eq!(rewritten.tree, root);
}

/// Scenario 2: uppercasing formatter changes `a.cpp`'s blob and every tree
/// on the path back to root; `README` is untouched and reused.
#[tokio::test]
async fn scenario_2_uppercasing_formatter_changes_scoped_path_only() {
    let store = store();
    let blob_cpp = store.write(ObjectKind::Blob, b"int x;").unwrap();
    let blob_readme = store.write(ObjectKind::Blob, b"hi").unwrap();
    let webkit = store
        .write(
            ObjectKind::Tree,
            &Tree::serialize(vec![TreeEntry::new("100644", *b"a.cpp", blob_cpp)]),
        )
        .unwrap();
    let third_party = store
        .write(
            ObjectKind::Tree,
            &Tree::serialize(vec![TreeEntry::new("40000", *b"WebKit", webkit)]),
        )
        .unwrap();
    let root = store
        .write(
            ObjectKind::Tree,
            &Tree::serialize(vec![
                TreeEntry::new("40000", *b"third_party", third_party),
                TreeEntry::new("100644", *b"README", blob_readme),
            ]),
        )
        .unwrap();
    let commit = store
        .write(ObjectKind::Commit, &simple_commit(root, None).to_bytes())
        .unwrap();

    let (head, tree_map) = run_pipeline(
        &store,
        vec![root],
        vec![commit],
        uppercase_formatter(),
        vec!["third_party".into(), "WebKit".into()],
        vec![".cpp".into()],
        None,
        vec![],
    )
    .await;

    let new_root = tree_map.get(root).unwrap();
    assert_ne!(new_root, root);

    let new_root_tree = store.read_tree(new_root).await.unwrap();
    assert_eq!(new_root_tree.lookup(b"README").unwrap().hash, blob_readme);

    let new_third_party = store.read_tree(new_root_tree.lookup(b"third_party").unwrap().hash).await.unwrap();
    let new_webkit = store.read_tree(new_third_party.lookup(b"WebKit").unwrap().hash).await.unwrap();
    let new_cpp_blob = new_webkit.lookup(b"a.cpp").unwrap().hash;
    assert_ne!(new_cpp_blob, blob_cpp);
    assert_eq!(store.read_blob(new_cpp_blob).await.unwrap(), b"INT X;");

    let rewritten = store.read_commit(head).await.unwrap();
    assert_eq!(rewritten.tree, new_root);
}

/// Scenario 3: two commits where C2 adds a file; both rewrite, and
/// rewritten-C2's parent is rewritten-C1.
#[tokio::test]
async fn scenario_3_two_commit_chain_preserves_rewritten_parentage() {
    let store = store();
    let blob_a = store.write(ObjectKind::Blob, b"a content").unwrap();
    let blob_b = store.write(ObjectKind::Blob, b"b content").unwrap();

    let webkit_1 = store
        .write(
            ObjectKind::Tree,
            &Tree::serialize(vec![TreeEntry::new("100644", *b"a.cpp", blob_a)]),
        )
        .unwrap();
    let third_party_1 = store
        .write(
            ObjectKind::Tree,
            &Tree::serialize(vec![TreeEntry::new("40000", *b"WebKit", webkit_1)]),
        )
        .unwrap();
    let root_1 = store
        .write(
            ObjectKind::Tree,
            &Tree::serialize(vec![TreeEntry::new("40000", *b"third_party", third_party_1)]),
        )
        .unwrap();
    let commit_1 = store
        .write(ObjectKind::Commit, &simple_commit(root_1, None).to_bytes())
        .unwrap();

    let webkit_2 = store
        .write(
            ObjectKind::Tree,
            &Tree::serialize(vec![
                TreeEntry::new("100644", *b"a.cpp", blob_a),
                TreeEntry::new("100644", *b"b.h", blob_b),
            ]),
        )
        .unwrap();
    let third_party_2 = store
        .write(
            ObjectKind::Tree,
            &Tree::serialize(vec![TreeEntry::new("40000", *b"WebKit", webkit_2)]),
        )
        .unwrap();
    let root_2 = store
        .write(
            ObjectKind::Tree,
            &Tree::serialize(vec![TreeEntry::new("40000", *b"third_party", third_party_2)]),
        )
        .unwrap();
    let commit_2 = store
        .write(
            ObjectKind::Commit,
            &simple_commit(root_2, Some(commit_1)).to_bytes(),
        )
        .unwrap();

    let (head, tree_map) = run_pipeline(
        &store,
        vec![root_1, root_2],
        vec![commit_1, commit_2],
        identity_formatter(),
        vec!["third_party".into(), "WebKit".into()],
        vec![".cpp".into(), ".h".into()],
        None,
        vec![],
    )
    .await;

    let new_root_1 = tree_map.get(root_1).unwrap();
    let new_root_2 = tree_map.get(root_2).unwrap();

    let rewritten_2 = store.read_commit(head).await.unwrap();
    assert_eq!(rewritten_2.tree, new_root_2);

    let new_commit_1_tree = store.read_commit(rewritten_2.parent.unwrap()).await.unwrap().tree;
    assert_eq!(new_commit_1_tree, new_root_1);
}

/// Scenario 4/5: a filter rule drops a file under the designated directory
/// unless its blob hash is whitelisted.
#[tokio::test]
async fn scenario_4_and_5_layout_tests_filter_respects_whitelist() {
    let store = store();
    let dropped = store.write(ObjectKind::Blob, b"drop me").unwrap();
    let kept = store.write(ObjectKind::Blob, b"keep me").unwrap();

    let layout_tests = store
        .write(
            ObjectKind::Tree,
            &Tree::serialize(vec![
                TreeEntry::new("100644", *b"drop.png", dropped),
                TreeEntry::new("100644", *b"keep.png", kept),
            ]),
        )
        .unwrap();
    let root = store
        .write(
            ObjectKind::Tree,
            &Tree::serialize(vec![TreeEntry::new("40000", *b"LayoutTests", layout_tests)]),
        )
        .unwrap();
    let commit = store
        .write(ObjectKind::Commit, &simple_commit(root, None).to_bytes())
        .unwrap();

    let filter = FilterRule {
        directory_name: "LayoutTests".into(),
        extensions: BTreeSet::from([".png".to_string()]),
        whitelist: BTreeSet::from([kept.to_hex()]),
    };

    let (_head, tree_map) = run_pipeline(
        &store,
        vec![root],
        vec![commit],
        identity_formatter(),
        vec![],
        vec![".cpp".into()],
        Some(filter),
        vec![],
    )
    .await;

    let new_root = tree_map.get(root).unwrap();
    let new_root_tree = store.read_tree(new_root).await.unwrap();
    let new_layout_tests = store
        .read_tree(new_root_tree.lookup(b"LayoutTests").unwrap().hash)
        .await
        .unwrap();

    assert!(new_layout_tests.lookup(b"drop.png").is_none());
    assert!(new_layout_tests.lookup(b"keep.png").is_some());
}

/// Scenario 6: ancestor-wrapping relocates the entire root under
/// `third_party/WebKit`.
#[tokio::test]
async fn scenario_6_ancestor_wrap_relocates_root() {
    let store = store();
    let blob_a = store.write(ObjectKind::Blob, b"a").unwrap();
    let blob_b = store.write(ObjectKind::Blob, b"b").unwrap();
    let root = store
        .write(
            ObjectKind::Tree,
            &Tree::serialize(vec![
                TreeEntry::new("100644", *b"a.cpp", blob_a),
                TreeEntry::new("100644", *b"b.cpp", blob_b),
            ]),
        )
        .unwrap();
    let commit = store
        .write(ObjectKind::Commit, &simple_commit(root, None).to_bytes())
        .unwrap();

    let (_head, tree_map) = run_pipeline(
        &store,
        vec![root],
        vec![commit],
        identity_formatter(),
        vec![],
        vec![".cpp".into()],
        None,
        vec!["third_party".into(), "WebKit".into()],
    )
    .await;

    let new_root = tree_map.get(root).unwrap();
    let outer = store.read_tree(new_root).await.unwrap();
    assert_eq!(outer.entries.len(), 1);
    assert_eq!(outer.entries[0].name, b"third_party");

    let middle = store.read_tree(outer.entries[0].hash).await.unwrap();
    assert_eq!(middle.entries.len(), 1);
    assert_eq!(middle.entries[0].name, b"WebKit");

    let innermost = store.read_tree(middle.entries[0].hash).await.unwrap();
    assert_eq!(innermost.entries.len(), 2);
}
