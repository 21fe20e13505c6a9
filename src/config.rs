//! Rewrite configuration: a TOML file with CLI-flag overrides layered on
//! top, following the common layered-config pattern (flags win over file
//! values). Grounded on the teacher's `toml`+`serde` dependencies, used here
//! in place of its DB-backed `internal::config`, which assumes a checked-out
//! working repository this tool never has (see DESIGN.md).

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::GraftError;

/// Policy for a blob that the tree rewriter expects in `blob_map` but which
/// Phase 1 never selected — the Open Question flagged in spec §9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OnMissingBlobMapping {
    /// Leave the blob hash untranslated. Chosen as the default: it keeps a
    /// run that touches history predating the scoped directory alive
    /// instead of asserting, at the cost of occasionally shipping
    /// unformatted content for files that only ever existed outside the
    /// last revision's tree.
    #[default]
    Passthrough,
    /// Fail the run, matching the source's `assert`-based behaviour.
    Fail,
}

/// Policy for a commit parent that predates the start of the reversed walk
/// (spec §4.G step 3 / §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OnMissingParentMapping {
    /// Retain the original (source-repo) parent hash and log a warning.
    /// This is the reference implementation's documented choice (spec §7).
    #[default]
    RetainOriginal,
    /// Drop the parent entirely, producing a root commit.
    Nullify,
    /// Fail the run.
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatterConfig {
    pub command: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

/// The filter rule applied inside a designated directory (component F, rule
/// 1): drop files whose lowercased extension is in `extensions` unless their
/// blob hash is in the whitelist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRule {
    pub directory_name: String,
    pub extensions: BTreeSet<String>,
    pub whitelist: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteConfig {
    pub source_repo: PathBuf,
    pub target_objects: PathBuf,
    pub branch: String,

    pub formatter: FormatterConfig,

    /// Path segments gating where the formatter and any filter rule apply,
    /// e.g. `["third_party", "WebKit"]`.
    #[serde(default)]
    pub scope_prefix: Vec<String>,
    /// Lowercased extensions (with leading dot) eligible for formatting.
    pub rewritable_extensions: BTreeSet<String>,

    /// Ancestor directories the rewritten root is wrapped in, applied once
    /// at depth 0 (spec §4.F "Ancestor-wrapping"). Order is outer-to-inner
    /// on disk, i.e. `["third_party", "WebKit"]` produces
    /// `third_party/WebKit/<original root>`.
    #[serde(default)]
    pub wrap_segments: Vec<String>,

    #[serde(default)]
    pub filter: Option<FilterRule>,

    #[serde(default)]
    pub blob_workers: Option<usize>,
    #[serde(default)]
    pub tree_workers: Option<usize>,

    #[serde(default)]
    pub on_missing_blob_mapping: OnMissingBlobMapping,
    #[serde(default)]
    pub on_missing_parent_mapping: OnMissingParentMapping,

    /// Non-goal reaffirmed with an explicit opt-in (spec §1, §9 Open
    /// Questions, Expansion 7): history is collapsed to linear first-parent
    /// chains by default. Setting this keeps a rewritten second parent
    /// instead of discarding it -- the documented variant §9 allows
    /// ("A variant preserving all parents is legitimate").
    #[serde(default)]
    pub preserve_merge_parents: bool,

    /// Non-goal reaffirmed (spec §1, Expansion 7): this tool only ever
    /// produces SHA-1 loose objects. The field exists so an operator who
    /// points it at a SHA-256 repository gets a clear config error instead
    /// of silently misbehaving.
    #[serde(default = "default_hash_algorithm")]
    pub hash_algorithm: String,

    /// Persists `blobs.cache` and the mapping caches next to the target
    /// object directory after a successful run (spec §6 `--keep-blob-cache`).
    #[serde(default)]
    pub keep_cache: bool,
}

fn default_hash_algorithm() -> String {
    "sha1".to_string()
}

impl RewriteConfig {
    pub fn load(path: &std::path::Path) -> Result<Self, GraftError> {
        let text = std::fs::read_to_string(path)?;
        let config: RewriteConfig = toml::from_str(&text)
            .map_err(|e| GraftError::Config(format!("parsing {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), GraftError> {
        if self.hash_algorithm != "sha1" {
            return Err(GraftError::Config(format!(
                "unsupported hash_algorithm {:?}: this tool only supports sha1 (non-goal, spec §1)",
                self.hash_algorithm
            )));
        }
        if self.rewritable_extensions.is_empty() {
            return Err(GraftError::Config(
                "rewritable_extensions must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn blob_worker_count(&self) -> usize {
        self.blob_workers.unwrap_or_else(|| 3 * num_cpus::get())
    }

    pub fn tree_worker_count(&self) -> usize {
        self.tree_workers.unwrap_or_else(num_cpus::get)
    }
}
