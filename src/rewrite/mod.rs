//! Tree and commit rewriting (components F and G) plus the shared
//! concurrent map that coordinates them across workers (spec §5).

pub mod commit;
pub mod concurrent_map;
pub mod tree;

pub use commit::{CommitRewriteOutcome, CommitRewriter};
pub use concurrent_map::ConcurrentMap;
pub use tree::TreeRewriter;
