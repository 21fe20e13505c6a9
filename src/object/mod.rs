//! Object model: blob/tree/commit parsing and serialisation (spec §3, §4.B).

pub mod commit;
pub mod model;
pub mod store;

pub use commit::Commit;
pub use model::{ObjectKind, Tree, TreeEntry};
