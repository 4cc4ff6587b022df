//! lawdb-vector
//!
//! Exact inner-product search over normalized embeddings, plus the on-disk
//! snapshot format shared by every corpus artifact.
pub mod index;
pub mod snapshot;

pub use index::VectorIndex;
pub use snapshot::{Manifest, Snapshot, SnapshotDir};
