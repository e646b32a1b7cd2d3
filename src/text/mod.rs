//! Document reading, chunking and boundary caching.

pub mod boundary_cache;
pub mod chunker;
pub mod stats;

pub use boundary_cache::{BoundaryCache, BoundarySet};
pub use chunker::{Boundary, Chunker, compute_boundaries, slice_chunks};
pub use stats::{DocumentStats, format_count, format_file_size, read_document};
