//! Index construction: hash tables, partition-by-range bucketing, radius
//! sequences, and dataset/cache I/O.

pub mod cache;
pub mod dataset;
pub mod pbr;
pub mod radii;
pub mod table;

pub use pbr::{compute_bucket_divisions, compute_probes, PbrBuckets};
pub use table::{compute_hashes, HashTable};
