//! On-disk cache of built hash tables.
//!
//! Re-hashing a large dataset under every LSH function dominates server
//! startup, so the capped `(keys, values)` of each table are cached as JSON
//! keyed by dataset and table count. Both servers share the format; since
//! builds are seed-deterministic, caches built independently agree.

use std::fs;
use std::path::{Path, PathBuf};

use pir::Fp;
use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CachedHashTable {
    pub dimension: usize,
    pub n: usize,
    pub test_query: Vec<f64>,
    pub keys: Vec<u64>,
    pub values: Vec<Fp>,
}

/// `<dir>/<dataset>_cached_table_<numTables>-<table>.json`
pub fn cached_table_path(
    dir: impl AsRef<Path>,
    dataset: &str,
    num_tables: usize,
    table: usize,
) -> PathBuf {
    dir.as_ref()
        .join(format!("{dataset}_cached_table_{num_tables}-{table}.json"))
}

pub fn read_cached_table(path: impl AsRef<Path>) -> Result<CachedHashTable, Error> {
    let contents = fs::read(path)?;
    Ok(serde_json::from_slice(&contents)?)
}

pub fn write_cached_table(
    path: impl AsRef<Path>,
    table: &CachedHashTable,
) -> Result<(), Error> {
    let json = serde_json::to_vec_pretty(table)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let table = CachedHashTable {
            dimension: 2,
            n: 3,
            test_query: vec![0.5, -1.5],
            keys: vec![1, u64::MAX - 58, 42],
            values: vec![7, 8, 9],
        };
        let path = cached_table_path(dir.path(), "toy", 4, 1);
        assert!(path.ends_with("toy_cached_table_4-1.json"));

        write_cached_table(&path, &table).unwrap();
        assert_eq!(read_cached_table(&path).unwrap(), table);
    }

    #[test]
    fn test_corrupt_cache_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, b"{ not json").unwrap();
        assert!(matches!(read_cached_table(&path), Err(Error::Json(_))));
    }

    #[test]
    fn test_missing_cache_is_io_error() {
        assert!(matches!(
            read_cached_table("/nonexistent/cache.json"),
            Err(Error::Io(_))
        ));
    }
}
